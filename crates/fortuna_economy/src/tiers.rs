//! # Tier Table
//!
//! The top-level cumulative distribution over prize tiers.
//!
//! ```text
//! draw r in [1, SCALE]
//!
//! | J | top | medium | normal | x10000 | x1000 | x100 | x10 | x1 |      no prize      |
//! 0                                                            ^                  SCALE
//!                                      cumulative of the last prize tier
//! ```
//!
//! ## Tier Odds
//!
//! Every item pool and refund tier returns `base_probability / SCALE` of a
//! ticket in expectation:
//!
//! - Pool tier: `ticket_price * base / average_value`
//! - Refund tier `xk`: `base / k`
//! - Jackpot: configured directly
//! - No prize: `SCALE - sum(all others)`
//!
//! Each ratio is floored, so the residual is never smaller than the true
//! remainder and the table sums to `SCALE` by construction.
//!
//! ## Pity Stretch
//!
//! A player's multiplier `m` stretches every prize boundary: the first tier
//! whose `cumulative * m >= r` wins. The no-prize tier is the catch-all and
//! is never stretched.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{EconomyError, EconomyResult};
use crate::fixed_point::{mul_div, Probability, SCALE};
use crate::pool::PoolKind;

/// Refund multiples of the ticket price, highest first.
pub const REFUND_MULTIPLES: [u32; 5] = [10_000, 1_000, 100, 10, 1];

/// Number of tiers including no-prize.
pub const TIER_COUNT: usize = 10;

/// A mutually exclusive prize category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TierKind {
    /// The whole jackpot balance.
    Jackpot,
    /// One item from a prize pool.
    Pool(PoolKind),
    /// A multiple of the ticket price.
    Refund(u32),
    /// Nothing (the bonus collectible lottery still runs).
    NoPrize,
}

impl TierKind {
    /// Scan order: highest value and lowest probability first.
    pub const ORDER: [Self; TIER_COUNT] = [
        Self::Jackpot,
        Self::Pool(PoolKind::Top),
        Self::Pool(PoolKind::Medium),
        Self::Pool(PoolKind::Normal),
        Self::Refund(REFUND_MULTIPLES[0]),
        Self::Refund(REFUND_MULTIPLES[1]),
        Self::Refund(REFUND_MULTIPLES[2]),
        Self::Refund(REFUND_MULTIPLES[3]),
        Self::Refund(REFUND_MULTIPLES[4]),
        Self::NoPrize,
    ];

    /// Returns true for every tier except no-prize.
    #[inline]
    #[must_use]
    pub const fn is_win(self) -> bool {
        !matches!(self, Self::NoPrize)
    }
}

impl fmt::Display for TierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Jackpot => write!(f, "jackpot"),
            Self::Pool(kind) => write!(f, "{}-pool", kind.name()),
            Self::Refund(multiple) => write!(f, "refund-x{multiple}"),
            Self::NoPrize => write!(f, "no-prize"),
        }
    }
}

/// Current configuration and pool aggregates the table is derived from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TierInputs {
    /// Ticket price in wei.
    pub ticket_price: u128,
    /// Per-tier expected return, as a probability.
    pub base_probability: Probability,
    /// Jackpot probability.
    pub jackpot_probability: Probability,
    /// Average declared value per pool, indexed by [`PoolKind::index`].
    pub pool_averages: [u128; 3],
}

/// One row of the table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tier {
    /// What this tier pays.
    pub kind: TierKind,
    /// Probability of this tier alone.
    pub probability: Probability,
    /// Running total up to and including this tier.
    pub cumulative: u64,
}

/// Cumulative distribution across all tiers, summing to exactly [`SCALE`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TierTable {
    tiers: [Tier; TIER_COUNT],
}

impl TierTable {
    /// A table where every draw lands on no-prize.
    #[must_use]
    pub fn all_no_prize() -> Self {
        let mut tiers = TierKind::ORDER.map(|kind| Tier {
            kind,
            probability: Probability::ZERO,
            cumulative: 0,
        });
        let last = &mut tiers[TIER_COUNT - 1];
        last.probability = Probability::CERTAIN;
        last.cumulative = SCALE;
        Self { tiers }
    }

    /// Builds a table from scratch.
    ///
    /// # Errors
    ///
    /// - `MalformedTierTable` if the prize tiers sum past [`SCALE`]
    /// - `ArithmeticOverflow` if a pool ratio overflows
    pub fn build(inputs: &TierInputs) -> EconomyResult<Self> {
        let base = inputs.base_probability.raw();
        let mut raw = [0u64; TIER_COUNT];

        for (slot, kind) in raw.iter_mut().zip(TierKind::ORDER) {
            *slot = match kind {
                TierKind::Jackpot => inputs.jackpot_probability.raw(),
                TierKind::Pool(pool) => {
                    let ratio = mul_div(
                        inputs.ticket_price,
                        u128::from(base),
                        inputs.pool_averages[pool.index()],
                    )?;
                    u64::try_from(ratio).unwrap_or(u64::MAX)
                }
                TierKind::Refund(multiple) => base / u64::from(multiple),
                TierKind::NoPrize => 0,
            };
        }

        let prize_sum = raw[..TIER_COUNT - 1]
            .iter()
            .try_fold(0u64, |acc, p| acc.checked_add(*p))
            .unwrap_or(u64::MAX);
        if prize_sum > SCALE {
            return Err(EconomyError::MalformedTierTable {
                sum: prize_sum,
                scale: SCALE,
            });
        }
        raw[TIER_COUNT - 1] = SCALE - prize_sum;

        let mut running = 0u64;
        let mut table = Self::all_no_prize();
        for (tier, p) in table.tiers.iter_mut().zip(raw) {
            running += p;
            // Every p <= SCALE after the sum check
            tier.probability = Probability::new(p).unwrap_or(Probability::CERTAIN);
            tier.cumulative = running;
        }

        Ok(table)
    }

    /// Selects the tier for a draw in `[1, SCALE]` under a pity multiplier.
    #[must_use]
    pub fn select(&self, draw: u64, multiplier: u64) -> TierKind {
        self.tiers[..TIER_COUNT - 1]
            .iter()
            .filter(|tier| !tier.probability.is_zero())
            .find(|tier| draw <= tier.cumulative.saturating_mul(multiplier))
            .map_or(TierKind::NoPrize, |tier| tier.kind)
    }

    /// All rows in scan order.
    #[inline]
    #[must_use]
    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }

    /// Probability of a single tier.
    #[must_use]
    pub fn probability(&self, kind: TierKind) -> Probability {
        self.row(kind).map_or(Probability::ZERO, |t| t.probability)
    }

    /// Cumulative threshold of a tier.
    #[must_use]
    pub fn cumulative(&self, kind: TierKind) -> u64 {
        self.row(kind).map_or(0, |t| t.cumulative)
    }

    /// Sum of all tier probabilities. Always [`SCALE`].
    #[must_use]
    pub fn total(&self) -> u64 {
        self.tiers.iter().map(|t| t.probability.raw()).sum()
    }

    /// Probability of any prize at all.
    #[must_use]
    pub fn win_probability(&self) -> Probability {
        self.probability(TierKind::NoPrize).complement()
    }

    fn row(&self, kind: TierKind) -> Option<&Tier> {
        self.tiers.iter().find(|t| t.kind == kind)
    }
}

impl Default for TierTable {
    fn default() -> Self {
        Self::all_no_prize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs() -> TierInputs {
        TierInputs {
            ticket_price: 100,
            base_probability: Probability::new(1_000_000).unwrap(),
            jackpot_probability: Probability::new(100).unwrap(),
            pool_averages: [100_000, 10_000, 1_000],
        }
    }

    #[test]
    fn test_build_sums_to_scale() {
        let table = TierTable::build(&inputs()).unwrap();
        assert_eq!(table.total(), SCALE);
        assert_eq!(table.cumulative(TierKind::NoPrize), SCALE);
        assert_eq!(table.probability(TierKind::NoPrize).raw(), 98_777_800);
    }

    #[test]
    fn test_tier_formulas() {
        let table = TierTable::build(&inputs()).unwrap();
        assert_eq!(table.probability(TierKind::Jackpot).raw(), 100);
        assert_eq!(table.probability(TierKind::Pool(PoolKind::Top)).raw(), 1_000);
        assert_eq!(table.probability(TierKind::Pool(PoolKind::Medium)).raw(), 10_000);
        assert_eq!(table.probability(TierKind::Pool(PoolKind::Normal)).raw(), 100_000);
        assert_eq!(table.probability(TierKind::Refund(10_000)).raw(), 100);
        assert_eq!(table.probability(TierKind::Refund(1)).raw(), 1_000_000);
    }

    #[test]
    fn test_cumulative_is_monotonic() {
        let table = TierTable::build(&inputs()).unwrap();
        let cumulative: Vec<u64> = table.tiers().iter().map(|t| t.cumulative).collect();
        assert!(cumulative.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_select_boundaries() {
        let table = TierTable::build(&inputs()).unwrap();
        assert_eq!(table.select(1, 1), TierKind::Jackpot);
        assert_eq!(table.select(100, 1), TierKind::Jackpot);
        assert_eq!(table.select(101, 1), TierKind::Pool(PoolKind::Top));
        assert_eq!(table.select(1_100, 1), TierKind::Pool(PoolKind::Top));
        assert_eq!(table.select(1_101, 1), TierKind::Pool(PoolKind::Medium));
        assert_eq!(table.select(1_222_200, 1), TierKind::Refund(1));
        assert_eq!(table.select(1_222_201, 1), TierKind::NoPrize);
        assert_eq!(table.select(SCALE, 1), TierKind::NoPrize);
    }

    #[test]
    fn test_select_with_pity_multiplier() {
        let table = TierTable::build(&inputs()).unwrap();
        assert_eq!(table.select(200, 2), TierKind::Jackpot);
        assert_eq!(table.select(201, 2), TierKind::Pool(PoolKind::Top));
        assert_eq!(table.select(2_444_400, 2), TierKind::Refund(1));
        assert_eq!(table.select(2_444_401, 2), TierKind::NoPrize);
        assert_eq!(table.select(3_666_600, 3), TierKind::Refund(1));
    }

    #[test]
    fn test_empty_pool_contributes_nothing() {
        let mut empty_top = inputs();
        empty_top.pool_averages[PoolKind::Top.index()] = 0;
        let table = TierTable::build(&empty_top).unwrap();

        assert!(table.probability(TierKind::Pool(PoolKind::Top)).is_zero());
        assert_eq!(table.total(), SCALE);
        for draw in [1, 100, 101, 1_100, 10_100, SCALE] {
            for m in 1..=3 {
                assert_ne!(table.select(draw, m), TierKind::Pool(PoolKind::Top));
            }
        }
        assert_eq!(table.select(101, 1), TierKind::Pool(PoolKind::Medium));
    }

    #[test]
    fn test_residual_absorbs_floor() {
        let mut odd = inputs();
        odd.ticket_price = 7;
        odd.pool_averages = [3, 3, 3];
        odd.base_probability = Probability::new(1_000_001).unwrap();
        let table = TierTable::build(&odd).unwrap();
        assert_eq!(table.total(), SCALE);
    }

    #[test]
    fn test_overfull_table_rejected() {
        let mut greedy = inputs();
        greedy.ticket_price = 1_000_000;
        let result = TierTable::build(&greedy);
        assert!(matches!(result, Err(EconomyError::MalformedTierTable { .. })));
    }

    #[test]
    fn test_all_no_prize() {
        let table = TierTable::default();
        assert_eq!(table.total(), SCALE);
        assert_eq!(table.select(1, 3), TierKind::NoPrize);
        assert!(table.win_probability().is_zero());
    }
}
