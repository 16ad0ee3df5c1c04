//! # Bonus Collectible Series
//!
//! A capped series of collectibles handed out on losing tickets. The odds
//! start at a configured probability and are divided by `decay` every
//! `step` mints, so early players are luckier. They never recover.
//! Past the cap nothing mints; that is not an error.

use crate::fixed_point::Probability;

/// Probability-gated minting of a capped, sequentially numbered series.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SecondaryMintLottery {
    limit: u64,
    step: u64,
    decay: u64,
    probability: Probability,
    minted: u64,
}

impl SecondaryMintLottery {
    /// Creates a fresh series.
    ///
    /// `step` and `decay` below their minimums are raised to 1 and 2.
    #[must_use]
    pub fn new(limit: u64, step: u64, decay: u64, initial_probability: Probability) -> Self {
        Self {
            limit,
            step: step.max(1),
            decay: decay.max(2),
            probability: initial_probability,
            minted: 0,
        }
    }

    /// Restores a series part-way through.
    #[must_use]
    pub fn resume(mut self, minted: u64, probability: Probability) -> Self {
        self.minted = minted.min(self.limit);
        self.probability = probability;
        self
    }

    /// Serials minted so far.
    #[inline]
    #[must_use]
    pub const fn minted(&self) -> u64 {
        self.minted
    }

    /// Series cap.
    #[inline]
    #[must_use]
    pub const fn limit(&self) -> u64 {
        self.limit
    }

    /// Current odds per losing ticket.
    #[inline]
    #[must_use]
    pub const fn probability(&self) -> Probability {
        self.probability
    }

    /// Returns true once the cap is reached.
    #[inline]
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.minted >= self.limit
    }

    /// Checks a draw in `[1, SCALE]` without changing anything.
    ///
    /// Returns the serial that would be minted.
    #[must_use]
    pub const fn roll(&self, draw: u64) -> Option<u64> {
        if self.is_exhausted() || !self.probability.admits(draw) {
            None
        } else {
            Some(self.minted + 1)
        }
    }

    /// Counts one mint and applies the decay on step boundaries.
    ///
    /// Returns the serial just minted, or `None` if the series is exhausted.
    pub fn commit(&mut self) -> Option<u64> {
        if self.is_exhausted() {
            return None;
        }

        self.minted += 1;
        if self.minted % self.step == 0 {
            self.probability = self.probability.div_int(self.decay);
        }
        Some(self.minted)
    }

    /// Rolls and, on success, commits in one step.
    pub fn maybe_mint(&mut self, draw: u64) -> Option<u64> {
        self.roll(draw)?;
        self.commit()
    }
}
