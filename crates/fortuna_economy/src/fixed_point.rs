//! # Fixed-Point Probability
//!
//! **CRITICAL: NO FLOATING POINT IN ODDS OR PAYOUTS**
//!
//! Probabilities are integers over a fixed denominator [`SCALE`]. A value `p`
//! means `p / SCALE`. Every ratio is computed multiply-first, divide-last and
//! rounds toward zero. Callers must tolerate that the floored parts of a
//! whole can sum to less than the whole; the tier table absorbs that slack
//! in its residual no-prize tier.
//!
//! ## Why 10^8?
//!
//! The jackpot sits around one in a million. Eight decimal places leave two
//! digits of headroom below that so rounding never zeroes a rare tier.

use std::fmt;

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

use crate::error::{EconomyError, EconomyResult};

/// Probability denominator: `SCALE` represents certainty.
pub const SCALE: u64 = 100_000_000;

/// Basis-point denominator (10000 = 100%).
pub const BASIS_POINTS: u128 = 10_000;

/// Computes `a * b / c`, rounding toward zero.
///
/// The product is formed in 256-bit width so it never overflows. A zero
/// divisor yields zero: an empty pool contributes nothing, it is not an
/// error.
///
/// # Errors
///
/// Returns `EconomyError::ArithmeticOverflow` if the quotient does not fit
/// in a `u128`.
#[inline]
pub fn mul_div(a: u128, b: u128, c: u128) -> EconomyResult<u128> {
    if c == 0 {
        return Ok(0);
    }
    if let Some(product) = a.checked_mul(b) {
        return Ok(product / c);
    }

    let wide = U256::from(a) * U256::from(b) / U256::from(c);
    if wide > U256::from(u128::MAX) {
        return Err(EconomyError::ArithmeticOverflow);
    }
    let limbs = wide.as_limbs();
    Ok((u128::from(limbs[1]) << 64) | u128::from(limbs[0]))
}

/// Takes a basis-point share of an amount, floor.
///
/// # Errors
///
/// Returns `EconomyError::ArithmeticOverflow` on overflow.
#[inline]
pub fn mul_bp(amount: u128, basis_points: u32) -> EconomyResult<u128> {
    mul_div(amount, u128::from(basis_points), BASIS_POINTS)
}

/// Maps a 256-bit random word onto a draw in `[1, SCALE]`.
#[inline]
#[must_use]
pub fn draw_to_unit(word: U256) -> u64 {
    let reduced = word % U256::from(SCALE);
    // reduced < SCALE, so the low limb holds the whole value
    reduced.as_limbs()[0] + 1
}

/// A probability as an integer fraction of [`SCALE`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Probability(u64);

impl Probability {
    /// Never happens.
    pub const ZERO: Self = Self(0);

    /// Always happens.
    pub const CERTAIN: Self = Self(SCALE);

    /// Creates a probability from its raw numerator.
    ///
    /// Returns `None` if `raw` exceeds [`SCALE`].
    #[inline]
    #[must_use]
    pub const fn new(raw: u64) -> Option<Self> {
        if raw > SCALE {
            None
        } else {
            Some(Self(raw))
        }
    }

    /// Creates a probability from `numerator / denominator`, floor.
    ///
    /// A zero denominator gives [`Probability::ZERO`]; a ratio above one
    /// saturates at [`Probability::CERTAIN`].
    ///
    /// # Errors
    ///
    /// Returns `EconomyError::ArithmeticOverflow` if the scaled ratio does
    /// not fit in a `u128`.
    pub fn from_ratio(numerator: u128, denominator: u128) -> EconomyResult<Self> {
        let raw = mul_div(numerator, u128::from(SCALE), denominator)?;
        Ok(Self(u64::try_from(raw).map_or(SCALE, |v| v.min(SCALE))))
    }

    /// Returns the raw numerator.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Returns true if this probability is zero.
    #[inline]
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Checked addition. Returns `None` if the sum exceeds certainty.
    #[inline]
    #[must_use]
    pub const fn checked_add(self, rhs: Self) -> Option<Self> {
        let sum = self.0 + rhs.0;
        if sum > SCALE {
            None
        } else {
            Some(Self(sum))
        }
    }

    /// Saturating subtraction.
    #[inline]
    #[must_use]
    pub const fn saturating_sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }

    /// Returns `1 - self`.
    #[inline]
    #[must_use]
    pub const fn complement(self) -> Self {
        Self(SCALE - self.0)
    }

    /// Divides by an integer, floor. Division by zero gives zero.
    #[inline]
    #[must_use]
    pub const fn div_int(self, divisor: u64) -> Self {
        if divisor == 0 {
            Self(0)
        } else {
            Self(self.0 / divisor)
        }
    }

    /// Returns the raw threshold stretched by an integer multiplier.
    ///
    /// The result may exceed [`SCALE`]; it is a comparison threshold, not a
    /// probability.
    #[inline]
    #[must_use]
    pub const fn mul_multiplier(self, multiplier: u64) -> u64 {
        self.0.saturating_mul(multiplier)
    }

    /// Returns true if a draw in `[1, SCALE]` lands inside this probability.
    #[inline]
    #[must_use]
    pub const fn admits(self, draw: u64) -> bool {
        draw <= self.0
    }
}

impl fmt::Debug for Probability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Probability({self})")
    }
}

impl fmt::Display for Probability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // SCALE / 100 units per percentage point
        const PER_PERCENT: u64 = SCALE / 100;
        write!(f, "{}.{:06}%", self.0 / PER_PERCENT, self.0 % PER_PERCENT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mul_div_floors() {
        assert_eq!(mul_div(10, 10, 3).unwrap(), 33);
        assert_eq!(mul_div(7, 1, 2).unwrap(), 3);
    }

    #[test]
    fn test_mul_div_zero_divisor_is_zero() {
        assert_eq!(mul_div(1_000, 5, 0).unwrap(), 0);
    }

    #[test]
    fn test_mul_div_wide_product() {
        // Product overflows u128, quotient fits
        let a = u128::MAX / 2;
        assert_eq!(mul_div(a, 4, 8).unwrap(), a / 2);
    }

    #[test]
    fn test_mul_div_quotient_overflow() {
        assert_eq!(
            mul_div(u128::MAX, 2, 1),
            Err(EconomyError::ArithmeticOverflow)
        );
    }

    #[test]
    fn test_mul_bp() {
        assert_eq!(mul_bp(100, 500).unwrap(), 5);
        assert_eq!(mul_bp(100, 200).unwrap(), 2);
        assert_eq!(mul_bp(99, 100).unwrap(), 0);
    }

    #[test]
    fn test_draw_to_unit_range() {
        assert_eq!(draw_to_unit(U256::ZERO), 1);
        assert_eq!(draw_to_unit(U256::from(SCALE - 1)), SCALE);
        assert_eq!(draw_to_unit(U256::from(SCALE)), 1);
        let top = draw_to_unit(U256::MAX);
        assert!((1..=SCALE).contains(&top));
    }

    #[test]
    fn test_probability_bounds() {
        assert!(Probability::new(SCALE).is_some());
        assert!(Probability::new(SCALE + 1).is_none());
        assert_eq!(Probability::CERTAIN.complement(), Probability::ZERO);
    }

    #[test]
    fn test_from_ratio() {
        assert_eq!(Probability::from_ratio(1, 4).unwrap().raw(), SCALE / 4);
        assert_eq!(Probability::from_ratio(5, 0).unwrap(), Probability::ZERO);
        assert_eq!(Probability::from_ratio(3, 2).unwrap(), Probability::CERTAIN);
    }

    #[test]
    fn test_checked_add_past_certainty() {
        let half = Probability::new(SCALE / 2).unwrap();
        assert_eq!(half.checked_add(half), Some(Probability::CERTAIN));
        assert!(Probability::CERTAIN.checked_add(Probability::new(1).unwrap()).is_none());
    }

    #[test]
    fn test_display() {
        let p = Probability::new(12_345_678).unwrap();
        assert_eq!(format!("{p}"), "12.345678%");
    }
}
