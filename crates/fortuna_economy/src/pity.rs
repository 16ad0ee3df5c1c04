//! # Pity Counter
//!
//! Consecutive losses raise a player's odds in steps:
//!
//! | losses  | multiplier |
//! |---------|------------|
//! | 0..5    | 1          |
//! | 5..20   | 2          |
//! | 20..    | 3          |
//!
//! Any win resets the streak.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

/// Losses needed for the first step.
pub const FIRST_STEP_LOSSES: u32 = 5;

/// Losses needed for the second step.
pub const SECOND_STEP_LOSSES: u32 = 20;

/// Per-player loss streak.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PityCounter {
    consecutive_losses: u32,
}

impl PityCounter {
    /// Creates a counter with no losses.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            consecutive_losses: 0,
        }
    }

    /// Current streak length.
    #[inline]
    #[must_use]
    pub const fn consecutive_losses(&self) -> u32 {
        self.consecutive_losses
    }

    /// Odds multiplier for the current streak.
    #[inline]
    #[must_use]
    pub const fn multiplier(&self) -> u64 {
        multiplier_for(self.consecutive_losses)
    }

    /// Extends the streak by one.
    #[inline]
    pub fn record_loss(&mut self) {
        self.consecutive_losses = self.consecutive_losses.saturating_add(1);
    }

    /// Clears the streak.
    #[inline]
    pub fn record_win(&mut self) {
        self.consecutive_losses = 0;
    }
}

/// Step function from streak length to multiplier.
#[inline]
#[must_use]
pub const fn multiplier_for(consecutive_losses: u32) -> u64 {
    if consecutive_losses < FIRST_STEP_LOSSES {
        1
    } else if consecutive_losses < SECOND_STEP_LOSSES {
        2
    } else {
        3
    }
}

/// Everything the engine tracks per player.
///
/// Created on the first successful purchase or referral registration; never
/// removed after that.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRecord {
    /// Lifetime ticket spend in wei.
    pub total_spent: u128,
    /// Loss streak.
    pub pity: PityCounter,
    /// Who referred this player, if anyone.
    pub referrer: Option<Address>,
    /// Tickets bought.
    pub tickets: u64,
    /// Tickets that won any prize.
    pub wins: u64,
}

impl PlayerRecord {
    /// Shorthand for the streak length.
    #[inline]
    #[must_use]
    pub const fn consecutive_losses(&self) -> u32 {
        self.pity.consecutive_losses()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multiplier_thresholds() {
        assert_eq!(multiplier_for(0), 1);
        assert_eq!(multiplier_for(4), 1);
        assert_eq!(multiplier_for(5), 2);
        assert_eq!(multiplier_for(19), 2);
        assert_eq!(multiplier_for(20), 3);
        assert_eq!(multiplier_for(u32::MAX), 3);
    }

    #[test]
    fn test_loss_then_win() {
        let mut pity = PityCounter::new();
        for _ in 0..5 {
            pity.record_loss();
        }
        assert_eq!(pity.consecutive_losses(), 5);
        assert_eq!(pity.multiplier(), 2);

        pity.record_win();
        assert_eq!(pity.consecutive_losses(), 0);
        assert_eq!(pity.multiplier(), 1);
    }

    #[test]
    fn test_streak_saturates() {
        let mut pity = PityCounter {
            consecutive_losses: u32::MAX,
        };
        pity.record_loss();
        assert_eq!(pity.consecutive_losses(), u32::MAX);
    }
}
