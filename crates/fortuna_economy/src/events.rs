//! # Outcome Records
//!
//! Every purchase and settlement leaves a record in the engine's event
//! buffer. Consumers (indexers, the relay, dashboards) drain it with
//! `ResolutionEngine::drain_events`. A failed settlement is a record too;
//! funds are at stake, so failures are never silent.

use alloy_primitives::Address;

use crate::fixed_point::Probability;
use crate::oracle::RequestId;
use crate::pool::{PoolKind, PrizeItem};
use crate::tiers::TierKind;

/// What a resolved ticket paid out.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Prize {
    /// The whole jackpot balance.
    Jackpot {
        /// Wei paid.
        amount: u128,
    },
    /// An item taken from a pool.
    Item {
        /// Pool it came from.
        pool: PoolKind,
        /// The item, now in the player's custody.
        item: PrizeItem,
    },
    /// A multiple of the ticket price.
    Refund {
        /// Wei paid.
        amount: u128,
    },
    /// No prize; maybe a bonus collectible.
    Nothing {
        /// Serial of the collectible minted on this ticket, if any.
        collectible: Option<u64>,
    },
}

/// A settled ticket.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outcome {
    /// Request that carried the randomness.
    pub request_id: RequestId,
    /// Ticket holder.
    pub player: Address,
    /// Tier selected by the draw.
    pub tier: TierKind,
    /// What was paid.
    pub prize: Prize,
    /// Multiplier the player drew with.
    pub multiplier: u64,
}

impl Outcome {
    /// Returns true if anything other than no-prize was selected.
    #[inline]
    #[must_use]
    pub const fn is_win(&self) -> bool {
        self.tier.is_win()
    }
}

/// Engine event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LotteryEvent {
    /// A ticket was bought and randomness requested.
    TicketEntered {
        /// Ticket holder.
        player: Address,
        /// Request opened for the ticket.
        request_id: RequestId,
        /// Jackpot balance after accrual.
        jackpot_balance: u128,
    },
    /// A ticket was settled.
    Resolved(Outcome),
    /// Settlement was rejected; the request awaits a retry.
    SettlementFailed {
        /// Request that failed.
        request_id: RequestId,
        /// Ticket holder.
        player: Address,
        /// Tier that was being paid.
        tier: TierKind,
        /// Why it failed.
        reason: String,
    },
    /// The tier table was rebuilt.
    TiersRebuilt {
        /// Probability of any prize.
        win_probability: Probability,
    },
}
