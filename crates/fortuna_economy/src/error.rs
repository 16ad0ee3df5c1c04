//! # Economy Error Types
//!
//! All errors that can occur while entering tickets or settling them.

use alloy_primitives::U256;
use thiserror::Error;

/// Errors that can occur in the resolution engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EconomyError {
    /// Ticket payment does not match the configured price.
    #[error("invalid payment: expected {expected}, got {paid}")]
    InvalidPayment {
        /// The configured ticket price.
        expected: u128,
        /// The amount attached to the purchase.
        paid: u128,
    },

    /// Fulfillment arrived for a request id that was never opened.
    #[error("unknown randomness request: {0}")]
    UnknownRequest(U256),

    /// Fulfillment arrived for a request that is already settled or settling.
    #[error("duplicate fulfillment for request {0}")]
    DuplicateFulfillment(U256),

    /// Fulfillment carried the wrong number of random words.
    #[error("malformed fulfillment: expected {expected} random words, got {got}")]
    MalformedFulfillment {
        /// Words required per request.
        expected: usize,
        /// Words delivered.
        got: usize,
    },

    /// The oracle handed out a request id that is already tracked.
    #[error("randomness request id reused by oracle: {0}")]
    DuplicateRequestId(U256),

    /// Sampling was attempted on a pool with no weight.
    ///
    /// The tier table never routes to an empty pool, so this is an
    /// invariant violation.
    #[error("attempted to sample an empty prize pool")]
    EmptyPoolSample,

    /// Tier probabilities do not fit inside the probability scale.
    #[error("malformed tier table: non-residual tiers sum to {sum}, scale is {scale}")]
    MalformedTierTable {
        /// Sum of every tier except no-prize.
        sum: u64,
        /// The probability scale.
        scale: u64,
    },

    /// A collaborator payout, custody transfer or mint was rejected.
    #[error("transfer failed: {reason}")]
    TransferFailure {
        /// Reason reported by the ledger.
        reason: String,
    },

    /// The randomness oracle rejected a request.
    #[error("randomness oracle failure: {reason}")]
    OracleFailure {
        /// Reason reported by the oracle.
        reason: String,
    },

    /// Referrer has not spent enough to refer other players.
    #[error("referrer not eligible: spent {spent}, requires {required}")]
    ReferrerNotEligible {
        /// Amount the referrer has spent.
        spent: u128,
        /// Minimum spend required.
        required: u128,
    },

    /// Player already has a referrer (or tried to refer themselves).
    #[error("referrer already set or invalid")]
    ReferrerAlreadySet,

    /// Prize item cannot be deposited.
    #[error("invalid prize item: {0}")]
    InvalidItem(String),

    /// Prize item is not held by the pool.
    #[error("prize item not found in pool")]
    ItemNotFound,

    /// Request is in a state that does not allow the attempted transition.
    #[error("request {0} is not awaiting a settlement retry")]
    NotRetryable(U256),

    /// Arithmetic overflow in fixed-point calculation.
    #[error("arithmetic overflow in economic calculation")]
    ArithmeticOverflow,

    /// Invalid configuration file or value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl EconomyError {
    /// Returns true for invariant violations that must halt a resolution
    /// instead of falling back to another outcome.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::EmptyPoolSample | Self::MalformedTierTable { .. } | Self::ArithmeticOverflow
        )
    }
}

/// Result type for economy operations.
pub type EconomyResult<T> = Result<T, EconomyError>;
