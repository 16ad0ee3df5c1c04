//! # Chain Bridge Errors

use fortuna_economy::EconomyError;
use thiserror::Error;

/// Errors raised between a raw log and a settled ticket.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    /// The log does not decode as a fulfillment.
    #[error("malformed fulfillment log: {0}")]
    MalformedLog(String),

    /// The fulfillment queue is full; the log must be re-read later.
    #[error("fulfillment channel full")]
    ChannelFull,

    /// The engine rejected or failed the fulfillment.
    #[error(transparent)]
    Economy(#[from] EconomyError),
}

/// Result type for bridge operations.
pub type ChainResult<T> = Result<T, ChainError>;
