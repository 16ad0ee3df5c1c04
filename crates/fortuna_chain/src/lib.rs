//! # FORTUNA Chain Bridge
//!
//! Carries oracle fulfillments from coordinator logs into the resolution
//! engine.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐     Logs     ┌─────────────────────┐
//! │  Randomness     │ ──────────▶  │  FulfillmentListener│
//! │  Coordinator    │              │  (filter + parse)   │
//! └─────────────────┘              └──────────┬──────────┘
//!                                             │ bounded channel
//!                                             ▼
//!                                  ┌─────────────────────┐
//!                                  │  FulfillmentRelay   │
//!                                  └──────────┬──────────┘
//!                                             │ resolve()
//!                                             ▼
//!                                  ┌─────────────────────┐
//!                                  │  ResolutionEngine   │
//!                                  └─────────────────────┘
//! ```
//!
//! ## Delivery Guarantees
//!
//! - Logs from any other contract are ignored
//! - A re-delivered log is rejected by the engine, never re-applied
//! - A failed settlement stays on the request for `retry_settlement`

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod error;
pub mod events;
pub mod listener;
pub mod relay;

pub use error::{ChainError, ChainResult};
pub use events::{
    encode_words, fulfillment_topic, EventParser, FulfillmentEvent, RawLog, FULFILLMENT_SIGNATURE,
};
pub use listener::{EventSimulator, FulfillmentListener, ListenerConfig, ListenerStats, Queued};
pub use relay::{FulfillmentRelay, RelayReport};
