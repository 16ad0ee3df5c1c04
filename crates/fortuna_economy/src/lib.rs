//! # FORTUNA Economy
//!
//! Prize-resolution core for the FORTUNA ticket lottery.
//!
//! ## Design Principles
//!
//! 1. **Zero floating point** - odds are integers over `SCALE`, payouts are wei
//! 2. **Two-phase settlement** - purchase requests randomness, a later
//!    fulfillment settles; every request settles at most once
//! 3. **All-or-nothing** - no core state changes unless the ledger confirms
//! 4. **External configuration** - all balance knobs in one TOML file
//!
//! ## Example
//!
//! ```rust,ignore
//! use fortuna_economy::{EngineConfig, InMemoryLedger, ResolutionEngine, SimulatedOracle};
//!
//! let oracle = Arc::new(SimulatedOracle::new(7));
//! let ledger = Arc::new(InMemoryLedger::with_treasury(1_000_000_000_000_000_000));
//! let engine = ResolutionEngine::new(EngineConfig::from_toml_file("fortuna.toml")?, oracle.clone(), ledger)?;
//!
//! let request_id = engine.enter_ticket(player, engine.config().ticket_price)?;
//!
//! // Later, when the oracle calls back
//! let words = oracle.fulfill(request_id).unwrap_or_default();
//! let outcome = engine.resolve(request_id, &words)?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod collectible;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod fixed_point;
pub mod ledger;
pub mod oracle;
pub mod pity;
pub mod pool;
pub mod requests;
pub mod tiers;

pub use collectible::SecondaryMintLottery;
pub use config::{CollectibleConfig, EngineConfig, OracleSettings, ShareConfig};
pub use engine::ResolutionEngine;
pub use error::{EconomyError, EconomyResult};
pub use events::{LotteryEvent, Outcome, Prize};
pub use fixed_point::{draw_to_unit, mul_bp, mul_div, Probability, BASIS_POINTS, SCALE};
pub use ledger::{InMemoryLedger, LedgerError, Payout, ValueLedger};
pub use oracle::{OracleError, RandomnessOracle, RequestId, SimulatedOracle, WORDS_PER_REQUEST};
pub use pity::{PityCounter, PlayerRecord};
pub use pool::{Custody, PoolKind, PrizeItem, WeightedPool};
pub use requests::{Request, RequestLedger, RequestStatus, Selection};
pub use tiers::{TierInputs, TierKind, TierTable};
