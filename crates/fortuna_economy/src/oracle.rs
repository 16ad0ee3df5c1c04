//! # Randomness Oracle
//!
//! The engine never generates its own randomness. It asks an external
//! oracle for words and settles when the oracle calls back:
//!
//! ```text
//! enter_ticket ──request_randomness(2)──▶ Oracle
//!      │                                    │ (later, separate call)
//!      ▼                                    ▼
//!  request id                    resolve(request id, [w0, w1])
//! ```
//!
//! [`SimulatedOracle`] stands in for the real coordinator in tests,
//! benchmarks and simulations. It is seeded, so runs are reproducible.

use std::collections::BTreeMap;

use alloy_primitives::U256;
use parking_lot::Mutex;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use thiserror::Error;

/// Oracle-assigned request identifier.
pub type RequestId = U256;

/// Random words consumed per ticket: tier draw and item draw.
pub const WORDS_PER_REQUEST: u32 = 2;

/// Errors reported by a randomness oracle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
    /// The oracle refused the request.
    #[error("oracle rejected request: {0}")]
    Rejected(String),
    /// The subscription paying for randomness is out of funds.
    #[error("oracle subscription underfunded")]
    Underfunded,
}

/// Source of verifiable randomness.
///
/// `request_randomness` returns immediately with an id; the words arrive
/// later through the engine's fulfillment entry point.
pub trait RandomnessOracle: Send + Sync {
    /// Requests `num_words` random words.
    ///
    /// # Errors
    ///
    /// Returns an `OracleError` if the request cannot be placed.
    fn request_randomness(&self, num_words: u32) -> Result<RequestId, OracleError>;
}

/// Internal state of the simulated oracle.
struct SimState {
    rng: ChaCha20Rng,
    next_id: u64,
    /// Outstanding requests and how many words each wants.
    pending: BTreeMap<RequestId, u32>,
    /// Requests to reject before accepting again.
    fail_next: u32,
}

/// Deterministic in-process oracle backed by ChaCha20.
pub struct SimulatedOracle {
    state: Mutex<SimState>,
}

impl SimulatedOracle {
    /// Creates an oracle seeded with `seed`. Request ids start at 1.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            state: Mutex::new(SimState {
                rng: ChaCha20Rng::seed_from_u64(seed),
                next_id: 1,
                pending: BTreeMap::new(),
                fail_next: 0,
            }),
        }
    }

    /// Rejects the next `count` requests.
    pub fn fail_next(&self, count: u32) {
        self.state.lock().fail_next = count;
    }

    /// Ids of requests not yet fulfilled, oldest first.
    #[must_use]
    pub fn pending(&self) -> Vec<RequestId> {
        self.state.lock().pending.keys().copied().collect()
    }

    /// Produces the words for one outstanding request.
    ///
    /// Returns `None` if the id is not outstanding.
    pub fn fulfill(&self, request_id: RequestId) -> Option<Vec<U256>> {
        let mut state = self.state.lock();
        let num_words = state.pending.remove(&request_id)?;
        Some(random_words(&mut state.rng, num_words))
    }

    /// Produces words for every outstanding request, oldest first.
    pub fn fulfill_all(&self) -> Vec<(RequestId, Vec<U256>)> {
        let mut state = self.state.lock();
        let pending = std::mem::take(&mut state.pending);
        pending
            .into_iter()
            .map(|(id, n)| (id, random_words(&mut state.rng, n)))
            .collect()
    }
}

impl RandomnessOracle for SimulatedOracle {
    fn request_randomness(&self, num_words: u32) -> Result<RequestId, OracleError> {
        let mut state = self.state.lock();
        if state.fail_next > 0 {
            state.fail_next -= 1;
            return Err(OracleError::Rejected("simulated outage".to_string()));
        }

        let id = U256::from(state.next_id);
        state.next_id += 1;
        state.pending.insert(id, num_words);
        Ok(id)
    }
}

impl std::fmt::Debug for SimulatedOracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("SimulatedOracle")
            .field("next_id", &state.next_id)
            .field("pending", &state.pending.len())
            .finish_non_exhaustive()
    }
}

fn random_words(rng: &mut ChaCha20Rng, count: u32) -> Vec<U256> {
    (0..count)
        .map(|_| {
            U256::from_limbs([rng.next_u64(), rng.next_u64(), rng.next_u64(), rng.next_u64()])
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_ids() {
        let oracle = SimulatedOracle::new(7);
        let a = oracle.request_randomness(2).unwrap();
        let b = oracle.request_randomness(2).unwrap();
        assert_eq!(a, U256::from(1));
        assert_eq!(b, U256::from(2));
        assert_eq!(oracle.pending(), vec![a, b]);
    }

    #[test]
    fn test_fulfill_once() {
        let oracle = SimulatedOracle::new(7);
        let id = oracle.request_randomness(2).unwrap();
        let words = oracle.fulfill(id).unwrap();
        assert_eq!(words.len(), 2);
        assert!(oracle.fulfill(id).is_none());
    }

    #[test]
    fn test_same_seed_same_words() {
        let a = SimulatedOracle::new(99);
        let b = SimulatedOracle::new(99);
        let ia = a.request_randomness(2).unwrap();
        let ib = b.request_randomness(2).unwrap();
        assert_eq!(a.fulfill(ia), b.fulfill(ib));
    }

    #[test]
    fn test_outage() {
        let oracle = SimulatedOracle::new(1);
        oracle.fail_next(1);
        assert!(oracle.request_randomness(2).is_err());
        assert!(oracle.request_randomness(2).is_ok());
    }
}
