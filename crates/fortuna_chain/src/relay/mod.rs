//! # Fulfillment Relay
//!
//! Drains the listener's channel into [`ResolutionEngine::resolve`]. The
//! engine owns at-most-once settlement; the relay only classifies what
//! came back:
//!
//! | engine result                                   | counted as |
//! |-------------------------------------------------|------------|
//! | `Ok(outcome)`                                   | resolved   |
//! | `UnknownRequest`, `DuplicateFulfillment`, `MalformedFulfillment` | rejected |
//! | anything else (transfer failure, invariant)     | failed     |
//!
//! A failed request is left for `retry_settlement`; the relay never
//! re-delivers it.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use fortuna_economy::{EconomyError, Outcome, ResolutionEngine};

use crate::error::{ChainError, ChainResult};
use crate::events::FulfillmentEvent;
use crate::listener::{ListenerStats, Queued};

/// Tally of one pump.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RelayReport {
    /// Settled tickets, in delivery order.
    pub outcomes: Vec<Outcome>,
    /// Fulfillments the engine refused without any state change.
    pub rejected: usize,
    /// Fulfillments whose settlement failed and awaits a retry.
    pub failed: usize,
}

impl RelayReport {
    /// Fulfillments handled.
    #[must_use]
    pub fn total(&self) -> usize {
        self.outcomes.len() + self.rejected + self.failed
    }

    fn absorb(&mut self, other: Self) {
        self.outcomes.extend(other.outcomes);
        self.rejected += other.rejected;
        self.failed += other.failed;
    }
}

/// Moves queued fulfillments into the engine.
pub struct FulfillmentRelay {
    receiver: Receiver<Queued>,
    stats: Arc<ListenerStats>,
}

impl FulfillmentRelay {
    /// Creates a relay reading from a listener's channel.
    #[must_use]
    pub fn new(receiver: Receiver<Queued>, stats: Arc<ListenerStats>) -> Self {
        Self { receiver, stats }
    }

    /// Settles one fulfillment.
    ///
    /// # Errors
    ///
    /// Returns the engine's error wrapped in `ChainError::Economy`.
    pub fn relay(
        engine: &ResolutionEngine,
        event: &FulfillmentEvent,
    ) -> ChainResult<Outcome> {
        Ok(engine.resolve(event.request_id, &event.random_words)?)
    }

    /// Drains everything currently queued without blocking.
    pub fn pump(&self, engine: &ResolutionEngine) -> RelayReport {
        let mut report = RelayReport::default();
        while let Ok(queued) = self.receiver.try_recv() {
            self.handle(engine, queued, &mut report);
        }
        report
    }

    /// Waits up to `timeout` for the first fulfillment, then drains.
    ///
    /// Returns an empty report on timeout or once every sender is gone.
    pub fn pump_timeout(&self, engine: &ResolutionEngine, timeout: Duration) -> RelayReport {
        let mut report = RelayReport::default();
        match self.receiver.recv_timeout(timeout) {
            Ok(queued) => self.handle(engine, queued, &mut report),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => return report,
        }
        report.absorb(self.pump(engine));
        report
    }

    fn handle(&self, engine: &ResolutionEngine, queued: Queued, report: &mut RelayReport) {
        let (event, queued_at) = queued;

        match Self::relay(engine, &event) {
            Ok(outcome) => report.outcomes.push(outcome),
            Err(ChainError::Economy(
                EconomyError::UnknownRequest(_)
                | EconomyError::DuplicateFulfillment(_)
                | EconomyError::MalformedFulfillment { .. },
            )) => {
                report.rejected += 1;
            }
            Err(e) => {
                tracing::warn!(
                    "Fulfillment for request {} (block {}) left for retry: {}",
                    event.request_id,
                    event.block_number,
                    e
                );
                report.failed += 1;
            }
        }

        self.stats.record_latency(queued_at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::{FulfillmentListener, ListenerConfig};
    use alloy_primitives::{Address, U256};
    use fortuna_economy::{EngineConfig, InMemoryLedger, SimulatedOracle};
    use std::sync::atomic::Ordering;

    fn engine() -> (ResolutionEngine, Arc<SimulatedOracle>) {
        let oracle = Arc::new(SimulatedOracle::new(3));
        let ledger = Arc::new(InMemoryLedger::with_treasury(u128::from(u64::MAX)));
        let engine = ResolutionEngine::new(EngineConfig::default(), oracle.clone(), ledger).unwrap();
        (engine, oracle)
    }

    fn event(request_id: U256, random_words: Vec<U256>) -> FulfillmentEvent {
        FulfillmentEvent {
            request_id,
            random_words,
            block_number: 1,
            log_index: 0,
        }
    }

    #[test]
    fn test_pump_classifies() {
        let (engine, oracle) = engine();
        let listener = FulfillmentListener::new(ListenerConfig::default());
        let relay = FulfillmentRelay::new(listener.receiver(), listener.stats());

        let price = engine.config().ticket_price;
        let id = engine.enter_ticket(Address::repeat_byte(1), price).unwrap();
        let words = oracle.fulfill(id).unwrap();

        listener.inject(event(id, words.clone())).unwrap();
        listener.inject(event(id, words)).unwrap();
        listener.inject(event(U256::from(999), vec![U256::ZERO; 2])).unwrap();

        let report = relay.pump(&engine);
        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(report.rejected, 2);
        assert_eq!(report.failed, 0);
        assert_eq!(listener.stats().events_processed.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn test_wrong_word_count_is_rejected() {
        let (engine, _) = engine();
        let price = engine.config().ticket_price;
        let id = engine.enter_ticket(Address::repeat_byte(1), price).unwrap();

        let result = FulfillmentRelay::relay(&engine, &event(id, vec![U256::ZERO; 3]));
        assert_eq!(
            result,
            Err(ChainError::Economy(EconomyError::MalformedFulfillment {
                expected: 2,
                got: 3
            }))
        );
        assert_eq!(engine.pending_requests(), 1);
    }

    #[test]
    fn test_pump_timeout_empty() {
        let (engine, _) = engine();
        let listener = FulfillmentListener::new(ListenerConfig::default());
        let relay = FulfillmentRelay::new(listener.receiver(), listener.stats());

        let report = relay.pump_timeout(&engine, Duration::from_millis(5));
        assert_eq!(report.total(), 0);
    }
}
