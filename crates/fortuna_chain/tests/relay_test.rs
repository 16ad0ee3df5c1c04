//! End-to-end tests: coordinator log to settled ticket.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use alloy_primitives::{Address, U256};
use fortuna_chain::{
    EventSimulator, FulfillmentListener, FulfillmentRelay, ListenerConfig, ListenerStats,
};
use fortuna_economy::{
    EngineConfig, InMemoryLedger, LotteryEvent, Prize, RequestStatus, ResolutionEngine, Selection,
    SimulatedOracle, TierKind,
};

fn coordinator() -> Address {
    Address::repeat_byte(0xC0)
}

struct Harness {
    engine: ResolutionEngine,
    oracle: Arc<SimulatedOracle>,
    ledger: Arc<InMemoryLedger>,
    listener: FulfillmentListener,
    relay: FulfillmentRelay,
    simulator: EventSimulator,
    price: u128,
}

impl Harness {
    fn new() -> Self {
        let oracle = Arc::new(SimulatedOracle::new(77));
        let ledger = Arc::new(InMemoryLedger::with_treasury(1_000_000_000));
        let config = EngineConfig {
            ticket_price: 100,
            referral_min_spent: 300,
            ..EngineConfig::default()
        };
        let price = config.ticket_price;
        let engine = ResolutionEngine::new(config, oracle.clone(), ledger.clone()).unwrap();
        let listener = FulfillmentListener::new(ListenerConfig {
            coordinator: coordinator(),
            channel_buffer: 64,
        });
        let relay = FulfillmentRelay::new(listener.receiver(), listener.stats());

        Self {
            engine,
            oracle,
            ledger,
            listener,
            relay,
            simulator: EventSimulator::new(coordinator()),
            price,
        }
    }

    fn stats(&self) -> Arc<ListenerStats> {
        self.listener.stats()
    }
}

#[test]
fn test_tickets_settle_through_relay() {
    let mut h = Harness::new();

    for i in 1..=20u8 {
        h.engine.enter_ticket(Address::repeat_byte(i), h.price).unwrap();
    }
    for (request_id, words) in h.oracle.fulfill_all() {
        let log = h.simulator.fulfillment(request_id, &words);
        assert!(h.listener.process_log(&log).unwrap());
    }

    let report = h.relay.pump(&h.engine);
    assert_eq!(report.outcomes.len(), 20);
    assert_eq!(report.rejected, 0);
    assert_eq!(report.failed, 0);
    assert_eq!(h.engine.pending_requests(), 0);
    assert_eq!(h.stats().events_processed.load(Ordering::Relaxed), 20);

    for outcome in &report.outcomes {
        assert!(matches!(
            h.engine.request(outcome.request_id).map(|r| r.status),
            Some(RequestStatus::Resolved(_))
        ));
    }
}

#[test]
fn test_redelivered_log_rejected() {
    let mut h = Harness::new();
    let player = Address::repeat_byte(1);

    let id = h.engine.enter_ticket(player, h.price).unwrap();
    let words = h.oracle.fulfill(id).unwrap();
    let log = h.simulator.fulfillment(id, &words);

    h.listener.process_log(&log).unwrap();
    h.listener.process_log(&log).unwrap();

    let report = h.relay.pump(&h.engine);
    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(report.rejected, 1);

    let record = h.engine.player(player).unwrap();
    assert_eq!(record.tickets, 1);
    assert_eq!(u64::from(record.consecutive_losses()) + record.wins, 1);
}

#[test]
fn test_wrong_word_count_leaves_request_pending() {
    let mut h = Harness::new();
    let id = h.engine.enter_ticket(Address::repeat_byte(1), h.price).unwrap();

    let log = h.simulator.fulfillment(id, &[U256::from(5)]);
    h.listener.process_log(&log).unwrap();

    let report = h.relay.pump(&h.engine);
    assert_eq!(report.rejected, 1);
    assert_eq!(h.engine.pending_requests(), 1);

    // The proper delivery still settles
    let words = h.oracle.fulfill(id).unwrap();
    h.listener
        .process_log(&h.simulator.fulfillment(id, &words))
        .unwrap();
    assert_eq!(h.relay.pump(&h.engine).outcomes.len(), 1);
}

#[test]
fn test_impostor_logs_never_reach_engine() {
    let mut h = Harness::new();
    let id = h.engine.enter_ticket(Address::repeat_byte(1), h.price).unwrap();

    let mut impostor = EventSimulator::new(Address::repeat_byte(0x66));
    let forged = impostor.fulfillment(id, &[U256::ZERO, U256::ZERO]);
    assert!(!h.listener.process_log(&forged).unwrap());

    assert_eq!(h.relay.pump(&h.engine).total(), 0);
    assert_eq!(h.engine.pending_requests(), 1);
}

#[test]
fn test_failed_settlement_counted_then_retried() {
    let mut h = Harness::new();
    let player = Address::repeat_byte(1);

    let id = h.engine.enter_ticket(player, h.price).unwrap();
    let jackpot = h.engine.jackpot_balance();
    assert!(jackpot > 0);

    // Draw 1 lands in the jackpot tier
    let words = [U256::ZERO, U256::ZERO];
    h.ledger.fail_next(1);
    h.listener
        .process_log(&h.simulator.fulfillment(id, &words))
        .unwrap();

    let report = h.relay.pump(&h.engine);
    assert_eq!(report.failed, 1);
    assert_eq!(h.engine.jackpot_balance(), jackpot);
    assert_eq!(
        h.engine.request(id).map(|r| r.status),
        Some(RequestStatus::Failed(Selection {
            tier: TierKind::Jackpot,
            multiplier: 1
        }))
    );
    assert!(h
        .engine
        .drain_events()
        .iter()
        .any(|e| matches!(e, LotteryEvent::SettlementFailed { request_id, .. } if *request_id == id)));

    // Re-delivery does not settle a failed request
    h.listener
        .process_log(&h.simulator.fulfillment(id, &words))
        .unwrap();
    assert_eq!(h.relay.pump(&h.engine).rejected, 1);

    let outcome = h.engine.retry_settlement(id).unwrap();
    assert_eq!(outcome.tier, TierKind::Jackpot);
    assert_eq!(outcome.prize, Prize::Jackpot { amount: jackpot });
    assert_eq!(h.engine.jackpot_balance(), 0);
    assert_eq!(h.ledger.balance_of(player), jackpot);
}
