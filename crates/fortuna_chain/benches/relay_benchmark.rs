//! # Relay Performance Benchmark
//!
//! ARCHITECT'S REQUIREMENTS:
//! - Log parsing: < 1ms
//! - Log to settlement: < 5ms
//!
//! Run with: `cargo bench --package fortuna_chain`

// Benchmarks don't need strict docs
#![allow(missing_docs)]

use std::sync::Arc;

use alloy_primitives::{Address, U256};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

use fortuna_chain::{
    encode_words, fulfillment_topic, EventParser, EventSimulator, FulfillmentListener,
    FulfillmentRelay, ListenerConfig,
};
use fortuna_economy::{EngineConfig, InMemoryLedger, ResolutionEngine, SimulatedOracle};

fn coordinator() -> Address {
    Address::repeat_byte(0xC0)
}

/// Benchmark: Fulfillment log parsing.
fn bench_parse_fulfillment(c: &mut Criterion) {
    let topics = [fulfillment_topic(), U256::from(12_345).to_be_bytes::<32>()];
    let data = encode_words(&[U256::MAX, U256::from(7)]);

    c.bench_function("parse_fulfillment", |b| {
        b.iter(|| {
            black_box(EventParser::parse_fulfillment(
                black_box(&topics),
                black_box(&data),
                12_345,
                0,
            ))
        });
    });
}

/// Benchmark: Filter, parse and queue one log.
fn bench_process_log(c: &mut Criterion) {
    let listener = FulfillmentListener::new(ListenerConfig {
        coordinator: coordinator(),
        channel_buffer: 1,
    });
    let receiver = listener.receiver();
    let mut simulator = EventSimulator::new(coordinator());
    let log = simulator.fulfillment(U256::from(1), &[U256::MAX, U256::from(7)]);

    c.bench_function("process_log", |b| {
        b.iter(|| {
            let queued = listener.process_log(black_box(&log));
            black_box(receiver.try_recv().ok());
            queued
        });
    });
}

/// Benchmark: Ticket purchase to settled outcome through the relay.
fn bench_end_to_end(c: &mut Criterion) {
    let oracle = Arc::new(SimulatedOracle::new(9));
    let ledger = Arc::new(InMemoryLedger::with_treasury(u128::from(u64::MAX)));
    let Ok(engine) = ResolutionEngine::new(EngineConfig::default(), oracle.clone(), ledger) else {
        return;
    };
    let price = engine.config().ticket_price;

    let listener = FulfillmentListener::new(ListenerConfig {
        coordinator: coordinator(),
        channel_buffer: 16,
    });
    let relay = FulfillmentRelay::new(listener.receiver(), listener.stats());
    let mut simulator = EventSimulator::new(coordinator());

    c.bench_function("log_to_settlement", |b| {
        let mut i = 0u8;
        b.iter(|| {
            i = i.wrapping_add(1);
            if let Ok(id) = engine.enter_ticket(Address::repeat_byte(i), price) {
                if let Some(words) = oracle.fulfill(id) {
                    let _ = listener.process_log(&simulator.fulfillment(id, &words));
                }
            }
            let report = relay.pump(&engine);
            black_box(engine.drain_events());
            report
        });
    });
}

criterion_group!(
    benches,
    bench_parse_fulfillment,
    bench_process_log,
    bench_end_to_end,
);
criterion_main!(benches);
