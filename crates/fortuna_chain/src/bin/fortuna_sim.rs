//! # FORTUNA Simulator
//!
//! Runs simulated tickets through the full path: purchase, oracle request,
//! coordinator log, listener, relay, settlement. Prints a tier histogram.
//!
//! ```bash
//! cargo run --release -p fortuna_chain --bin fortuna_sim -- 100000 --seed 7
//! ```

use std::collections::BTreeMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use alloy_primitives::{Address, U256};
use fortuna_chain::{EventSimulator, FulfillmentListener, FulfillmentRelay, ListenerConfig};
use fortuna_economy::{
    Custody, EngineConfig, InMemoryLedger, LotteryEvent, PoolKind, Prize, PrizeItem,
    ResolutionEngine, SimulatedOracle,
};
use tracing_subscriber::filter::LevelFilter;

const PLAYERS: u8 = 64;
const ITEMS_PER_POOL: u64 = 200;
const BATCH: usize = 256;

fn main() {
    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║         FORTUNA SIMULATOR                                        ║");
    println!("║         TICKET TO SETTLEMENT                                     ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");
    println!();

    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help") {
        println!("Usage: fortuna_sim [tickets] [options]");
        println!();
        println!("Options:");
        println!("  --seed <n>       Oracle seed (default 42)");
        println!("  --config <path>  Engine config TOML");
        println!("  --verbose        Log settlements");
        return;
    }

    let verbose = args.iter().any(|a| a == "--verbose");
    let tickets: usize = args
        .get(1)
        .filter(|a| !a.starts_with("--"))
        .and_then(|s| s.parse().ok())
        .unwrap_or(10_000);
    let seed: u64 = flag(&args, "--seed")
        .and_then(|s| s.parse().ok())
        .unwrap_or(42);

    tracing_subscriber::fmt()
        .with_max_level(if verbose {
            LevelFilter::DEBUG
        } else {
            LevelFilter::WARN
        })
        .init();

    let config = match flag(&args, "--config") {
        Some(path) => match EngineConfig::from_toml_file(path) {
            Ok(c) => c,
            Err(e) => {
                println!("Error: Could not load config: {}", e);
                return;
            }
        },
        None => EngineConfig::default(),
    };
    let price = config.ticket_price;

    let oracle = Arc::new(SimulatedOracle::new(seed));
    let ledger = Arc::new(InMemoryLedger::with_treasury(u128::from(u64::MAX)));
    let engine = match ResolutionEngine::new(config, oracle.clone(), ledger.clone()) {
        Ok(e) => e,
        Err(e) => {
            println!("Error: Invalid config: {}", e);
            return;
        }
    };

    for (kind, multiple) in [
        (PoolKind::Top, 100u128),
        (PoolKind::Medium, 20),
        (PoolKind::Normal, 5),
    ] {
        for token in 0..ITEMS_PER_POOL {
            let custody = Custody::new(
                Address::repeat_byte(0xA0 + kind.index() as u8),
                U256::from(token),
            );
            let value = price * (multiple + u128::from(token % 4));
            if let Err(e) = engine.deposit_item(kind, PrizeItem::new(custody, value)) {
                println!("Error: Could not stock {:?} pool: {}", kind, e);
                return;
            }
        }
    }

    let coordinator = Address::repeat_byte(0xC0);
    let listener = FulfillmentListener::new(ListenerConfig {
        coordinator,
        channel_buffer: BATCH,
    });
    let relay = FulfillmentRelay::new(listener.receiver(), listener.stats());
    let mut simulator = EventSimulator::new(coordinator);

    println!("Simulating {} tickets (seed {})...", tickets, seed);
    let started = Instant::now();

    let mut histogram: BTreeMap<String, u64> = BTreeMap::new();
    let mut rejected = 0usize;
    let mut failed = 0usize;
    let mut refused = 0usize;
    let mut jackpots = 0usize;

    let mut remaining = tickets;
    let mut turn = 0usize;
    while remaining > 0 {
        let batch = remaining.min(BATCH);
        for _ in 0..batch {
            let player = Address::repeat_byte((turn % usize::from(PLAYERS)) as u8 + 1);
            turn += 1;
            if let Err(e) = engine.enter_ticket(player, price) {
                tracing::warn!("Ticket refused for {}: {}", player, e);
                refused += 1;
            }
        }

        for (request_id, words) in oracle.fulfill_all() {
            let log = simulator.fulfillment(request_id, &words);
            if let Err(e) = listener.process_log(&log) {
                tracing::warn!("Log for request {} dropped: {}", request_id, e);
            }
        }
        simulator.next_block();

        let report = relay.pump(&engine);
        for outcome in &report.outcomes {
            *histogram.entry(outcome.tier.to_string()).or_default() += 1;
        }
        rejected += report.rejected;
        failed += report.failed;

        jackpots += engine
            .drain_events()
            .iter()
            .filter(|e| {
                matches!(e, LotteryEvent::Resolved(o) if matches!(o.prize, Prize::Jackpot { .. }))
            })
            .count();
        remaining -= batch;
    }

    let elapsed = started.elapsed();
    let settled: u64 = histogram.values().sum();
    let stats = listener.stats();

    println!();
    println!("┌─ TIER HISTOGRAM ───────────────────────────────────────────────┐");
    for (tier, count) in &histogram {
        let share = if settled == 0 {
            0.0
        } else {
            *count as f64 * 100.0 / settled as f64
        };
        println!("│ {:<20} {:>10}  {:>7.3}%", tier, count, share);
    }
    println!("└──────────────────────────────────────────────────────────────────┘");
    println!();
    println!("┌─ SUMMARY ──────────────────────────────────────────────────────┐");
    println!("│ Settled:            {}", settled);
    println!("│ Refused tickets:    {}", refused);
    println!("│ Rejected fulfills:  {}", rejected);
    println!("│ Failed settlements: {}", failed);
    println!("│ Jackpots paid:      {}", jackpots);
    println!("│ Jackpot balance:    {}", engine.jackpot_balance());
    println!("│ Collectibles:       {}", engine.collectibles_minted());
    println!(
        "│ Pools left:         top {} / medium {} / normal {}",
        engine.pool_len(PoolKind::Top),
        engine.pool_len(PoolKind::Medium),
        engine.pool_len(PoolKind::Normal)
    );
    println!("│ Treasury:           {}", ledger.treasury());
    println!(
        "│ Relay latency:      avg {} us / max {} us",
        stats.avg_latency_us.load(Ordering::Relaxed),
        stats.max_latency_us.load(Ordering::Relaxed)
    );
    println!("│ Wall time:          {:.2?}", elapsed);
    println!("└──────────────────────────────────────────────────────────────────┘");
    println!();

    if failed == 0 {
        println!("✓ Every fulfillment settled or was rejected cleanly");
    } else {
        println!("⚠ {} settlements await retry", failed);
    }
}

fn flag<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}
