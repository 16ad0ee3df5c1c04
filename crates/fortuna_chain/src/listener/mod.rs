//! # Fulfillment Listener
//!
//! Filters coordinator logs, parses fulfillments and queues them for the
//! relay. Designed for sub-5ms log-to-settlement latency.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use alloy_primitives::{Address, U256};
use fortuna_economy::RequestId;

use crate::error::{ChainError, ChainResult};
use crate::events::{encode_words, fulfillment_topic, EventParser, FulfillmentEvent, RawLog};

/// Configuration for the listener.
#[derive(Clone, Debug)]
pub struct ListenerConfig {
    /// Coordinator contract whose logs are trusted.
    pub coordinator: Address,
    /// Channel buffer size for fulfillments.
    pub channel_buffer: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            coordinator: Address::ZERO,
            channel_buffer: 1024,
        }
    }
}

/// Statistics shared by the listener and the relay.
#[derive(Debug, Default)]
pub struct ListenerStats {
    /// Logs seen from any contract.
    pub logs_received: AtomicU64,
    /// Logs from other contracts or with other signatures.
    pub logs_ignored: AtomicU64,
    /// Fulfillment logs that failed to decode.
    pub logs_malformed: AtomicU64,
    /// Fulfillments dropped because the channel was full.
    pub events_dropped: AtomicU64,
    /// Fulfillments queued.
    pub events_queued: AtomicU64,
    /// Fulfillments handed to the engine.
    pub events_processed: AtomicU64,
    /// Average latency in microseconds.
    pub avg_latency_us: AtomicU64,
    /// Maximum latency in microseconds.
    pub max_latency_us: AtomicU64,
}

impl ListenerStats {
    /// Records the queue-to-settlement latency of one fulfillment.
    pub fn record_latency(&self, queued_at: Instant) {
        let latency_us = u64::try_from(queued_at.elapsed().as_micros()).unwrap_or(u64::MAX);

        let count = self.events_processed.fetch_add(1, Ordering::Relaxed) + 1;

        let _ = self
            .max_latency_us
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                (latency_us > current).then_some(latency_us)
            });

        // Weighted moving average favoring recent values
        let current_avg = self.avg_latency_us.load(Ordering::Relaxed);
        let new_avg = if count == 1 {
            latency_us
        } else {
            (current_avg.saturating_mul(7).saturating_add(latency_us)) / 8
        };
        self.avg_latency_us.store(new_avg, Ordering::Relaxed);
    }
}

/// Fulfillment and the instant it was queued.
pub type Queued = (FulfillmentEvent, Instant);

/// Bounded queue of parsed fulfillments.
///
/// ```text
/// ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
/// │   RPC/WS     │ ──▶ │   Listener   │ ──▶ │   Channel    │ ──▶ Relay ──▶ Engine
/// │   Node       │     │   (Parser)   │     │   (Bounded)  │
/// └──────────────┘     └──────────────┘     └──────────────┘
/// ```
pub struct FulfillmentListener {
    sender: Sender<Queued>,
    receiver: Receiver<Queued>,
    stats: Arc<ListenerStats>,
    config: ListenerConfig,
}

impl FulfillmentListener {
    /// Creates a listener.
    #[must_use]
    pub fn new(config: ListenerConfig) -> Self {
        let (sender, receiver) = bounded(config.channel_buffer);

        Self {
            sender,
            receiver,
            stats: Arc::new(ListenerStats::default()),
            config,
        }
    }

    /// Returns a clone of the fulfillment receiver.
    #[must_use]
    pub fn receiver(&self) -> Receiver<Queued> {
        self.receiver.clone()
    }

    /// Returns the shared statistics.
    #[must_use]
    pub fn stats(&self) -> Arc<ListenerStats> {
        Arc::clone(&self.stats)
    }

    /// Coordinator being watched.
    #[must_use]
    pub const fn coordinator(&self) -> Address {
        self.config.coordinator
    }

    /// Fulfillments waiting in the channel.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.receiver.len()
    }

    /// Queues an already parsed fulfillment.
    ///
    /// # Errors
    ///
    /// Returns `ChannelFull` if the queue is at capacity.
    pub fn inject(&self, event: FulfillmentEvent) -> ChainResult<()> {
        match self.sender.try_send((event, Instant::now())) {
            Ok(()) => {
                self.stats.events_queued.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(TrySendError::Full(_) | TrySendError::Disconnected(_)) => {
                self.stats.events_dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("Fulfillment channel full, dropping event");
                Err(ChainError::ChannelFull)
            }
        }
    }

    /// Filters, parses and queues one log.
    ///
    /// Returns `Ok(false)` for logs that are not fulfillments from the
    /// coordinator.
    ///
    /// # Errors
    ///
    /// - `MalformedLog` if a coordinator fulfillment log does not decode
    /// - `ChannelFull` if the queue is at capacity
    pub fn process_raw_log(
        &self,
        emitter: Address,
        topics: &[[u8; 32]],
        data: &[u8],
        block_number: u64,
        log_index: u32,
    ) -> ChainResult<bool> {
        self.stats.logs_received.fetch_add(1, Ordering::Relaxed);

        if emitter != self.config.coordinator || !EventParser::is_fulfillment(topics) {
            self.stats.logs_ignored.fetch_add(1, Ordering::Relaxed);
            return Ok(false);
        }

        let event = EventParser::parse_fulfillment(topics, data, block_number, log_index)
            .map_err(|e| {
                self.stats.logs_malformed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    "Malformed fulfillment at block {} log {}: {}",
                    block_number,
                    log_index,
                    e
                );
                e
            })?;

        self.inject(event)?;
        Ok(true)
    }

    /// Processes a [`RawLog`].
    ///
    /// # Errors
    ///
    /// As for [`FulfillmentListener::process_raw_log`].
    pub fn process_log(&self, log: &RawLog) -> ChainResult<bool> {
        self.process_raw_log(
            log.address,
            &log.topics,
            &log.data,
            log.block_number,
            log.log_index,
        )
    }
}

/// Simulated coordinator log generator.
///
/// Creates realistic fulfillment logs for tests and benchmarks without
/// network I/O.
pub struct EventSimulator {
    coordinator: Address,
    block_number: u64,
    log_index: u32,
}

impl EventSimulator {
    /// Creates a simulator emitting as `coordinator`, starting at block 1.
    #[must_use]
    pub const fn new(coordinator: Address) -> Self {
        Self {
            coordinator,
            block_number: 1,
            log_index: 0,
        }
    }

    /// Builds the fulfillment log for `request_id`.
    pub fn fulfillment(&mut self, request_id: RequestId, words: &[U256]) -> RawLog {
        let log = RawLog {
            address: self.coordinator,
            topics: vec![fulfillment_topic(), request_id.to_be_bytes::<32>()],
            data: encode_words(words),
            block_number: self.block_number,
            log_index: self.log_index,
        };
        self.log_index += 1;
        log
    }

    /// Builds an unrelated log from the same contract.
    pub fn unrelated(&mut self) -> RawLog {
        let log = RawLog {
            address: self.coordinator,
            topics: vec![[0xEE; 32]],
            data: Vec::new(),
            block_number: self.block_number,
            log_index: self.log_index,
        };
        self.log_index += 1;
        log
    }

    /// Moves to the next block.
    pub fn next_block(&mut self) {
        self.block_number += 1;
        self.log_index = 0;
    }
}
