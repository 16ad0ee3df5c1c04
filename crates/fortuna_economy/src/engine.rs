//! # Resolution Engine
//!
//! **THE HOUSE** - every ticket, payout and prize goes through here.
//!
//! ## Ticket Lifecycle
//!
//! ```text
//!  enter_ticket(player, paid)                    resolve(request id, [w0, w1])
//!        │                                                  │
//!        ├─ validate payment                                ├─ claim request (at most once)
//!        ├─ request randomness ──▶ Oracle ─ ─ ─ ─ ─ ─ ─ ─ ─ ┤
//!        ├─ pay referral batch                              ├─ r1 = w0 mod SCALE + 1
//!        └─ accrue jackpot, track spend                     ├─ tier = select(r1, multiplier)
//!                                                           ├─ transfer via ledger
//!                                                           └─ commit pool / jackpot / pity
//! ```
//!
//! ## Settlement Policy
//!
//! All-or-nothing with retry. The outcome is computed first and the
//! external transfer attempted; core state changes only once the ledger
//! confirms. A rejected transfer (or an invariant violation) leaves the
//! jackpot, pools, tier table, pity counters and collectible series
//! untouched, moves the request to `Failed` and records a
//! [`LotteryEvent::SettlementFailed`]. The failed request keeps the tier and
//! multiplier its attempt selected; [`ResolutionEngine::retry_settlement`]
//! pays that same tier again, whatever the player's streak or the tier table
//! has become since. A resolved request never settles twice.
//!
//! ## Event Buffer
//!
//! Outcome records queue until [`ResolutionEngine::drain_events`] takes them.
//! The buffer holds at most [`EVENT_BUFFER_CAPACITY`] records (see
//! [`ResolutionEngine::with_event_capacity`]); past that the oldest record is
//! dropped and counted in [`ResolutionEngine::dropped_events`].
//!
//! ## Locking
//!
//! | lock           | guards                                       |
//! |----------------|----------------------------------------------|
//! | player         | one player's record (spend, pity, referrer)  |
//! | house          | config, tier table, pools, jackpot           |
//! | collectibles   | bonus series counters                        |
//! | requests       | request ledger                               |
//! | events         | outcome buffer                               |
//!
//! Locks are always taken in that order. The tier table is derived from the
//! pools, so both live under the house lock and change together. Claiming a
//! request in the ledger happens before any other lock is held, so two
//! deliveries of the same id cannot both reach settlement.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use alloy_primitives::{Address, U256};
use parking_lot::{Mutex, RwLock};

use crate::collectible::SecondaryMintLottery;
use crate::config::{EngineConfig, OracleSettings, ShareConfig};
use crate::error::{EconomyError, EconomyResult};
use crate::events::{LotteryEvent, Outcome, Prize};
use crate::fixed_point::{draw_to_unit, mul_bp, Probability};
use crate::ledger::{LedgerError, Payout, ValueLedger};
use crate::oracle::{RandomnessOracle, RequestId, WORDS_PER_REQUEST};
use crate::pity::PlayerRecord;
use crate::pool::{Custody, PoolKind, PrizeItem, WeightedPool};
use crate::requests::{Request, RequestLedger, Selection};
use crate::tiers::{TierKind, TierTable};

/// Default bound on buffered outcome records.
pub const EVENT_BUFFER_CAPACITY: usize = 65_536;

/// State that must change together: the tier table is a function of the
/// config and the pool aggregates.
#[derive(Debug)]
struct House {
    config: EngineConfig,
    tiers: TierTable,
    pools: [WeightedPool; 3],
    jackpot: u128,
}

impl House {
    fn pool_averages(&self) -> [u128; 3] {
        PoolKind::ALL.map(|kind| self.pools[kind.index()].average_value())
    }

    fn build_tiers(&self, config: &EngineConfig) -> EconomyResult<TierTable> {
        TierTable::build(&config.tier_inputs(self.pool_averages()))
    }

    /// Tier table as it will be once the item at `index` leaves `kind`.
    fn tiers_after_removal(&self, kind: PoolKind, index: usize) -> EconomyResult<TierTable> {
        let pool = &self.pools[kind.index()];
        let item = pool.get(index).ok_or(EconomyError::ItemNotFound)?;

        let remaining = pool.len() - 1;
        let mut averages = self.pool_averages();
        averages[kind.index()] = if remaining == 0 {
            0
        } else {
            (pool.total_value() - item.declared_value) / remaining as u128
        };
        TierTable::build(&self.config.tier_inputs(averages))
    }
}

/// The tiered prize-resolution engine.
///
/// `Send + Sync`; share it behind an `Arc`.
pub struct ResolutionEngine {
    house: Mutex<House>,
    players: RwLock<HashMap<Address, Arc<Mutex<PlayerRecord>>>>,
    collectibles: Mutex<SecondaryMintLottery>,
    requests: Mutex<RequestLedger>,
    events: Mutex<VecDeque<LotteryEvent>>,
    event_capacity: usize,
    events_dropped: AtomicU64,
    oracle: Arc<dyn RandomnessOracle>,
    ledger: Arc<dyn ValueLedger>,
}

impl ResolutionEngine {
    /// Creates an engine with empty pools and a zero jackpot.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the configuration does not validate, or
    /// `MalformedTierTable` if its tiers do not fit the scale.
    pub fn new(
        config: EngineConfig,
        oracle: Arc<dyn RandomnessOracle>,
        ledger: Arc<dyn ValueLedger>,
    ) -> EconomyResult<Self> {
        config.validate()?;
        let pools = [WeightedPool::new(), WeightedPool::new(), WeightedPool::new()];
        let tiers = TierTable::build(&config.tier_inputs([0; 3]))?;
        let c = config.collectible;

        tracing::info!(
            "Resolution engine started: ticket price {} wei, win probability {}",
            config.ticket_price,
            tiers.win_probability()
        );

        Ok(Self {
            house: Mutex::new(House {
                config,
                tiers,
                pools,
                jackpot: 0,
            }),
            players: RwLock::new(HashMap::new()),
            collectibles: Mutex::new(SecondaryMintLottery::new(
                c.limit,
                c.step,
                c.decay,
                c.initial_probability,
            )),
            requests: Mutex::new(RequestLedger::new()),
            events: Mutex::new(VecDeque::with_capacity(1024)),
            event_capacity: EVENT_BUFFER_CAPACITY,
            events_dropped: AtomicU64::new(0),
            oracle,
            ledger,
        })
    }

    /// Bounds the outcome buffer at `capacity` records (at least one).
    #[must_use]
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }

    // ========================================================================
    // Purchase
    // ========================================================================

    /// Buys one ticket, stamped with the current wall-clock time.
    ///
    /// # Errors
    ///
    /// See [`ResolutionEngine::enter_ticket_at`].
    pub fn enter_ticket(&self, player: Address, paid: u128) -> EconomyResult<RequestId> {
        self.enter_ticket_at(player, paid, unix_now())
    }

    /// Buys one ticket issued at `issued_at` (unix seconds).
    ///
    /// Validates the payment, opens exactly one randomness request, pays
    /// the referral commission and cashback as one batch, then accrues the
    /// jackpot share and the player's spend. Any failure leaves no trace in
    /// the engine: no player record is created for a rejected purchase, and
    /// a request opened before a rejected referral payout is cancelled.
    ///
    /// The randomness request goes out before the referral batch. If the
    /// batch is then rejected, the coordinator still holds (and bills) that
    /// request; its eventual fulfillment is rejected as `UnknownRequest`.
    ///
    /// # Errors
    ///
    /// - `InvalidPayment` if `paid` is not the ticket price
    /// - `OracleFailure` if randomness cannot be requested
    /// - `TransferFailure` if the referral payout is rejected
    /// - `ArithmeticOverflow` if an accumulator would overflow
    pub fn enter_ticket_at(
        &self,
        player: Address,
        paid: u128,
        issued_at: u64,
    ) -> EconomyResult<RequestId> {
        let expected = self.house.lock().config.ticket_price;
        if paid != expected {
            return Err(EconomyError::InvalidPayment { expected, paid });
        }

        let entry = self.player_entry(player);
        let result = self.purchase(&entry, player, paid, issued_at);
        if result.is_err() {
            self.forget_if_untouched(player, &entry);
        }
        result
    }

    fn purchase(
        &self,
        entry: &Mutex<PlayerRecord>,
        player: Address,
        paid: u128,
        issued_at: u64,
    ) -> EconomyResult<RequestId> {
        let mut record = entry.lock();
        let mut house = self.house.lock();
        let config = house.config;

        if paid != config.ticket_price {
            return Err(EconomyError::InvalidPayment {
                expected: config.ticket_price,
                paid,
            });
        }

        let jackpot = house
            .jackpot
            .checked_add(mul_bp(paid, config.shares.jackpot_bp)?)
            .ok_or(EconomyError::ArithmeticOverflow)?;
        let total_spent = record
            .total_spent
            .checked_add(paid)
            .ok_or(EconomyError::ArithmeticOverflow)?;
        let referral = match record.referrer {
            Some(referrer) => vec![
                Payout {
                    to: referrer,
                    amount: mul_bp(paid, config.shares.referrer_commission_bp)?,
                },
                Payout {
                    to: player,
                    amount: mul_bp(paid, config.shares.cashback_bp)?,
                },
            ],
            None => Vec::new(),
        };
        let referral: Vec<Payout> = referral.into_iter().filter(|p| p.amount > 0).collect();

        let request_id = self
            .requests
            .lock()
            .open(self.oracle.as_ref(), player, issued_at)?;

        if !referral.is_empty() {
            if let Err(e) = self.ledger.pay_out_batch(&referral) {
                self.requests.lock().cancel(request_id);
                tracing::warn!(
                    "Ticket for {} rolled back, referral payout rejected: {}",
                    player,
                    e
                );
                return Err(transfer_failure(&e));
            }
        }

        house.jackpot = jackpot;
        record.total_spent = total_spent;
        record.tickets += 1;

        tracing::debug!(
            "Ticket entered: player {} request {} jackpot {}",
            player,
            request_id,
            jackpot
        );
        self.push_event(LotteryEvent::TicketEntered {
            player,
            request_id,
            jackpot_balance: jackpot,
        });

        Ok(request_id)
    }

    /// Records `referrer` as the player's referrer.
    ///
    /// # Errors
    ///
    /// - `ReferrerAlreadySet` if the player refers themselves or already
    ///   has a referrer
    /// - `ReferrerNotEligible` if the referrer has not spent enough
    pub fn register_referrer(&self, player: Address, referrer: Address) -> EconomyResult<()> {
        if player == referrer {
            return Err(EconomyError::ReferrerAlreadySet);
        }

        // Spend only grows, so a snapshot taken before locking the player
        // cannot admit an ineligible referrer.
        let required = self.house.lock().config.referral_min_spent;
        let spent = self
            .players
            .read()
            .get(&referrer)
            .map_or(0, |r| r.lock().total_spent);
        if spent < required {
            return Err(EconomyError::ReferrerNotEligible { spent, required });
        }

        let entry = self.player_entry(player);
        let mut record = entry.lock();
        if record.referrer.is_some() {
            return Err(EconomyError::ReferrerAlreadySet);
        }
        record.referrer = Some(referrer);

        tracing::debug!("Referrer {} registered for {}", referrer, player);
        Ok(())
    }

    // ========================================================================
    // Fulfillment
    // ========================================================================

    /// Settles a ticket with the oracle's random words.
    ///
    /// This is the fulfillment entry point. `words` must hold exactly two
    /// values: the tier draw and the item draw.
    ///
    /// # Errors
    ///
    /// - `MalformedFulfillment` if `words` is not exactly two long
    /// - `UnknownRequest` / `DuplicateFulfillment` from the request ledger;
    ///   nothing changes
    /// - `TransferFailure` or a fatal invariant error; the request is left
    ///   `Failed` for [`ResolutionEngine::retry_settlement`]
    pub fn resolve(&self, request_id: RequestId, words: &[U256]) -> EconomyResult<Outcome> {
        let words: [U256; 2] =
            words
                .try_into()
                .map_err(|_| EconomyError::MalformedFulfillment {
                    expected: WORDS_PER_REQUEST as usize,
                    got: words.len(),
                })?;

        let player = self.requests.lock().begin(request_id, words).map_err(|e| {
            tracing::warn!("Fulfillment rejected for request {}: {}", request_id, e);
            e
        })?;

        self.settle(request_id, player, words, None)
    }

    /// Settles a `Failed` request again.
    ///
    /// The tier and multiplier selected by the failed attempt are paid as
    /// they were; nothing is re-drawn. A pool tier whose pool has since
    /// emptied fails again with `EmptyPoolSample`.
    ///
    /// # Errors
    ///
    /// - `NotRetryable` unless the request is `Failed`
    /// - Any settlement error, as for [`ResolutionEngine::resolve`]
    pub fn retry_settlement(&self, request_id: RequestId) -> EconomyResult<Outcome> {
        let (player, words, selection) = self.requests.lock().retry(request_id)?;
        tracing::info!(
            "Retrying settlement of request {} ({})",
            request_id,
            selection.tier
        );
        self.settle(request_id, player, words, Some(selection))
    }

    fn settle(
        &self,
        request_id: RequestId,
        player: Address,
        words: [U256; 2],
        replay: Option<Selection>,
    ) -> EconomyResult<Outcome> {
        let entry = self.player_entry(player);
        let mut record = entry.lock();
        let mut house = self.house.lock();

        let Selection { tier, multiplier } = replay.unwrap_or_else(|| {
            let multiplier = record.pity.multiplier();
            Selection {
                tier: house.tiers.select(draw_to_unit(words[0]), multiplier),
                multiplier,
            }
        });
        let item_draw = draw_to_unit(words[1]);

        match self.pay_tier(&mut house, tier, player, item_draw) {
            Ok(prize) => {
                if tier.is_win() {
                    record.pity.record_win();
                    record.wins += 1;
                } else {
                    record.pity.record_loss();
                }
                self.requests.lock().complete(request_id, tier);

                let outcome = Outcome {
                    request_id,
                    player,
                    tier,
                    prize,
                    multiplier,
                };
                tracing::debug!(
                    "Request {} resolved: {} for {} (x{})",
                    request_id,
                    tier,
                    player,
                    multiplier
                );
                self.push_event(LotteryEvent::Resolved(outcome.clone()));
                Ok(outcome)
            }
            Err(e) => {
                // A replayed pool tier may find its pool emptied since
                if e.is_fatal() && replay.is_none() {
                    tracing::error!(
                        "Invariant violated settling request {} ({}): {}",
                        request_id,
                        tier,
                        e
                    );
                } else {
                    tracing::warn!(
                        "Settlement of request {} ({}) failed: {}",
                        request_id,
                        tier,
                        e
                    );
                }
                self.requests
                    .lock()
                    .fail(request_id, Selection { tier, multiplier });
                self.push_event(LotteryEvent::SettlementFailed {
                    request_id,
                    player,
                    tier,
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Performs the transfer for `tier` and commits house-side effects
    /// only once it succeeds.
    fn pay_tier(
        &self,
        house: &mut House,
        tier: TierKind,
        player: Address,
        item_draw: u64,
    ) -> EconomyResult<Prize> {
        match tier {
            TierKind::Jackpot => {
                let amount = house.jackpot;
                if amount > 0 {
                    self.ledger
                        .pay_out(player, amount)
                        .map_err(|e| transfer_failure(&e))?;
                }
                house.jackpot = 0;
                tracing::info!("JACKPOT: {} wins {} wei", player, amount);
                Ok(Prize::Jackpot { amount })
            }
            TierKind::Pool(kind) => {
                let index = house.pools[kind.index()].sample(item_draw)?;
                let item = self.take_item(house, kind, index, player)?;
                Ok(Prize::Item { pool: kind, item })
            }
            TierKind::Refund(multiple) => {
                let amount = house
                    .config
                    .ticket_price
                    .checked_mul(u128::from(multiple))
                    .ok_or(EconomyError::ArithmeticOverflow)?;
                self.ledger
                    .pay_out(player, amount)
                    .map_err(|e| transfer_failure(&e))?;
                Ok(Prize::Refund { amount })
            }
            TierKind::NoPrize => {
                let mut collectibles = self.collectibles.lock();
                let collectible = match collectibles.roll(item_draw) {
                    Some(serial) => {
                        self.ledger
                            .mint_collectible(player, serial)
                            .map_err(|e| transfer_failure(&e))?;
                        collectibles.commit();
                        tracing::info!(
                            "Collectible #{} minted to {} (next odds {})",
                            serial,
                            player,
                            collectibles.probability()
                        );
                        Some(serial)
                    }
                    None => None,
                };
                Ok(Prize::Nothing { collectible })
            }
        }
    }

    /// Moves the item at `index` out of `kind` to `to`.
    ///
    /// The follow-up tier table is built before the transfer, so a table
    /// that would not fit the scale aborts with nothing moved.
    fn take_item(
        &self,
        house: &mut House,
        kind: PoolKind,
        index: usize,
        to: Address,
    ) -> EconomyResult<PrizeItem> {
        let tiers = house.tiers_after_removal(kind, index)?;
        let custody = house.pools[kind.index()]
            .get(index)
            .ok_or(EconomyError::ItemNotFound)?
            .custody;

        self.ledger
            .transfer_item(&custody, to)
            .map_err(|e| transfer_failure(&e))?;

        let item = house.pools[kind.index()].remove_at(index)?;
        house.tiers = tiers;
        self.tiers_rebuilt(&house.tiers);
        Ok(item)
    }

    // ========================================================================
    // Inventory
    // ========================================================================

    /// Adds a prize item to a pool and rebuilds the tier table.
    ///
    /// # Errors
    ///
    /// - `InvalidItem` for a zero value or an item already in any pool
    /// - `MalformedTierTable` if the new table would not fit the scale; the
    ///   deposit is undone
    pub fn deposit_item(&self, kind: PoolKind, item: PrizeItem) -> EconomyResult<()> {
        let mut house = self.house.lock();
        if house.pools.iter().any(|pool| pool.contains(&item.custody)) {
            return Err(EconomyError::InvalidItem(
                "item already deposited".to_string(),
            ));
        }

        let value = item.declared_value;
        house.pools[kind.index()].add(item)?;

        let rebuilt = house.build_tiers(&house.config);
        match rebuilt {
            Ok(tiers) => {
                house.tiers = tiers;
                tracing::debug!("Deposited {} wei item into {} pool", value, kind.name());
                self.tiers_rebuilt(&house.tiers);
                Ok(())
            }
            Err(e) => {
                let pool = &mut house.pools[kind.index()];
                let last = pool.len() - 1;
                pool.remove_at(last)?;
                tracing::warn!("Deposit into {} pool rejected: {}", kind.name(), e);
                Err(e)
            }
        }
    }

    /// Returns an item from a pool to `to` (administrative withdrawal).
    ///
    /// # Errors
    ///
    /// - `ItemNotFound` if the pool does not hold the item
    /// - `TransferFailure` if the ledger rejects the transfer
    /// - `MalformedTierTable` if the remaining pool would not fit the scale
    pub fn withdraw_item(
        &self,
        kind: PoolKind,
        custody: &Custody,
        to: Address,
    ) -> EconomyResult<PrizeItem> {
        let mut house = self.house.lock();
        let index = house.pools[kind.index()]
            .position_of(custody)
            .ok_or(EconomyError::ItemNotFound)?;
        let item = self.take_item(&mut house, kind, index, to)?;
        tracing::info!("Withdrew item from {} pool to {}", kind.name(), to);
        Ok(item)
    }

    /// Rebuilds the tier table from the current config and pools.
    ///
    /// # Errors
    ///
    /// Returns `MalformedTierTable` if the tiers do not fit the scale; the
    /// previous table stays in force.
    pub fn recompute(&self) -> EconomyResult<()> {
        let mut house = self.house.lock();
        let tiers = house.build_tiers(&house.config)?;
        house.tiers = tiers;
        self.tiers_rebuilt(&house.tiers);
        Ok(())
    }

    fn tiers_rebuilt(&self, tiers: &TierTable) {
        let win_probability = tiers.win_probability();
        tracing::info!("Tier table rebuilt: win probability {}", win_probability);
        self.push_event(LotteryEvent::TiersRebuilt { win_probability });
    }

    // ========================================================================
    // Administration
    // ========================================================================

    /// Replaces the whole configuration.
    ///
    /// The collectible series keeps running with the parameters it was
    /// started with.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` or `MalformedTierTable`; the previous
    /// configuration stays in force.
    pub fn apply_config(&self, config: EngineConfig) -> EconomyResult<()> {
        self.reconfigure(|c| *c = config)
    }

    /// Sets the ticket price.
    ///
    /// # Errors
    ///
    /// As for [`ResolutionEngine::apply_config`].
    pub fn set_ticket_price(&self, ticket_price: u128) -> EconomyResult<()> {
        self.reconfigure(|c| c.ticket_price = ticket_price)
    }

    /// Sets the per-tier expected return.
    ///
    /// # Errors
    ///
    /// As for [`ResolutionEngine::apply_config`].
    pub fn set_base_probability(&self, probability: Probability) -> EconomyResult<()> {
        self.reconfigure(|c| c.base_probability = probability)
    }

    /// Sets the jackpot odds.
    ///
    /// # Errors
    ///
    /// As for [`ResolutionEngine::apply_config`].
    pub fn set_jackpot_probability(&self, probability: Probability) -> EconomyResult<()> {
        self.reconfigure(|c| c.jackpot_probability = probability)
    }

    /// Sets the ticket splits.
    ///
    /// # Errors
    ///
    /// As for [`ResolutionEngine::apply_config`].
    pub fn set_shares(&self, shares: ShareConfig) -> EconomyResult<()> {
        self.reconfigure(|c| c.shares = shares)
    }

    /// Sets the oracle subscription settings.
    ///
    /// # Errors
    ///
    /// As for [`ResolutionEngine::apply_config`].
    pub fn set_oracle_settings(&self, oracle: OracleSettings) -> EconomyResult<()> {
        self.reconfigure(|c| c.oracle = oracle)
    }

    fn reconfigure(&self, change: impl FnOnce(&mut EngineConfig)) -> EconomyResult<()> {
        let mut house = self.house.lock();
        let mut config = house.config;
        change(&mut config);
        config.validate()?;

        let tiers = house.build_tiers(&config).map_err(|e| {
            tracing::warn!("Configuration change rejected: {}", e);
            e
        })?;
        house.config = config;
        house.tiers = tiers;
        self.tiers_rebuilt(&house.tiers);
        Ok(())
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Current configuration.
    #[must_use]
    pub fn config(&self) -> EngineConfig {
        self.house.lock().config
    }

    /// Accumulated jackpot in wei.
    #[must_use]
    pub fn jackpot_balance(&self) -> u128 {
        self.house.lock().jackpot
    }

    /// Snapshot of the tier table.
    #[must_use]
    pub fn tier_table(&self) -> TierTable {
        self.house.lock().tiers.clone()
    }

    /// Items held by a pool.
    #[must_use]
    pub fn pool_len(&self, kind: PoolKind) -> usize {
        self.house.lock().pools[kind.index()].len()
    }

    /// Total declared value held by a pool.
    #[must_use]
    pub fn pool_value(&self, kind: PoolKind) -> u128 {
        self.house.lock().pools[kind.index()].total_value()
    }

    /// Snapshot of a player's record.
    #[must_use]
    pub fn player(&self, player: Address) -> Option<PlayerRecord> {
        self.players.read().get(&player).map(|r| *r.lock())
    }

    /// A player's current odds multiplier.
    #[must_use]
    pub fn multiplier(&self, player: Address) -> u64 {
        self.player(player).map_or(1, |r| r.pity.multiplier())
    }

    /// Snapshot of a request.
    #[must_use]
    pub fn request(&self, request_id: RequestId) -> Option<Request> {
        self.requests.lock().get(&request_id).cloned()
    }

    /// Requests still waiting for the oracle.
    #[must_use]
    pub fn pending_requests(&self) -> usize {
        self.requests.lock().pending_count()
    }

    /// Pending requests older than `max_age` seconds at `now`.
    ///
    /// Nothing is cancelled automatically; this is for operators.
    #[must_use]
    pub fn stale_requests(&self, now: u64, max_age: u64) -> Vec<RequestId> {
        self.requests.lock().stale(now, max_age)
    }

    /// Bonus collectibles minted so far.
    #[must_use]
    pub fn collectibles_minted(&self) -> u64 {
        self.collectibles.lock().minted()
    }

    /// Current odds of a bonus collectible on a losing ticket.
    #[must_use]
    pub fn collectible_probability(&self) -> Probability {
        self.collectibles.lock().probability()
    }

    /// Takes every buffered event, oldest first.
    pub fn drain_events(&self) -> Vec<LotteryEvent> {
        self.events.lock().drain(..).collect()
    }

    /// Events discarded because the buffer was full.
    #[must_use]
    pub fn dropped_events(&self) -> u64 {
        self.events_dropped.load(Ordering::Relaxed)
    }

    fn push_event(&self, event: LotteryEvent) {
        let mut events = self.events.lock();
        if events.len() >= self.event_capacity {
            events.pop_front();
            let dropped = self.events_dropped.fetch_add(1, Ordering::Relaxed) + 1;
            if dropped.is_power_of_two() {
                tracing::warn!("Event buffer full, {} events dropped so far", dropped);
            }
        }
        events.push_back(event);
    }

    /// Buffered event count.
    #[must_use]
    pub fn pending_event_count(&self) -> usize {
        self.events.lock().len()
    }

    fn player_entry(&self, player: Address) -> Arc<Mutex<PlayerRecord>> {
        if let Some(entry) = self.players.read().get(&player) {
            return Arc::clone(entry);
        }
        Arc::clone(self.players.write().entry(player).or_default())
    }

    /// Removes a record a rejected purchase created, unless anything else
    /// has touched or is holding it.
    fn forget_if_untouched(&self, player: Address, entry: &Arc<Mutex<PlayerRecord>>) {
        let mut players = self.players.write();
        // Clones are only handed out under this lock: the map's and ours
        if Arc::strong_count(entry) == 2 && *entry.lock() == PlayerRecord::default() {
            players.remove(&player);
        }
    }
}

impl std::fmt::Debug for ResolutionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let house = self.house.lock();
        f.debug_struct("ResolutionEngine")
            .field("jackpot", &house.jackpot)
            .field(
                "pools",
                &house.pools.iter().map(WeightedPool::len).collect::<Vec<_>>(),
            )
            .field("players", &self.players.read().len())
            .finish_non_exhaustive()
    }
}

fn transfer_failure(error: &LedgerError) -> EconomyError {
    EconomyError::TransferFailure {
        reason: error.to_string(),
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}
