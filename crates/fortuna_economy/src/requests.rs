//! # Request Ledger
//!
//! Correlates oracle request ids with the players who bought the tickets,
//! and guarantees each request settles at most once.
//!
//! ## Lifecycle
//!
//! ```text
//!            open                begin               complete
//!  (none) ────────▶ Pending ────────────▶ Settling ─────────────▶ Resolved
//!                     │                      │  ▲
//!              cancel │                 fail │  │ retry
//!                     ▼                      ▼  │
//!                  (none)                   Failed
//! ```
//!
//! A second fulfillment of the same id is rejected in every state but
//! `Pending`. Random words are kept on the request once they arrive. A
//! failed request keeps the [`Selection`] its attempt made, and a retry
//! settles that selection again instead of drawing a new one.
//! Nothing here times out: a request nobody fulfills stays `Pending` and
//! shows up in [`RequestLedger::stale`].

use std::collections::HashMap;

use alloy_primitives::{Address, U256};

use crate::error::{EconomyError, EconomyResult};
use crate::oracle::{RandomnessOracle, RequestId, WORDS_PER_REQUEST};
use crate::tiers::TierKind;

/// The tier an attempt selected and the multiplier it was selected under.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Selection {
    /// Tier the draw landed in.
    pub tier: TierKind,
    /// Pity multiplier at selection time.
    pub multiplier: u64,
}

/// Where a request is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestStatus {
    /// Waiting for the oracle.
    Pending,
    /// Words arrived; settlement in progress.
    Settling,
    /// Settlement was rejected; may be retried with the stored selection.
    Failed(Selection),
    /// Settled. Terminal.
    Resolved(TierKind),
}

/// A randomness request bound to a ticket.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Request {
    /// Oracle-assigned id.
    pub request_id: RequestId,
    /// Ticket holder.
    pub player: Address,
    /// Unix seconds at purchase.
    pub issued_at: u64,
    /// Words delivered by the oracle, once they arrive.
    pub words: Option<[U256; 2]>,
    /// Settlement attempts that were rejected.
    pub failed_attempts: u32,
    /// Current status.
    pub status: RequestStatus,
}

/// Tracks every randomness request the engine has opened.
#[derive(Debug, Default)]
pub struct RequestLedger {
    requests: HashMap<RequestId, Request>,
}

impl RequestLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues exactly one upstream request for two words and binds it to
    /// `player`.
    ///
    /// # Errors
    ///
    /// - `OracleFailure` if the oracle rejects the request
    /// - `DuplicateRequestId` if the oracle reuses a known id
    pub fn open<O: RandomnessOracle + ?Sized>(
        &mut self,
        oracle: &O,
        player: Address,
        issued_at: u64,
    ) -> EconomyResult<RequestId> {
        let request_id = oracle
            .request_randomness(WORDS_PER_REQUEST)
            .map_err(|e| EconomyError::OracleFailure {
                reason: e.to_string(),
            })?;

        if self.requests.contains_key(&request_id) {
            return Err(EconomyError::DuplicateRequestId(request_id));
        }

        self.requests.insert(
            request_id,
            Request {
                request_id,
                player,
                issued_at,
                words: None,
                failed_attempts: 0,
                status: RequestStatus::Pending,
            },
        );
        Ok(request_id)
    }

    /// Claims a pending request for settlement and records its words.
    ///
    /// # Errors
    ///
    /// - `UnknownRequest` if the id was never opened (or was cancelled)
    /// - `DuplicateFulfillment` if words already arrived for this id
    pub fn begin(&mut self, request_id: RequestId, words: [U256; 2]) -> EconomyResult<Address> {
        let request = self
            .requests
            .get_mut(&request_id)
            .ok_or(EconomyError::UnknownRequest(request_id))?;

        if request.status != RequestStatus::Pending {
            return Err(EconomyError::DuplicateFulfillment(request_id));
        }

        request.words = Some(words);
        request.status = RequestStatus::Settling;
        Ok(request.player)
    }

    /// Claims a failed request for another settlement attempt.
    ///
    /// # Errors
    ///
    /// - `UnknownRequest` if the id was never opened
    /// - `NotRetryable` unless the request is `Failed`
    pub fn retry(
        &mut self,
        request_id: RequestId,
    ) -> EconomyResult<(Address, [U256; 2], Selection)> {
        let request = self
            .requests
            .get_mut(&request_id)
            .ok_or(EconomyError::UnknownRequest(request_id))?;

        match (request.status, request.words) {
            (RequestStatus::Failed(selection), Some(words)) => {
                request.status = RequestStatus::Settling;
                Ok((request.player, words, selection))
            }
            _ => Err(EconomyError::NotRetryable(request_id)),
        }
    }

    /// Marks a settling request as resolved.
    pub fn complete(&mut self, request_id: RequestId, tier: TierKind) {
        if let Some(request) = self.requests.get_mut(&request_id) {
            request.status = RequestStatus::Resolved(tier);
        }
    }

    /// Marks a settling request as failed, keeping what it selected.
    pub fn fail(&mut self, request_id: RequestId, selection: Selection) {
        if let Some(request) = self.requests.get_mut(&request_id) {
            request.status = RequestStatus::Failed(selection);
            request.failed_attempts = request.failed_attempts.saturating_add(1);
        }
    }

    /// Forgets a pending request whose purchase was rolled back.
    ///
    /// Returns true if a pending request was removed. A later fulfillment
    /// for the id is rejected as unknown.
    pub fn cancel(&mut self, request_id: RequestId) -> bool {
        match self.requests.get(&request_id) {
            Some(r) if r.status == RequestStatus::Pending => {
                self.requests.remove(&request_id);
                true
            }
            _ => false,
        }
    }

    /// Looks up a request.
    #[must_use]
    pub fn get(&self, request_id: &RequestId) -> Option<&Request> {
        self.requests.get(request_id)
    }

    /// Number of requests still waiting for the oracle.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.requests
            .values()
            .filter(|r| r.status == RequestStatus::Pending)
            .count()
    }

    /// Total requests tracked, in any state.
    #[must_use]
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    /// Returns true if nothing was ever opened.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Pending requests issued more than `max_age` seconds before `now`,
    /// oldest first.
    #[must_use]
    pub fn stale(&self, now: u64, max_age: u64) -> Vec<RequestId> {
        let mut stale: Vec<&Request> = self
            .requests
            .values()
            .filter(|r| r.status == RequestStatus::Pending)
            .filter(|r| now.saturating_sub(r.issued_at) > max_age)
            .collect();
        stale.sort_by_key(|r| (r.issued_at, r.request_id));
        stale.into_iter().map(|r| r.request_id).collect()
    }
}
