//! # Value Ledger
//!
//! The engine does not move money or tokens itself. Every payout, prize
//! transfer and collectible mint goes through a [`ValueLedger`], and the
//! engine treats each call as fallible: nothing is committed on the core
//! side until the ledger confirms.
//!
//! [`InMemoryLedger`] is the in-process implementation used by tests and
//! simulations. It pays out of a treasury and can be told to reject the next
//! operations.

use std::collections::{BTreeMap, HashMap};

use alloy_primitives::Address;
use parking_lot::Mutex;
use thiserror::Error;

use crate::pool::Custody;

/// Errors reported by a value ledger.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// The house cannot cover the payout.
    #[error("insufficient funds: need {needed}, have {available}")]
    InsufficientFunds {
        /// Amount requested.
        needed: u128,
        /// Amount available.
        available: u128,
    },
    /// The item is not held by the house.
    #[error("item not in house custody")]
    NotInCustody,
    /// Generic rejection.
    #[error("ledger rejected operation: {0}")]
    Rejected(String),
}

/// A single payout in a batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Payout {
    /// Recipient.
    pub to: Address,
    /// Amount in wei.
    pub amount: u128,
}

/// External settlement of funds, prize items and collectibles.
pub trait ValueLedger: Send + Sync {
    /// Pays `amount` wei from the house to `to`.
    ///
    /// # Errors
    ///
    /// Returns a `LedgerError` if the payout is rejected.
    fn pay_out(&self, to: Address, amount: u128) -> Result<(), LedgerError>;

    /// Pays every entry, or none of them.
    ///
    /// # Errors
    ///
    /// Returns a `LedgerError` if any payout is rejected; in that case no
    /// payout in the batch is applied.
    fn pay_out_batch(&self, payouts: &[Payout]) -> Result<(), LedgerError>;

    /// Moves a prize item from house custody to `to`.
    ///
    /// # Errors
    ///
    /// Returns a `LedgerError` if the transfer is rejected.
    fn transfer_item(&self, item: &Custody, to: Address) -> Result<(), LedgerError>;

    /// Mints collectible `serial` to `to`.
    ///
    /// # Errors
    ///
    /// Returns a `LedgerError` if the mint is rejected.
    fn mint_collectible(&self, to: Address, serial: u64) -> Result<(), LedgerError>;
}

#[derive(Debug, Default)]
struct LedgerState {
    treasury: u128,
    balances: HashMap<Address, u128>,
    /// Prize items that have left the house.
    awarded: HashMap<Custody, Address>,
    collectibles: BTreeMap<u64, Address>,
    fail_next: u32,
}

impl LedgerState {
    fn check_outage(&mut self) -> Result<(), LedgerError> {
        if self.fail_next > 0 {
            self.fail_next -= 1;
            return Err(LedgerError::Rejected("simulated outage".to_string()));
        }
        Ok(())
    }

    fn credit(&mut self, to: Address, amount: u128) {
        self.treasury -= amount;
        *self.balances.entry(to).or_insert(0) += amount;
    }
}

/// In-process ledger with a single house treasury.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    state: Mutex<LedgerState>,
}

impl InMemoryLedger {
    /// Creates a ledger whose treasury holds `treasury` wei.
    #[must_use]
    pub fn with_treasury(treasury: u128) -> Self {
        Self {
            state: Mutex::new(LedgerState {
                treasury,
                ..LedgerState::default()
            }),
        }
    }

    /// Adds funds to the treasury (ticket revenue).
    pub fn fund(&self, amount: u128) {
        let mut state = self.state.lock();
        state.treasury = state.treasury.saturating_add(amount);
    }

    /// Rejects the next `count` operations of any kind.
    pub fn fail_next(&self, count: u32) {
        self.state.lock().fail_next = count;
    }

    /// Funds remaining in the treasury.
    #[must_use]
    pub fn treasury(&self) -> u128 {
        self.state.lock().treasury
    }

    /// Total paid out to `account`.
    #[must_use]
    pub fn balance_of(&self, account: Address) -> u128 {
        self.state.lock().balances.get(&account).copied().unwrap_or(0)
    }

    /// Who was awarded `item`, if it has left the house.
    #[must_use]
    pub fn owner_of(&self, item: &Custody) -> Option<Address> {
        self.state.lock().awarded.get(item).copied()
    }

    /// Who holds collectible `serial`.
    #[must_use]
    pub fn collectible_owner(&self, serial: u64) -> Option<Address> {
        self.state.lock().collectibles.get(&serial).copied()
    }

    /// Number of collectibles minted.
    #[must_use]
    pub fn collectibles_minted(&self) -> usize {
        self.state.lock().collectibles.len()
    }
}

impl ValueLedger for InMemoryLedger {
    fn pay_out(&self, to: Address, amount: u128) -> Result<(), LedgerError> {
        self.pay_out_batch(&[Payout { to, amount }])
    }

    fn pay_out_batch(&self, payouts: &[Payout]) -> Result<(), LedgerError> {
        let mut state = self.state.lock();
        state.check_outage()?;

        let needed = payouts
            .iter()
            .try_fold(0u128, |acc, p| acc.checked_add(p.amount))
            .ok_or_else(|| LedgerError::Rejected("batch total overflows".to_string()))?;
        if needed > state.treasury {
            return Err(LedgerError::InsufficientFunds {
                needed,
                available: state.treasury,
            });
        }

        for payout in payouts {
            state.credit(payout.to, payout.amount);
        }
        Ok(())
    }

    fn transfer_item(&self, item: &Custody, to: Address) -> Result<(), LedgerError> {
        let mut state = self.state.lock();
        state.check_outage()?;

        if state.awarded.contains_key(item) {
            return Err(LedgerError::NotInCustody);
        }
        state.awarded.insert(*item, to);
        Ok(())
    }

    fn mint_collectible(&self, to: Address, serial: u64) -> Result<(), LedgerError> {
        let mut state = self.state.lock();
        state.check_outage()?;

        if state.collectibles.contains_key(&serial) {
            return Err(LedgerError::Rejected(format!("serial {serial} already minted")));
        }
        state.collectibles.insert(serial, to);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::U256;

    #[test]
    fn test_batch_is_all_or_nothing() {
        let ledger = InMemoryLedger::with_treasury(3);
        let a = Address::repeat_byte(1);
        let b = Address::repeat_byte(2);

        let result = ledger.pay_out_batch(&[Payout { to: a, amount: 2 }, Payout { to: b, amount: 2 }]);
        assert_eq!(
            result,
            Err(LedgerError::InsufficientFunds {
                needed: 4,
                available: 3
            })
        );
        assert_eq!(ledger.balance_of(a), 0);
        assert_eq!(ledger.treasury(), 3);
    }

    #[test]
    fn test_item_leaves_custody_once() {
        let ledger = InMemoryLedger::default();
        let item = Custody::new(Address::repeat_byte(9), U256::from(5));
        let winner = Address::repeat_byte(3);

        ledger.transfer_item(&item, winner).unwrap();
        assert_eq!(ledger.owner_of(&item), Some(winner));
        assert_eq!(ledger.transfer_item(&item, winner), Err(LedgerError::NotInCustody));
    }

    #[test]
    fn test_outage() {
        let ledger = InMemoryLedger::with_treasury(100);
        ledger.fail_next(1);
        assert!(ledger.pay_out(Address::ZERO, 1).is_err());
        assert!(ledger.pay_out(Address::ZERO, 1).is_ok());
        assert_eq!(ledger.treasury(), 99);
    }
}
