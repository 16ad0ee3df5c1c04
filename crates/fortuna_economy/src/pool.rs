//! # Weighted Prize Pools
//!
//! A pool holds prize items whose draw probability is proportional to their
//! declared value. Sampling walks a cumulative-weight index:
//!
//! ```text
//! items:       [ A:300 ][ B:100 ][ C:600 ]          total value 1000
//! weights:     [  3e7  ][  1e7  ][  6e7  ]          value * SCALE / total
//! cumulative:  [  3e7  ][  4e7  ][ 10e7  ]
//!
//! draw 35_000_000 -> first cumulative >= draw -> B
//! ```
//!
//! ## Index Freshness
//!
//! Deposits and awards mark the index dirty. Every read of the index
//! (`sample`, `total_weight`, `cumulative`) rebuilds it first, so a stale
//! cumulative array is never observed. Removal swaps with the last item, so
//! indices are not stable across mutations. A custody → index map follows
//! every swap, so lookups by custody stay O(1).

use std::collections::HashMap;

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::error::{EconomyError, EconomyResult};
use crate::fixed_point::{mul_div, SCALE};

/// The three item pools, highest value first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum PoolKind {
    /// Flagship prizes.
    Top = 0,
    /// Mid-value prizes.
    Medium = 1,
    /// Everyday prizes.
    Normal = 2,
}

impl PoolKind {
    /// All pools in tier order.
    pub const ALL: [Self; 3] = [Self::Top, Self::Medium, Self::Normal];

    /// Position of this pool in per-pool arrays.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Human-readable name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Top => "top",
            Self::Medium => "medium",
            Self::Normal => "normal",
        }
    }
}

/// Where a prize item lives on the custody ledger.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Custody {
    /// Collection contract.
    pub collection: Address,
    /// Token within the collection.
    pub token_id: U256,
}

impl Custody {
    /// Creates a custody reference.
    #[inline]
    #[must_use]
    pub const fn new(collection: Address, token_id: U256) -> Self {
        Self {
            collection,
            token_id,
        }
    }
}

/// A prize held by a pool until it is awarded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrizeItem {
    /// Custody reference for the transfer on award.
    pub custody: Custody,
    /// Declared value in wei.
    pub declared_value: u128,
    /// Derived weight (fraction of [`SCALE`]), refreshed on reindex.
    #[serde(skip)]
    weight: u64,
}

impl PrizeItem {
    /// Creates a prize item. Its weight is derived once it joins a pool.
    #[must_use]
    pub const fn new(custody: Custody, declared_value: u128) -> Self {
        Self {
            custody,
            declared_value,
            weight: 0,
        }
    }

    /// Derived weight as of the pool's last reindex.
    #[inline]
    #[must_use]
    pub const fn weight(&self) -> u64 {
        self.weight
    }
}

/// A resizable set of prize items with a lazily rebuilt cumulative index.
#[derive(Clone, Debug, Default)]
pub struct WeightedPool {
    /// Items in arbitrary order.
    items: Vec<PrizeItem>,
    /// Position of each item in `items`.
    positions: HashMap<Custody, usize>,
    /// `cumulative[i]` = sum of weights `0..=i`.
    cumulative: Vec<u64>,
    /// Sum of declared values.
    total_value: u128,
    /// Sum of derived weights (equals the last cumulative entry).
    total_weight: u64,
    /// Index must be rebuilt before the next read.
    dirty: bool,
}

impl WeightedPool {
    /// Creates an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of items held.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if the pool holds nothing.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Sum of declared values.
    #[inline]
    #[must_use]
    pub const fn total_value(&self) -> u128 {
        self.total_value
    }

    /// Average declared value, floor. Zero for an empty pool.
    #[must_use]
    pub fn average_value(&self) -> u128 {
        if self.items.is_empty() {
            0
        } else {
            self.total_value / self.items.len() as u128
        }
    }

    /// Items in their current order.
    #[inline]
    #[must_use]
    pub fn items(&self) -> &[PrizeItem] {
        &self.items
    }

    /// Item at `index`.
    #[inline]
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&PrizeItem> {
        self.items.get(index)
    }

    /// Finds the item with the given custody reference.
    #[must_use]
    pub fn position_of(&self, custody: &Custody) -> Option<usize> {
        self.positions.get(custody).copied()
    }

    /// Returns true if the pool holds the item.
    #[inline]
    #[must_use]
    pub fn contains(&self, custody: &Custody) -> bool {
        self.positions.contains_key(custody)
    }

    /// Adds an item to the pool.
    ///
    /// # Errors
    ///
    /// - `InvalidItem` if the declared value is zero or the item is already held
    /// - `ArithmeticOverflow` if the pool total would overflow
    pub fn add(&mut self, item: PrizeItem) -> EconomyResult<()> {
        if item.declared_value == 0 {
            return Err(EconomyError::InvalidItem(
                "declared value must be non-zero".to_string(),
            ));
        }
        if self.contains(&item.custody) {
            return Err(EconomyError::InvalidItem(
                "item already held by this pool".to_string(),
            ));
        }

        self.total_value = self
            .total_value
            .checked_add(item.declared_value)
            .ok_or(EconomyError::ArithmeticOverflow)?;
        self.positions.insert(item.custody, self.items.len());
        self.items.push(item);
        self.dirty = true;
        Ok(())
    }

    /// Removes the item at `index` by swapping it with the last item.
    ///
    /// # Errors
    ///
    /// Returns `ItemNotFound` if `index` is out of range.
    pub fn remove_at(&mut self, index: usize) -> EconomyResult<PrizeItem> {
        if index >= self.items.len() {
            return Err(EconomyError::ItemNotFound);
        }

        let item = self.items.swap_remove(index);
        self.positions.remove(&item.custody);
        if let Some(moved) = self.items.get(index) {
            self.positions.insert(moved.custody, index);
        }
        self.total_value -= item.declared_value;
        self.dirty = true;
        Ok(item)
    }

    /// Sum of derived weights, rebuilding the index if needed.
    pub fn total_weight(&mut self) -> u64 {
        self.reindex();
        self.total_weight
    }

    /// The cumulative index, rebuilding it if needed.
    pub fn cumulative(&mut self) -> &[u64] {
        self.reindex();
        &self.cumulative
    }

    /// Picks an item for a draw in `[1, SCALE]`.
    ///
    /// Returns the smallest index whose cumulative weight is `>= draw`.
    /// Draws past the final cumulative value (rounding shortfall) clamp to
    /// the last item.
    ///
    /// # Errors
    ///
    /// Returns `EmptyPoolSample` if the pool carries no weight.
    pub fn sample(&mut self, draw: u64) -> EconomyResult<usize> {
        self.reindex();
        if self.total_weight == 0 {
            return Err(EconomyError::EmptyPoolSample);
        }

        let index = self.cumulative.partition_point(|&c| c < draw);
        Ok(index.min(self.cumulative.len() - 1))
    }

    /// Rebuilds weights and the cumulative index if dirty. O(n).
    fn reindex(&mut self) {
        if !self.dirty {
            return;
        }

        let total = self.total_value;
        let mut running = 0u64;
        self.cumulative.clear();
        self.cumulative.reserve(self.items.len());

        for item in &mut self.items {
            // declared_value <= total, so the weight is at most SCALE
            item.weight = mul_div(item.declared_value, u128::from(SCALE), total)
                .ok()
                .and_then(|w| u64::try_from(w).ok())
                .unwrap_or(0);
            running += item.weight;
            self.cumulative.push(running);
        }

        self.total_weight = running;
        self.dirty = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(token: u64, value: u128) -> PrizeItem {
        PrizeItem::new(Custody::new(Address::repeat_byte(7), U256::from(token)), value)
    }

    fn pool_of(values: &[u128]) -> WeightedPool {
        let mut pool = WeightedPool::new();
        for (i, v) in values.iter().enumerate() {
            pool.add(item(i as u64, *v)).unwrap();
        }
        pool
    }

    #[test]
    fn test_weights_follow_declared_value() {
        let mut pool = pool_of(&[300, 100, 600]);
        assert_eq!(pool.cumulative(), &[30_000_000, 40_000_000, 100_000_000]);
        assert_eq!(pool.total_weight(), SCALE);
        assert_eq!(pool.get(2).unwrap().weight(), 60_000_000);
    }

    #[test]
    fn test_sample_boundary_is_inclusive() {
        let mut pool = pool_of(&[300, 100, 600]);
        assert_eq!(pool.sample(1).unwrap(), 0);
        assert_eq!(pool.sample(30_000_000).unwrap(), 0);
        assert_eq!(pool.sample(30_000_001).unwrap(), 1);
        assert_eq!(pool.sample(40_000_000).unwrap(), 1);
        assert_eq!(pool.sample(SCALE).unwrap(), 2);
    }

    #[test]
    fn test_sample_clamps_rounding_shortfall() {
        // 1/3 each floors to 33_333_333, total 99_999_999
        let mut pool = pool_of(&[1, 1, 1]);
        assert_eq!(pool.total_weight(), 99_999_999);
        assert_eq!(pool.sample(SCALE).unwrap(), 2);
    }

    #[test]
    fn test_remove_rebuilds_index() {
        let mut pool = pool_of(&[300, 100, 600]);
        let _ = pool.sample(1).unwrap();

        let removed = pool.remove_at(0).unwrap();
        assert_eq!(removed.declared_value, 300);
        assert_eq!(pool.total_value(), 700);

        // Last item (600) moved into slot 0
        assert_eq!(pool.get(0).unwrap().declared_value, 600);
        let cumulative = pool.cumulative().to_vec();
        assert_eq!(cumulative.len(), 2);
        assert_eq!(*cumulative.last().unwrap(), pool.total_weight());
        assert!(cumulative.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_empty_pool_sample_is_error() {
        let mut pool = WeightedPool::new();
        assert_eq!(pool.sample(1), Err(EconomyError::EmptyPoolSample));
        assert_eq!(pool.total_weight(), 0);
        assert_eq!(pool.average_value(), 0);
    }

    #[test]
    fn test_zero_value_rejected() {
        let mut pool = WeightedPool::new();
        assert!(matches!(pool.add(item(1, 0)), Err(EconomyError::InvalidItem(_))));
        assert!(pool.is_empty());
    }

    #[test]
    fn test_duplicate_custody_rejected() {
        let mut pool = pool_of(&[10]);
        assert!(matches!(pool.add(item(0, 5)), Err(EconomyError::InvalidItem(_))));
        assert_eq!(pool.total_value(), 10);
    }

    #[test]
    fn test_positions_follow_swap_remove() {
        let mut pool = pool_of(&[300, 100, 600]);
        let moved = pool.get(2).unwrap().custody;
        let removed = pool.remove_at(0).unwrap();

        assert_eq!(pool.position_of(&moved), Some(0));
        assert_eq!(pool.position_of(&removed.custody), None);
        assert!(!pool.contains(&removed.custody));

        // Removing the last slot leaves the others in place
        let last = pool.get(1).unwrap().custody;
        pool.remove_at(1).unwrap();
        assert_eq!(pool.position_of(&last), None);
        assert_eq!(pool.position_of(&moved), Some(0));

        pool.add(removed.clone()).unwrap();
        assert_eq!(pool.position_of(&removed.custody), Some(1));
    }

    #[test]
    fn test_remove_out_of_range() {
        let mut pool = pool_of(&[10]);
        assert_eq!(pool.remove_at(1), Err(EconomyError::ItemNotFound));
    }

    #[test]
    fn test_average_value_floors() {
        let pool = pool_of(&[10, 11]);
        assert_eq!(pool.average_value(), 10);
    }
}
