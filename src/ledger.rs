// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! The authoritative stock ledger.
//!
//! [`StockLedger`] holds one [`InventoryItem`] per catalog item and exposes the
//! only operations that may change a count or threshold.
//!
//! # Thread Safety
//!
//! Items live in a [`DashMap`] behind an `Arc`. Every operation clones the
//! item's `Arc` out of the map and releases the shard before taking the item
//! lock, so a mutation of one item never waits on contention for another, and
//! no global lock exists for mutations. Operations on the same item are
//! serialized by that item's lock, which makes concurrent adjustments
//! linearizable per item.

use crate::base::ItemId;
use crate::config::EngineConfig;
use crate::error::InventoryError;
use crate::item::{InventoryItem, StockLevel};
use crate::journal::{MovementKind, StockJournal};
use crate::status::{StockStatus, classify};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use tracing::{debug, info};

/// Per-item stock counts and low-stock thresholds.
///
/// # Invariants
///
/// - `stock >= 0` and `threshold >= 0` for every item after every operation.
/// - A rejected operation has no effect.
/// - Items are never removed by the ledger.
#[derive(Debug)]
pub struct StockLedger {
    items: DashMap<ItemId, Arc<InventoryItem>>,
    journal: Option<StockJournal>,
    default_threshold: i64,
}

impl StockLedger {
    /// Creates an empty ledger with default configuration.
    pub fn new() -> Self {
        Self::with_config(&EngineConfig::default())
    }

    pub fn with_config(config: &EngineConfig) -> Self {
        StockLedger {
            items: DashMap::new(),
            journal: config.record_movements.then(StockJournal::new),
            default_threshold: config.default_threshold,
        }
    }

    /// Introduces a catalog item with its initial count.
    ///
    /// A missing threshold falls back to the configured default.
    ///
    /// # Errors
    ///
    /// - [`InventoryError::InvalidArgument`] - Negative stock or threshold.
    /// - [`InventoryError::DuplicateItem`] - The id is already registered.
    pub fn register_item(
        &self,
        item_id: ItemId,
        initial_stock: i64,
        threshold: Option<i64>,
    ) -> Result<StockLevel, InventoryError> {
        let threshold = threshold.unwrap_or(self.default_threshold);
        if initial_stock < 0 {
            return Err(InventoryError::InvalidArgument("stock must not be negative"));
        }
        if threshold < 0 {
            return Err(InventoryError::InvalidArgument(
                "threshold must not be negative",
            ));
        }

        match self.items.entry(item_id) {
            Entry::Occupied(_) => Err(InventoryError::DuplicateItem(item_id)),
            Entry::Vacant(entry) => {
                let item = InventoryItem::new(item_id, initial_stock, threshold);
                let level = item.level();
                if let Some(journal) = &self.journal {
                    let before = StockLevel {
                        stock: 0,
                        status: classify(0, threshold),
                        ..level
                    };
                    journal.record(MovementKind::Registered, before, level);
                }
                entry.insert(Arc::new(item));
                debug!(%item_id, stock = initial_stock, threshold, "item registered");
                Ok(level)
            }
        }
    }

    fn item(&self, item_id: ItemId) -> Result<Arc<InventoryItem>, InventoryError> {
        self.items
            .get(&item_id)
            .map(|item| Arc::clone(item.value()))
            .ok_or(InventoryError::ItemNotFound(item_id))
    }

    /// Returns `(stock, threshold)` for an item.
    pub fn get_stock(&self, item_id: ItemId) -> Result<(i64, i64), InventoryError> {
        let level = self.level(item_id)?;
        Ok((level.stock, level.threshold))
    }

    /// Returns count, threshold and derived status read together.
    pub fn level(&self, item_id: ItemId) -> Result<StockLevel, InventoryError> {
        Ok(self.item(item_id)?.level())
    }

    pub fn status(&self, item_id: ItemId) -> Result<StockStatus, InventoryError> {
        Ok(self.level(item_id)?.status)
    }

    /// Applies a signed delta to an item's count and returns the new count.
    ///
    /// # Errors
    ///
    /// - [`InventoryError::ItemNotFound`] - Unknown item id.
    /// - [`InventoryError::InsufficientStock`] - The count would go negative;
    ///   nothing is changed.
    pub fn adjust_stock(&self, item_id: ItemId, delta: i64) -> Result<i64, InventoryError> {
        self.adjust_stock_as(item_id, delta, MovementKind::Adjusted)
    }

    pub(crate) fn adjust_stock_as(
        &self,
        item_id: ItemId,
        delta: i64,
        kind: MovementKind,
    ) -> Result<i64, InventoryError> {
        let item = self.item(item_id)?;
        item.update(kind, self.journal.as_ref(), |data| data.adjust(delta))
            .inspect_err(|e| debug!(%item_id, delta, error = %e, "stock adjustment rejected"))
    }

    /// Gives reserved units back to an item. Only fails for an unknown id.
    pub(crate) fn restore_stock(
        &self,
        item_id: ItemId,
        quantity: i64,
    ) -> Result<i64, InventoryError> {
        let item = self.item(item_id)?;
        item.update(MovementKind::Released, self.journal.as_ref(), |data| {
            Ok(data.restore(quantity))
        })
    }

    /// Adds received units to an item and returns the new count.
    ///
    /// # Errors
    ///
    /// - [`InventoryError::InvalidArgument`] - `quantity < 1`.
    /// - [`InventoryError::ItemNotFound`] - Unknown item id.
    pub fn restock(&self, item_id: ItemId, quantity: i64) -> Result<i64, InventoryError> {
        if quantity < 1 {
            return Err(InventoryError::InvalidArgument(
                "restock quantity must be at least 1",
            ));
        }
        let stock = self.adjust_stock_as(item_id, quantity, MovementKind::Restocked)?;
        info!(%item_id, quantity, stock, "item restocked");
        Ok(stock)
    }

    /// Overwrites an item's count and returns the previous count.
    ///
    /// # Errors
    ///
    /// - [`InventoryError::InvalidArgument`] - `new_count < 0`.
    /// - [`InventoryError::ItemNotFound`] - Unknown item id.
    pub fn set_stock(&self, item_id: ItemId, new_count: i64) -> Result<i64, InventoryError> {
        if new_count < 0 {
            return Err(InventoryError::InvalidArgument("stock must not be negative"));
        }
        let item = self.item(item_id)?;
        let previous = item.update(MovementKind::StockSet, self.journal.as_ref(), |data| {
            data.set_stock(new_count)
        })?;
        info!(%item_id, previous, stock = new_count, "stock set");
        Ok(previous)
    }

    /// Overwrites an item's low-stock threshold and returns the previous one.
    ///
    /// # Errors
    ///
    /// - [`InventoryError::InvalidArgument`] - `new_threshold < 0`.
    /// - [`InventoryError::ItemNotFound`] - Unknown item id.
    pub fn set_threshold(
        &self,
        item_id: ItemId,
        new_threshold: i64,
    ) -> Result<i64, InventoryError> {
        if new_threshold < 0 {
            return Err(InventoryError::InvalidArgument(
                "threshold must not be negative",
            ));
        }
        let item = self.item(item_id)?;
        let previous = item.update(MovementKind::ThresholdSet, self.journal.as_ref(), |data| {
            data.set_threshold(new_threshold)
        })?;
        info!(%item_id, previous, threshold = new_threshold, "threshold set");
        Ok(previous)
    }

    pub fn contains(&self, item_id: ItemId) -> bool {
        self.items.contains_key(&item_id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Reads every item, ordered by id.
    ///
    /// Each item is read under its own lock only; the result is not a
    /// transactional view across items.
    pub fn levels(&self) -> Vec<StockLevel> {
        let items: Vec<Arc<InventoryItem>> = self
            .items
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        let mut levels: Vec<StockLevel> = items.iter().map(|item| item.level()).collect();
        levels.sort_by_key(|level| level.item_id);
        levels
    }

    /// Movement journal, present when `record_movements` was configured.
    pub fn journal(&self) -> Option<&StockJournal> {
        self.journal.as_ref()
    }
}

impl Default for StockLedger {
    fn default() -> Self {
        Self::new()
    }
}
