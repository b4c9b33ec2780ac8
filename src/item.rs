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

//! A single ledger entry.
//!
//! Each [`InventoryItem`] owns its own lock, which is the per-item exclusion
//! domain: every mutation of one item's count or threshold runs inside it, and
//! reads take it only long enough to copy the two integers out.
//!
//! Mutations are only reachable through [`StockLedger`](crate::StockLedger).

use crate::base::ItemId;
use crate::error::InventoryError;
use crate::journal::{MovementKind, StockJournal};
use crate::status::{StockStatus, classify};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::error;

/// Point-in-time view of one item, read in a single critical section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StockLevel {
    pub item_id: ItemId,
    pub stock: i64,
    pub threshold: i64,
    pub status: StockStatus,
}

#[derive(Debug)]
pub(crate) struct ItemData {
    item_id: ItemId,
    stock: i64,
    threshold: i64,
}

impl ItemData {
    fn new(item_id: ItemId, stock: i64, threshold: i64) -> Self {
        Self {
            item_id,
            stock,
            threshold,
        }
    }

    /// A negative count here means the exclusion discipline was broken.
    fn assert_invariants(&self) {
        if self.stock < 0 || self.threshold < 0 {
            error!(
                item_id = %self.item_id,
                stock = self.stock,
                threshold = self.threshold,
                "ledger invariant violated: negative stock or threshold"
            );
            panic!(
                "Invariant violated: item {} has stock {} and threshold {}",
                self.item_id, self.stock, self.threshold
            );
        }
    }

    fn level(&self) -> StockLevel {
        StockLevel {
            item_id: self.item_id,
            stock: self.stock,
            threshold: self.threshold,
            status: classify(self.stock, self.threshold),
        }
    }

    /// Applies a signed delta. All-or-nothing: a rejected delta leaves the count as it was.
    pub(crate) fn adjust(&mut self, delta: i64) -> Result<i64, InventoryError> {
        let next = self
            .stock
            .checked_add(delta)
            .ok_or(InventoryError::InvalidArgument("stock adjustment overflows"))?;
        if next < 0 {
            return Err(InventoryError::InsufficientStock {
                item_id: self.item_id,
                available: self.stock,
                requested: delta.saturating_neg(),
            });
        }
        self.stock = next;
        Ok(next)
    }

    /// Returns units taken out earlier. Saturates at `i64::MAX`.
    pub(crate) fn restore(&mut self, quantity: i64) -> i64 {
        self.stock = self.stock.saturating_add(quantity.max(0));
        self.stock
    }

    /// Overwrites the count, returning the previous one.
    pub(crate) fn set_stock(&mut self, stock: i64) -> Result<i64, InventoryError> {
        if stock < 0 {
            return Err(InventoryError::InvalidArgument("stock must not be negative"));
        }
        Ok(std::mem::replace(&mut self.stock, stock))
    }

    /// Overwrites the threshold, returning the previous one.
    pub(crate) fn set_threshold(&mut self, threshold: i64) -> Result<i64, InventoryError> {
        if threshold < 0 {
            return Err(InventoryError::InvalidArgument(
                "threshold must not be negative",
            ));
        }
        Ok(std::mem::replace(&mut self.threshold, threshold))
    }
}

/// Ledger entry for one catalog item.
#[derive(Debug)]
pub struct InventoryItem {
    inner: Mutex<ItemData>,
}

impl InventoryItem {
    /// Callers validate `stock` and `threshold` before construction.
    pub(crate) fn new(item_id: ItemId, stock: i64, threshold: i64) -> Self {
        let data = ItemData::new(item_id, stock, threshold);
        data.assert_invariants();
        Self {
            inner: Mutex::new(data),
        }
    }

    /// Count, threshold and status as one consistent read.
    pub fn level(&self) -> StockLevel {
        self.inner.lock().level()
    }

    /// Runs `f` under the item lock.
    ///
    /// When `f` succeeds the invariants are re-checked and, if a journal is
    /// attached, the movement is recorded before the lock is released so the
    /// journal order for one item matches the order the changes were applied.
    pub(crate) fn update<R>(
        &self,
        kind: MovementKind,
        journal: Option<&StockJournal>,
        f: impl FnOnce(&mut ItemData) -> Result<R, InventoryError>,
    ) -> Result<R, InventoryError> {
        let mut data = self.inner.lock();
        let before = data.level();
        let out = f(&mut data)?;
        data.assert_invariants();
        if let Some(journal) = journal {
            journal.record(kind, before, data.level());
        }
        Ok(out)
    }
}
