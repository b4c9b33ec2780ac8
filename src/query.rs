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

//! Dashboard aggregation over the ledger.
//!
//! Snapshots are point-in-time reads: each item is read under its own lock,
//! nothing locks the ledger as a whole, and concurrent mutations may make a
//! snapshot stale by the time it is delivered.

use crate::base::ItemId;
use crate::item::StockLevel;
use crate::ledger::StockLedger;
use crate::status::StockStatus;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Aggregate inventory figures for monitoring.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventorySnapshot {
    pub total_items: usize,
    pub total_stock: i64,
    pub low_stock_count: usize,
    pub out_of_stock_count: usize,
    /// Items currently low or out of stock, ordered by id.
    pub alert_item_ids: Vec<ItemId>,
}

impl InventorySnapshot {
    /// Aggregates already-read levels.
    pub fn from_levels(levels: &[StockLevel]) -> Self {
        let mut snapshot = InventorySnapshot {
            total_items: levels.len(),
            ..Default::default()
        };

        for level in levels {
            snapshot.total_stock += level.stock;
            match level.status {
                StockStatus::LowStock => snapshot.low_stock_count += 1,
                StockStatus::OutOfStock => snapshot.out_of_stock_count += 1,
                StockStatus::InStock => continue,
            }
            snapshot.alert_item_ids.push(level.item_id);
        }

        snapshot.alert_item_ids.sort();
        snapshot
    }
}

/// Read-only views over a [`StockLedger`].
#[derive(Debug)]
pub struct InventoryQueryService {
    ledger: Arc<StockLedger>,
}

impl InventoryQueryService {
    pub fn new(ledger: Arc<StockLedger>) -> Self {
        Self { ledger }
    }

    pub fn snapshot(&self) -> InventorySnapshot {
        InventorySnapshot::from_levels(&self.ledger.levels())
    }

    /// Low and out-of-stock items, emptiest first, ties broken by id.
    pub fn needing_restock(&self) -> Vec<StockLevel> {
        let mut levels: Vec<StockLevel> = self
            .ledger
            .levels()
            .into_iter()
            .filter(|level| level.status.needs_restock())
            .collect();
        levels.sort_by_key(|level| (level.stock, level.item_id));
        levels
    }

    /// Every item with its current level, ordered by id.
    pub fn levels(&self) -> Vec<StockLevel> {
        self.ledger.levels()
    }
}
