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

//! Ordered record of committed ledger mutations.
//!
//! The ledger is in-memory; the durable `item id -> (stock, threshold)` record
//! is written by whoever drains this journal. Movements for one item are
//! sequenced while that item's lock is held, so their sequence numbers follow
//! the order in which the changes were applied.

use crate::base::ItemId;
use crate::item::StockLevel;
use crate::status::StockStatus;
use crossbeam::queue::SegQueue;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// What caused a ledger mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    Registered,
    Reserved,
    Released,
    Restocked,
    Adjusted,
    StockSet,
    ThresholdSet,
}

/// One committed change to an item's count or threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockMovement {
    pub sequence: u64,
    pub kind: MovementKind,
    pub item_id: ItemId,
    pub stock_before: i64,
    pub stock_after: i64,
    pub threshold_before: i64,
    pub threshold_after: i64,
    pub status_after: StockStatus,
}

/// A lock-free, append-only movement journal.
#[derive(Debug)]
pub struct StockJournal {
    movements: SegQueue<StockMovement>,
    next_sequence: AtomicU64,
}

impl StockJournal {
    pub fn new() -> Self {
        Self {
            movements: SegQueue::new(),
            next_sequence: AtomicU64::new(1),
        }
    }

    /// Appends a movement. Called with the item lock held.
    pub(crate) fn record(&self, kind: MovementKind, before: StockLevel, after: StockLevel) {
        let sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst);
        self.movements.push(StockMovement {
            sequence,
            kind,
            item_id: after.item_id,
            stock_before: before.stock,
            stock_after: after.stock,
            threshold_before: before.threshold,
            threshold_after: after.threshold,
            status_after: after.status,
        });
    }

    pub fn len(&self) -> usize {
        self.movements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.movements.is_empty()
    }

    /// Removes every movement recorded so far, in sequence order.
    pub fn drain(&self) -> Vec<StockMovement> {
        let mut drained = Vec::with_capacity(self.movements.len());
        while let Some(movement) = self.movements.pop() {
            drained.push(movement);
        }
        drained.sort_by_key(|m| m.sequence);
        drained
    }
}

impl Default for StockJournal {
    fn default() -> Self {
        Self::new()
    }
}
