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

//! Batch stock and threshold corrections.
//!
//! Admin bulk tools submit a list of [`StockMutation`]s. Entries are
//! independent: each is validated and applied on its own under its item's
//! lock, and each gets its own [`MutationResult`]. A failing entry never stops
//! the entries after it.
//!
//! ```
//! use std::sync::Arc;
//! use stock_ledger_rs::{BatchMutationCoordinator, ItemId, StockLedger, StockMutation};
//!
//! let ledger = Arc::new(StockLedger::new());
//! ledger.register_item(ItemId(2), 3, None).unwrap();
//!
//! let batch = BatchMutationCoordinator::new(Arc::clone(&ledger));
//! let results = batch.apply_batch(&[
//!     StockMutation::SetStock { item_id: ItemId(1), quantity: -1 },
//!     StockMutation::SetStock { item_id: ItemId(2), quantity: 10 },
//! ]);
//!
//! assert!(results[0].outcome.is_err());
//! assert_eq!(results[1].outcome, Ok(3));
//! assert_eq!(ledger.get_stock(ItemId(2)).unwrap().0, 10);
//! ```

use crate::base::ItemId;
use crate::error::InventoryError;
use crate::ledger::StockLedger;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// One requested correction. Consumed by the coordinator, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", rename_all = "snake_case")]
pub enum StockMutation {
    SetStock { item_id: ItemId, quantity: i64 },
    SetThreshold { item_id: ItemId, threshold: i64 },
}

impl StockMutation {
    pub fn item_id(&self) -> ItemId {
        match self {
            Self::SetStock { item_id, .. } => *item_id,
            Self::SetThreshold { item_id, .. } => *item_id,
        }
    }

    /// Checks the entry on its own, without touching the ledger.
    pub fn validate(&self) -> Result<(), InventoryError> {
        match self {
            Self::SetStock { quantity, .. } if *quantity < 0 => {
                Err(InventoryError::InvalidArgument("stock must not be negative"))
            }
            Self::SetThreshold { threshold, .. } if *threshold < 0 => Err(
                InventoryError::InvalidArgument("threshold must not be negative"),
            ),
            _ => Ok(()),
        }
    }
}

/// Outcome of one batch entry.
///
/// On success `outcome` holds the value the entry replaced (previous stock or
/// previous threshold).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationResult {
    pub index: usize,
    pub mutation: StockMutation,
    pub outcome: Result<i64, InventoryError>,
}

impl MutationResult {
    pub fn is_applied(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Applies batches of corrections with per-entry success or failure.
#[derive(Debug)]
pub struct BatchMutationCoordinator {
    ledger: Arc<StockLedger>,
}

impl BatchMutationCoordinator {
    pub fn new(ledger: Arc<StockLedger>) -> Self {
        Self { ledger }
    }

    /// Applies `mutations` in order and reports each entry.
    ///
    /// Entries for the same item are applied in list order; entries for
    /// different items only ever take their own item's lock.
    pub fn apply_batch(&self, mutations: &[StockMutation]) -> Vec<MutationResult> {
        let results: Vec<MutationResult> = mutations
            .iter()
            .enumerate()
            .map(|(index, mutation)| MutationResult {
                index,
                mutation: *mutation,
                outcome: self.apply_one(mutation),
            })
            .collect();

        for rejected in results.iter().filter(|r| !r.is_applied()) {
            if let Err(e) = &rejected.outcome {
                warn!(
                    index = rejected.index,
                    item_id = %rejected.mutation.item_id(),
                    error = %e,
                    "batch entry rejected"
                );
            }
        }

        let applied = results.iter().filter(|r| r.is_applied()).count();
        info!(
            entries = results.len(),
            applied,
            rejected = results.len() - applied,
            "batch applied"
        );
        results
    }

    fn apply_one(&self, mutation: &StockMutation) -> Result<i64, InventoryError> {
        mutation.validate()?;
        match *mutation {
            StockMutation::SetStock { item_id, quantity } => {
                self.ledger.set_stock(item_id, quantity)
            }
            StockMutation::SetThreshold { item_id, threshold } => {
                self.ledger.set_threshold(item_id, threshold)
            }
        }
    }
}
