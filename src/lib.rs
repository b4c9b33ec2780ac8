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

//! # Stock Ledger
//!
//! This library provides the inventory engine behind a retail catalog: an
//! authoritative per-item stock ledger, cart reservations that can never
//! oversell, admin corrections (single and batched), and derived stock status
//! for shoppers and dashboards.
//!
//! ## Core Components
//!
//! - [`StockLedger`]: Per-item stock count and low-stock threshold
//! - [`ReservationManager`]: Cart holds, deducted from the ledger when made
//! - [`classify`]: Maps a count and threshold to a [`StockStatus`]
//! - [`BatchMutationCoordinator`]: Bulk corrections with per-entry results
//! - [`InventoryQueryService`]: Dashboard snapshots
//! - [`InventoryEngine`]: All of the above behind one facade
//!
//! ## Example
//!
//! ```
//! use stock_ledger_rs::{CartId, InventoryEngine, InventoryError, ItemId, StockStatus};
//!
//! let engine = InventoryEngine::new();
//! engine.register_item(ItemId(1), 10, Some(5)).unwrap();
//!
//! engine.add_to_cart(CartId(1), ItemId(1), 6).unwrap();
//! assert_eq!(engine.get_stock_status(ItemId(1)).unwrap(), StockStatus::LowStock);
//!
//! let result = engine.add_to_cart(CartId(2), ItemId(1), 5);
//! assert!(matches!(result, Err(InventoryError::NotEnoughStock { .. })));
//!
//! engine.update_cart_quantity(CartId(1), ItemId(1), 2).unwrap();
//! assert_eq!(engine.get_stock(ItemId(1)).unwrap(), (8, 5));
//! ```
//!
//! ## Thread Safety
//!
//! Every item has its own lock. Mutations of the same item are serialized;
//! mutations of different items never wait on each other, and reads only hold
//! the lock of the item being read.

mod base;
mod batch;
mod config;
mod engine;
pub mod error;
mod item;
mod journal;
mod ledger;
mod query;
mod reservation;
mod status;

pub use base::{CartId, ItemId};
pub use batch::{BatchMutationCoordinator, MutationResult, StockMutation};
pub use config::{DEFAULT_LOW_STOCK_THRESHOLD, EngineConfig, MAX_LINE_QUANTITY};
pub use engine::InventoryEngine;
pub use error::InventoryError;
pub use item::StockLevel;
pub use journal::{MovementKind, StockJournal, StockMovement};
pub use ledger::StockLedger;
pub use query::{InventoryQueryService, InventorySnapshot};
pub use reservation::{Reservation, ReservationManager};
pub use status::{StockStatus, classify};
