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

//! Inventory engine.
//!
//! [`InventoryEngine`] is the request/response boundary the application layer
//! calls into. It wires one [`StockLedger`] to the components that use it:
//!
//! - **Cart operations** go through the [`ReservationManager`], which turns
//!   them into ledger adjustments.
//! - **Admin corrections**, single or batched, write to the ledger directly
//!   under the same per-item exclusion.
//! - **Status queries and dashboards** read through the
//!   [`InventoryQueryService`] and [`classify`](crate::classify).
//!
//! | Operation | Success | Failure |
//! |-----------|---------|---------|
//! | [`get_stock_status`](InventoryEngine::get_stock_status) | status | `ItemNotFound` |
//! | [`add_to_cart`](InventoryEngine::add_to_cart) | reservation | `NotEnoughStock`, `ItemNotFound`, `InvalidArgument` |
//! | [`update_cart_quantity`](InventoryEngine::update_cart_quantity) | reservation | `NotEnoughStock`, `InvalidArgument` |
//! | [`remove_from_cart`](InventoryEngine::remove_from_cart) | - | none |
//! | [`clear_cart`](InventoryEngine::clear_cart) | - | none |
//! | [`checkout`](InventoryEngine::checkout) | committed lines | `EmptyCart` |
//! | [`set_stock`](InventoryEngine::set_stock) | previous count | `InvalidArgument`, `ItemNotFound` |
//! | [`set_threshold`](InventoryEngine::set_threshold) | previous threshold | `InvalidArgument`, `ItemNotFound` |
//! | [`restock`](InventoryEngine::restock) | new count | `InvalidArgument`, `ItemNotFound` |
//! | [`apply_batch`](InventoryEngine::apply_batch) | per-entry results | per entry |
//! | [`snapshot`](InventoryEngine::snapshot) | snapshot | none |

use crate::base::{CartId, ItemId};
use crate::batch::{BatchMutationCoordinator, MutationResult, StockMutation};
use crate::config::EngineConfig;
use crate::error::InventoryError;
use crate::item::StockLevel;
use crate::journal::StockMovement;
use crate::ledger::StockLedger;
use crate::query::{InventoryQueryService, InventorySnapshot};
use crate::reservation::{Reservation, ReservationManager};
use crate::status::StockStatus;
use chrono::{DateTime, TimeDelta, Utc};
use std::sync::Arc;

/// Stock ledger with cart reservations, batch corrections and dashboards.
#[derive(Debug)]
pub struct InventoryEngine {
    ledger: Arc<StockLedger>,
    reservations: ReservationManager,
    batch: BatchMutationCoordinator,
    query: InventoryQueryService,
}

impl InventoryEngine {
    /// Creates an engine with default configuration and an empty ledger.
    pub fn new() -> Self {
        Self::build(EngineConfig::default())
    }

    /// Creates an engine from a validated configuration.
    ///
    /// # Errors
    ///
    /// - [`InventoryError::InvalidArgument`] - The configuration is out of range.
    pub fn with_config(config: EngineConfig) -> Result<Self, InventoryError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: EngineConfig) -> Self {
        let ledger = Arc::new(StockLedger::with_config(&config));
        InventoryEngine {
            reservations: ReservationManager::with_config(Arc::clone(&ledger), &config),
            batch: BatchMutationCoordinator::new(Arc::clone(&ledger)),
            query: InventoryQueryService::new(Arc::clone(&ledger)),
            ledger,
        }
    }

    // === Catalog ===

    pub fn register_item(
        &self,
        item_id: ItemId,
        initial_stock: i64,
        threshold: Option<i64>,
    ) -> Result<StockLevel, InventoryError> {
        self.ledger.register_item(item_id, initial_stock, threshold)
    }

    // === Queries ===

    pub fn get_stock(&self, item_id: ItemId) -> Result<(i64, i64), InventoryError> {
        self.ledger.get_stock(item_id)
    }

    pub fn get_stock_status(&self, item_id: ItemId) -> Result<StockStatus, InventoryError> {
        self.ledger.status(item_id)
    }

    pub fn item_level(&self, item_id: ItemId) -> Result<StockLevel, InventoryError> {
        self.ledger.level(item_id)
    }

    pub fn snapshot(&self) -> InventorySnapshot {
        self.query.snapshot()
    }

    pub fn needing_restock(&self) -> Vec<StockLevel> {
        self.query.needing_restock()
    }

    pub fn levels(&self) -> Vec<StockLevel> {
        self.query.levels()
    }

    // === Cart ===

    pub fn add_to_cart(
        &self,
        cart_id: CartId,
        item_id: ItemId,
        quantity: i64,
    ) -> Result<Reservation, InventoryError> {
        self.reservations.add_to_cart(cart_id, item_id, quantity)
    }

    pub fn update_cart_quantity(
        &self,
        cart_id: CartId,
        item_id: ItemId,
        quantity: i64,
    ) -> Result<Reservation, InventoryError> {
        self.reservations.update_quantity(cart_id, item_id, quantity)
    }

    pub fn remove_from_cart(&self, cart_id: CartId, item_id: ItemId) {
        self.reservations.remove_from_cart(cart_id, item_id);
    }

    pub fn clear_cart(&self, cart_id: CartId) {
        self.reservations.clear_cart(cart_id);
    }

    pub fn checkout(&self, cart_id: CartId) -> Result<Vec<Reservation>, InventoryError> {
        self.reservations.checkout(cart_id)
    }

    pub fn cart_contents(&self, cart_id: CartId) -> Vec<Reservation> {
        self.reservations.cart_contents(cart_id)
    }

    pub fn cart_item_count(&self, cart_id: CartId) -> i64 {
        self.reservations.cart_item_count(cart_id)
    }

    /// Releases reservations untouched for at least `max_age` as of `now`.
    pub fn sweep_stale_reservations(
        &self,
        now: DateTime<Utc>,
        max_age: TimeDelta,
    ) -> Vec<Reservation> {
        self.reservations.sweep_stale(now, max_age)
    }

    // === Admin ===

    pub fn set_stock(&self, item_id: ItemId, quantity: i64) -> Result<i64, InventoryError> {
        self.ledger.set_stock(item_id, quantity)
    }

    pub fn set_threshold(&self, item_id: ItemId, threshold: i64) -> Result<i64, InventoryError> {
        self.ledger.set_threshold(item_id, threshold)
    }

    pub fn restock(&self, item_id: ItemId, quantity: i64) -> Result<i64, InventoryError> {
        self.ledger.restock(item_id, quantity)
    }

    pub fn apply_batch(&self, mutations: &[StockMutation]) -> Vec<MutationResult> {
        self.batch.apply_batch(mutations)
    }

    // === Components ===

    pub fn ledger(&self) -> &StockLedger {
        &self.ledger
    }

    pub fn reservations(&self) -> &ReservationManager {
        &self.reservations
    }

    /// Drains recorded movements; empty unless `record_movements` is set.
    pub fn drain_movements(&self) -> Vec<StockMovement> {
        self.ledger
            .journal()
            .map(|journal| journal.drain())
            .unwrap_or_default()
    }
}

impl Default for InventoryEngine {
    fn default() -> Self {
        Self::new()
    }
}
