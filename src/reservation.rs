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

//! Cart reservations.
//!
//! A [`Reservation`] is a cart's claim on units of an item. Units are deducted
//! from the [`StockLedger`] when they are reserved and returned when the
//! reservation shrinks or is released, so `get_stock` always reports what is
//! still sellable and the non-negativity check in the ledger is the only
//! oversell guard.
//!
//! ```text
//!  add_to_cart ──────► adjust_stock(-q) ──► reservation += q
//!  update_quantity ──► adjust_stock(cur - new) ──► reservation = new
//!  remove_from_cart ─► adjust_stock(+reserved) ──► reservation dropped
//!  checkout ─────────► (ledger untouched) ──► reservations consumed
//! ```
//!
//! # Locking
//!
//! Each cart has its own lock. Cart operations take the cart lock first and
//! then, through the ledger, the item lock; the ledger never takes cart locks,
//! so the two can not form a cycle. A cart that becomes empty is marked closed
//! under its lock and dropped from the map; an operation that finds a closed
//! cart retries on a fresh one.

use crate::base::{CartId, ItemId};
use crate::config::EngineConfig;
use crate::error::InventoryError;
use crate::journal::MovementKind;
use crate::ledger::StockLedger;
use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Units of one item held by one cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reservation {
    pub cart_id: CartId,
    pub item_id: ItemId,
    pub quantity: i64,
    pub created_at: DateTime<Utc>,
    /// Last time the quantity changed; stale sweeps measure age from here.
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct CartData {
    lines: HashMap<ItemId, Reservation>,
    closed: bool,
}

impl CartData {
    fn quantity(&self, item_id: ItemId) -> i64 {
        self.lines.get(&item_id).map_or(0, |r| r.quantity)
    }

    /// Sets the line for `item_id` to `quantity`, creating it if needed.
    fn upsert(&mut self, cart_id: CartId, item_id: ItemId, quantity: i64) -> Reservation {
        let now = Utc::now();
        let reservation = self.lines.entry(item_id).or_insert_with(|| Reservation {
            cart_id,
            item_id,
            quantity: 0,
            created_at: now,
            updated_at: now,
        });
        reservation.quantity = quantity;
        reservation.updated_at = now;
        reservation.clone()
    }

    fn sorted_lines(&self) -> Vec<Reservation> {
        let mut lines: Vec<Reservation> = self.lines.values().cloned().collect();
        lines.sort_by_key(|r| r.item_id);
        lines
    }

    fn take_where(&mut self, keep: impl Fn(&Reservation) -> bool) -> Vec<Reservation> {
        let mut taken: Vec<Reservation> = Vec::new();
        self.lines.retain(|_, reservation| {
            if keep(reservation) {
                true
            } else {
                taken.push(reservation.clone());
                false
            }
        });
        taken.sort_by_key(|r| r.item_id);
        taken
    }
}

/// Translates cart intents into ledger adjustments.
#[derive(Debug)]
pub struct ReservationManager {
    ledger: Arc<StockLedger>,
    carts: DashMap<CartId, Arc<Mutex<CartData>>>,
    max_line_quantity: i64,
}

impl ReservationManager {
    pub fn new(ledger: Arc<StockLedger>) -> Self {
        Self::with_config(ledger, &EngineConfig::default())
    }

    pub fn with_config(ledger: Arc<StockLedger>, config: &EngineConfig) -> Self {
        Self {
            ledger,
            carts: DashMap::new(),
            max_line_quantity: config.max_line_quantity,
        }
    }

    /// Runs `f` with the cart locked, creating the cart if needed.
    fn with_cart<R>(&self, cart_id: CartId, f: impl FnOnce(&mut CartData) -> R) -> R {
        loop {
            // The map guard must be gone before the cart lock is taken.
            let cart = Arc::clone(
                self.carts
                    .entry(cart_id)
                    .or_insert_with(Default::default)
                    .value(),
            );
            let mut data = cart.lock();
            if data.closed {
                drop(data);
                std::thread::yield_now();
                continue;
            }

            let out = f(&mut data);
            if data.lines.is_empty() {
                data.closed = true;
                self.carts
                    .remove_if(&cart_id, |_, current| Arc::ptr_eq(current, &cart));
            }
            return out;
        }
    }

    fn read_cart<R>(&self, cart_id: CartId, f: impl FnOnce(&CartData) -> R) -> Option<R> {
        let cart = self
            .carts
            .get(&cart_id)
            .map(|cart| Arc::clone(cart.value()))?;
        let data = cart.lock();
        Some(f(&data))
    }

    fn check_line_quantity(&self, quantity: i64) -> Result<(), InventoryError> {
        if quantity < 1 {
            return Err(InventoryError::InvalidArgument("quantity must be at least 1"));
        }
        if quantity > self.max_line_quantity {
            return Err(InventoryError::InvalidArgument(
                "quantity exceeds the per-line maximum",
            ));
        }
        Ok(())
    }

    /// Returns reserved units to the ledger.
    ///
    /// Restorations saturate rather than fail, so an error here means the
    /// ledger lost an item it had handed out.
    fn release(&self, reservation: &Reservation) {
        if let Err(e) = self
            .ledger
            .restore_stock(reservation.item_id, reservation.quantity)
        {
            error!(
                cart_id = %reservation.cart_id,
                item_id = %reservation.item_id,
                quantity = reservation.quantity,
                error = %e,
                "failed to return reserved units to the ledger"
            );
        }
    }

    /// Reserves `quantity` more units of an item for a cart.
    ///
    /// # Errors
    ///
    /// - [`InventoryError::InvalidArgument`] - `quantity < 1`, or the line
    ///   would exceed the per-line maximum.
    /// - [`InventoryError::ItemNotFound`] - Unknown item id.
    /// - [`InventoryError::NotEnoughStock`] - Fewer than `quantity` units are
    ///   available. The cart is unchanged.
    pub fn add_to_cart(
        &self,
        cart_id: CartId,
        item_id: ItemId,
        quantity: i64,
    ) -> Result<Reservation, InventoryError> {
        self.check_line_quantity(quantity)?;

        self.with_cart(cart_id, |cart| -> Result<Reservation, InventoryError> {
            let target = cart
                .quantity(item_id)
                .checked_add(quantity)
                .ok_or(InventoryError::InvalidArgument(
                    "quantity exceeds the per-line maximum",
                ))?;
            self.check_line_quantity(target)?;

            self.ledger
                .adjust_stock_as(item_id, -quantity, MovementKind::Reserved)
                .map_err(InventoryError::into_cart_error)
                .inspect_err(|e| {
                    debug!(%cart_id, %item_id, quantity, error = %e, "add to cart rejected")
                })?;

            Ok(cart.upsert(cart_id, item_id, target))
        })
    }

    /// Sets a cart line to exactly `new_quantity` units.
    ///
    /// A cart without a line for the item is treated as holding zero units.
    ///
    /// # Errors
    ///
    /// - [`InventoryError::InvalidArgument`] - `new_quantity < 1` or above the
    ///   per-line maximum. Use [`remove_from_cart`](Self::remove_from_cart) to
    ///   drop a line.
    /// - [`InventoryError::NotEnoughStock`] - Growing the line needs more units
    ///   than are available. The line keeps its previous quantity.
    pub fn update_quantity(
        &self,
        cart_id: CartId,
        item_id: ItemId,
        new_quantity: i64,
    ) -> Result<Reservation, InventoryError> {
        self.check_line_quantity(new_quantity)?;

        self.with_cart(cart_id, |cart| -> Result<Reservation, InventoryError> {
            let delta = new_quantity - cart.quantity(item_id);
            if delta > 0 {
                self.ledger
                    .adjust_stock_as(item_id, -delta, MovementKind::Reserved)
                    .map_err(InventoryError::into_cart_error)
                    .inspect_err(|e| {
                        debug!(
                            %cart_id,
                            %item_id,
                            new_quantity,
                            error = %e,
                            "quantity update rejected"
                        )
                    })?;
            } else if delta < 0 {
                self.ledger.restore_stock(item_id, -delta)?;
            }

            Ok(cart.upsert(cart_id, item_id, new_quantity))
        })
    }

    /// Releases a cart line. Removing a line that does not exist is a no-op.
    pub fn remove_from_cart(&self, cart_id: CartId, item_id: ItemId) -> Option<Reservation> {
        // Skip creating a cart just to find it empty.
        self.carts.get(&cart_id)?;

        self.with_cart(cart_id, |cart| -> Option<Reservation> {
            let reservation = cart.lines.remove(&item_id)?;
            self.release(&reservation);
            Some(reservation)
        })
    }

    /// Releases every line of a cart. Never fails.
    pub fn clear_cart(&self, cart_id: CartId) -> Vec<Reservation> {
        if !self.carts.contains_key(&cart_id) {
            return Vec::new();
        }

        let released = self.with_cart(cart_id, |cart| {
            let released = cart.take_where(|_| false);
            for reservation in &released {
                self.release(reservation);
            }
            released
        });
        if !released.is_empty() {
            info!(%cart_id, lines = released.len(), "cart cleared");
        }
        released
    }

    /// Consumes a cart's reservations for an order.
    ///
    /// The units were deducted when reserved, so the ledger is not touched.
    ///
    /// # Errors
    ///
    /// - [`InventoryError::EmptyCart`] - The cart holds no reservations.
    pub fn checkout(&self, cart_id: CartId) -> Result<Vec<Reservation>, InventoryError> {
        if !self.carts.contains_key(&cart_id) {
            return Err(InventoryError::EmptyCart(cart_id));
        }

        let committed = self.with_cart(cart_id, |cart| cart.take_where(|_| false));
        if committed.is_empty() {
            return Err(InventoryError::EmptyCart(cart_id));
        }
        info!(%cart_id, lines = committed.len(), "cart checked out");
        Ok(committed)
    }

    pub fn reservation(&self, cart_id: CartId, item_id: ItemId) -> Option<Reservation> {
        self.read_cart(cart_id, |cart| cart.lines.get(&item_id).cloned())
            .flatten()
    }

    /// Lines of a cart, ordered by item id.
    pub fn cart_contents(&self, cart_id: CartId) -> Vec<Reservation> {
        self.read_cart(cart_id, CartData::sorted_lines)
            .unwrap_or_default()
    }

    /// Total units held by a cart across all lines.
    pub fn cart_item_count(&self, cart_id: CartId) -> i64 {
        self.read_cart(cart_id, |cart| cart.lines.values().map(|r| r.quantity).sum::<i64>())
            .unwrap_or(0)
    }

    /// Units of an item currently held across all carts.
    pub fn reserved_units(&self, item_id: ItemId) -> i64 {
        self.cart_handles()
            .iter()
            .map(|cart| cart.lock().quantity(item_id))
            .sum()
    }

    fn cart_handles(&self) -> Vec<Arc<Mutex<CartData>>> {
        self.carts
            .iter()
            .map(|cart| Arc::clone(cart.value()))
            .collect()
    }

    /// Reservations untouched since `now - max_age` or earlier, ordered by cart
    /// then item.
    pub fn stale_reservations(&self, now: DateTime<Utc>, max_age: TimeDelta) -> Vec<Reservation> {
        let cutoff = now - max_age;
        let mut stale: Vec<Reservation> = self
            .cart_handles()
            .iter()
            .flat_map(|cart| {
                cart.lock()
                    .lines
                    .values()
                    .filter(|r| r.updated_at <= cutoff)
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .collect();
        stale.sort_by_key(|r| (r.cart_id, r.item_id));
        stale
    }

    /// Releases every stale reservation and returns what was released, ordered
    /// by cart then item.
    ///
    /// Staleness is re-checked under each cart's lock, so a line touched after
    /// the scan started is kept.
    pub fn sweep_stale(&self, now: DateTime<Utc>, max_age: TimeDelta) -> Vec<Reservation> {
        let cutoff = now - max_age;
        let cart_ids: Vec<CartId> = self.carts.iter().map(|cart| *cart.key()).collect();

        let mut released = Vec::new();
        for cart_id in cart_ids {
            if !self.carts.contains_key(&cart_id) {
                continue;
            }
            released.extend(self.with_cart(cart_id, |cart| {
                let stale = cart.take_where(|r| r.updated_at > cutoff);
                for reservation in &stale {
                    self.release(reservation);
                }
                stale
            }));
        }

        released.sort_by_key(|r| (r.cart_id, r.item_id));
        if !released.is_empty() {
            info!(released = released.len(), %cutoff, "stale reservations swept");
        }
        released
    }

    /// Number of carts currently holding at least one reservation.
    pub fn active_carts(&self) -> usize {
        self.carts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager_with(item: u64, stock: i64) -> (Arc<StockLedger>, ReservationManager) {
        let ledger = Arc::new(StockLedger::new());
        ledger.register_item(ItemId(item), stock, None).unwrap();
        let manager = ReservationManager::new(Arc::clone(&ledger));
        (ledger, manager)
    }

    #[test]
    fn cart_data_upsert_keeps_created_at() {
        let mut cart = CartData::default();
        let first = cart.upsert(CartId(1), ItemId(1), 2);
        let second = cart.upsert(CartId(1), ItemId(1), 5);
        assert_eq!(second.quantity, 5);
        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at >= first.updated_at);
    }

    #[test]
    fn failed_add_leaves_no_cart_behind() {
        let (_, manager) = manager_with(1, 0);
        assert!(manager.add_to_cart(CartId(1), ItemId(1), 1).is_err());
        assert_eq!(manager.active_carts(), 0);
    }

    #[test]
    fn accumulated_quantity_overflow_is_invalid_argument() {
        let ledger = Arc::new(StockLedger::new());
        ledger.register_item(ItemId(1), i64::MAX, None).unwrap();
        let config = EngineConfig {
            max_line_quantity: i64::MAX,
            ..EngineConfig::default()
        };
        let manager = ReservationManager::with_config(Arc::clone(&ledger), &config);

        manager.add_to_cart(CartId(1), ItemId(1), 1).unwrap();
        assert_eq!(
            manager.add_to_cart(CartId(1), ItemId(1), i64::MAX),
            Err(InventoryError::InvalidArgument(
                "quantity exceeds the per-line maximum"
            ))
        );
        assert_eq!(manager.cart_item_count(CartId(1)), 1);
        assert_eq!(ledger.get_stock(ItemId(1)).unwrap().0, i64::MAX - 1);
    }

    #[test]
    fn release_after_stock_set_near_max_keeps_stock_and_drops_line() {
        let (ledger, manager) = manager_with(1, 10);
        manager.add_to_cart(CartId(1), ItemId(1), 4).unwrap();
        ledger.set_stock(ItemId(1), i64::MAX - 1).unwrap();

        let released = manager.remove_from_cart(CartId(1), ItemId(1));

        assert_eq!(released.map(|r| r.quantity), Some(4));
        assert_eq!(ledger.get_stock(ItemId(1)).unwrap().0, i64::MAX);
        assert_eq!(manager.active_carts(), 0);
    }

    #[test]
    fn shrinking_line_after_stock_set_near_max_succeeds() {
        let (ledger, manager) = manager_with(1, 10);
        manager.add_to_cart(CartId(1), ItemId(1), 5).unwrap();
        ledger.set_stock(ItemId(1), i64::MAX).unwrap();

        let line = manager.update_quantity(CartId(1), ItemId(1), 2).unwrap();

        assert_eq!(line.quantity, 2);
        assert_eq!(ledger.get_stock(ItemId(1)).unwrap().0, i64::MAX);
    }

    #[test]
    fn emptied_cart_is_dropped_and_reusable() {
        let (ledger, manager) = manager_with(1, 5);
        manager.add_to_cart(CartId(1), ItemId(1), 2).unwrap();
        manager.remove_from_cart(CartId(1), ItemId(1));
        assert_eq!(manager.active_carts(), 0);

        manager.add_to_cart(CartId(1), ItemId(1), 1).unwrap();
        assert_eq!(manager.cart_item_count(CartId(1)), 1);
        assert_eq!(ledger.get_stock(ItemId(1)).unwrap().0, 4);
    }

    #[test]
    fn line_maximum_applies_to_accumulated_quantity() {
        let ledger = Arc::new(StockLedger::new());
        ledger.register_item(ItemId(1), 500, None).unwrap();
        let manager = ReservationManager::with_config(
            Arc::clone(&ledger),
            &EngineConfig {
                max_line_quantity: 10,
                ..EngineConfig::default()
            },
        );

        manager.add_to_cart(CartId(1), ItemId(1), 8).unwrap();
        assert!(matches!(
            manager.add_to_cart(CartId(1), ItemId(1), 3),
            Err(InventoryError::InvalidArgument(_))
        ));
        assert_eq!(ledger.get_stock(ItemId(1)).unwrap().0, 492);
    }

    #[test]
    fn release_restores_reserved_units() {
        let (ledger, manager) = manager_with(1, 5);
        let reservation = manager.add_to_cart(CartId(1), ItemId(1), 3).unwrap();
        manager.release(&reservation);
        assert_eq!(ledger.get_stock(ItemId(1)).unwrap().0, 5);
    }
}
