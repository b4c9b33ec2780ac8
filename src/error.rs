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

//! Error types for ledger, cart, and batch operations.

use crate::base::{CartId, ItemId};
use thiserror::Error;

/// Inventory engine errors.
///
/// None of these are retried automatically: a stock rejection is stable until
/// the stock itself changes, and argument errors cannot succeed on retry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InventoryError {
    /// Item id is not registered in the ledger
    #[error("item {0} not found")]
    ItemNotFound(ItemId),

    /// Quantity or threshold violates a constraint; the message names it
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// A ledger adjustment would drive the stock count below zero
    #[error("insufficient stock for item {item_id}: {available} available, {requested} requested")]
    InsufficientStock {
        item_id: ItemId,
        available: i64,
        requested: i64,
    },

    /// A cart asked for more units than are currently available
    #[error("not enough stock for item {item_id}: {available} available, {requested} requested")]
    NotEnoughStock {
        item_id: ItemId,
        available: i64,
        requested: i64,
    },

    /// Item id is already registered
    #[error("item {0} already exists")]
    DuplicateItem(ItemId),

    /// Checkout of a cart without reservations
    #[error("cart {0} is empty")]
    EmptyCart(CartId),
}

impl InventoryError {
    /// Converts a ledger-level stock rejection into the cart-facing signal.
    ///
    /// Every other error passes through unchanged.
    pub(crate) fn into_cart_error(self) -> Self {
        match self {
            InventoryError::InsufficientStock {
                item_id,
                available,
                requested,
            } => InventoryError::NotEnoughStock {
                item_id,
                available,
                requested,
            },
            other => other,
        }
    }
}
