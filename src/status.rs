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

//! Stock status classification.
//!
//! [`classify`] is the single place that maps a count and threshold to a
//! [`StockStatus`]. Per-item queries and dashboard aggregation both go through
//! it.
//!
//! ```
//! use stock_ledger_rs::{classify, StockStatus};
//!
//! assert_eq!(classify(0, 5), StockStatus::OutOfStock);
//! assert_eq!(classify(5, 5), StockStatus::LowStock);
//! assert_eq!(classify(6, 5), StockStatus::InStock);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Derived availability of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StockStatus {
    #[serde(rename = "Out of Stock")]
    OutOfStock,
    #[serde(rename = "Low Stock")]
    LowStock,
    #[serde(rename = "In Stock")]
    InStock,
}

impl StockStatus {
    /// Text shown to shoppers and admins.
    pub fn as_str(&self) -> &'static str {
        match self {
            StockStatus::OutOfStock => "Out of Stock",
            StockStatus::LowStock => "Low Stock",
            StockStatus::InStock => "In Stock",
        }
    }

    /// `true` for statuses that should raise a restock alert.
    pub fn needs_restock(&self) -> bool {
        !matches!(self, StockStatus::InStock)
    }
}

impl fmt::Display for StockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifies a stock count against its low-stock threshold.
///
/// Zero is out of stock; anything at or below the threshold is low.
pub fn classify(count: i64, threshold: i64) -> StockStatus {
    if count <= 0 {
        StockStatus::OutOfStock
    } else if count <= threshold {
        StockStatus::LowStock
    } else {
        StockStatus::InStock
    }
}
