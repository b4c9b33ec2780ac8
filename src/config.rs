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

//! Engine configuration.

use crate::error::InventoryError;
use serde::{Deserialize, Serialize};

/// Threshold applied to items registered without one.
pub const DEFAULT_LOW_STOCK_THRESHOLD: i64 = 5;

/// Largest quantity a single cart line may reserve.
pub const MAX_LINE_QUANTITY: i64 = 99;

/// Tunables for [`InventoryEngine`](crate::InventoryEngine).
///
/// Missing fields take their defaults when deserialized:
///
/// ```
/// use stock_ledger_rs::EngineConfig;
///
/// let config: EngineConfig = serde_json::from_str(r#"{"max_line_quantity": 10}"#).unwrap();
/// assert_eq!(config.max_line_quantity, 10);
/// assert_eq!(config.default_threshold, 5);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub default_threshold: i64,
    pub max_line_quantity: i64,
    /// Keep a [`StockJournal`](crate::StockJournal) of every committed mutation.
    pub record_movements: bool,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), InventoryError> {
        if self.default_threshold < 0 {
            return Err(InventoryError::InvalidArgument(
                "default threshold must not be negative",
            ));
        }
        if self.max_line_quantity < 1 {
            return Err(InventoryError::InvalidArgument(
                "max line quantity must be at least 1",
            ));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_threshold: DEFAULT_LOW_STOCK_THRESHOLD,
            max_line_quantity: MAX_LINE_QUANTITY,
            record_movements: false,
        }
    }
}
