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

use clap::Parser;
use csv::{ReaderBuilder, Trim};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process;
use stock_ledger_rs::{
    CartId, EngineConfig, InventoryEngine, InventoryError, InventorySnapshot, ItemId, StockLevel,
    StockMovement,
};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Stock Ledger - Replay catalog and cart activity
///
/// Loads a catalog CSV into the ledger, optionally replays an operations CSV
/// against it, and prints a JSON inventory report to stdout.
#[derive(Parser, Debug)]
#[command(name = "stock-ledger-rs")]
#[command(about = "Replays inventory activity and reports stock levels", long_about = None)]
struct Args {
    /// Path to the catalog CSV
    ///
    /// Expected format: item,stock,threshold (threshold may be empty)
    #[arg(long, value_name = "FILE")]
    catalog: PathBuf,

    /// Path to an operations CSV
    ///
    /// Expected format: op,cart,item,quantity
    #[arg(long, value_name = "FILE")]
    ops: Option<PathBuf>,

    /// Threshold for catalog rows that leave it empty
    #[arg(long, default_value_t = stock_ledger_rs::DEFAULT_LOW_STOCK_THRESHOLD)]
    default_threshold: i64,

    /// Largest quantity a single cart line may hold
    #[arg(long, default_value_t = stock_ledger_rs::MAX_LINE_QUANTITY)]
    max_line_quantity: i64,

    /// Include every ledger movement in the report
    #[arg(long)]
    movements: bool,

    /// Emit logs as JSON (filter with RUST_LOG, default "warn")
    #[arg(long)]
    log_json: bool,
}

impl Args {
    fn config(&self) -> EngineConfig {
        EngineConfig {
            default_threshold: self.default_threshold,
            max_line_quantity: self.max_line_quantity,
            record_movements: self.movements,
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    // Already installed only when embedded in a test harness; keep the existing one.
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

fn main() {
    let args = Args::parse();
    init_tracing(args.log_json);

    let engine = match InventoryEngine::with_config(args.config()) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            process::exit(2);
        }
    };

    let catalog = open(&args.catalog);
    if let Err(e) = load_catalog(&engine, catalog) {
        eprintln!("Error reading catalog: {}", e);
        process::exit(1);
    }

    if let Some(path) = &args.ops {
        if let Err(e) = replay_operations(&engine, open(path)) {
            eprintln!("Error replaying operations: {}", e);
            process::exit(1);
        }
    }

    if let Err(e) = write_report(&engine, std::io::stdout()) {
        eprintln!("Error writing output: {}", e);
        process::exit(1);
    }
}

fn open(path: &Path) -> BufReader<File> {
    match File::open(path) {
        Ok(f) => BufReader::new(f),
        Err(e) => {
            eprintln!("Error opening file '{}': {}", path.display(), e);
            process::exit(1);
        }
    }
}

/// Catalog row: `item, stock, threshold`.
#[derive(Debug, Deserialize)]
struct CatalogRecord {
    item: u64,
    stock: i64,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    threshold: Option<i64>,
}

/// Registers every catalog row with the engine.
///
/// Malformed rows and rejected items are skipped and logged. Returns the
/// number of items registered.
///
/// # Errors
///
/// Returns a CSV error if the reader fails or the header is unreadable.
pub fn load_catalog<R: Read>(engine: &InventoryEngine, reader: R) -> Result<usize, csv::Error> {
    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .has_headers(true)
        .from_reader(reader);

    let mut loaded = 0;
    for result in rdr.deserialize::<CatalogRecord>() {
        match result {
            Ok(row) => match engine.register_item(ItemId(row.item), row.stock, row.threshold) {
                Ok(_) => loaded += 1,
                Err(e) => warn!(item = row.item, error = %e, "skipping catalog row"),
            },
            Err(e) => warn!(error = %e, "skipping malformed catalog row"),
        }
    }

    info!(loaded, "catalog loaded");
    Ok(loaded)
}

/// Operation row: `op, cart, item, quantity`.
///
/// `cart` is ignored by admin operations and `item`/`quantity` by cart-wide
/// ones, so they may be left empty there.
#[derive(Debug, Deserialize)]
struct OperationRecord {
    op: String,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    cart: Option<u64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    item: Option<u64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    quantity: Option<i64>,
}

/// Engine call decoded from an operations row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Add(CartId, ItemId, i64),
    Update(CartId, ItemId, i64),
    Remove(CartId, ItemId),
    Clear(CartId),
    Checkout(CartId),
    SetStock(ItemId, i64),
    SetThreshold(ItemId, i64),
    Restock(ItemId, i64),
}

impl OperationRecord {
    /// Returns `None` for unknown operations or missing required fields.
    fn into_operation(self) -> Option<Operation> {
        let cart = self.cart.map(CartId);
        let item = self.item.map(ItemId);

        match self.op.to_lowercase().as_str() {
            "add" => Some(Operation::Add(cart?, item?, self.quantity?)),
            "update" => Some(Operation::Update(cart?, item?, self.quantity?)),
            "remove" => Some(Operation::Remove(cart?, item?)),
            "clear" => Some(Operation::Clear(cart?)),
            "checkout" => Some(Operation::Checkout(cart?)),
            "set_stock" => Some(Operation::SetStock(item?, self.quantity?)),
            "set_threshold" => Some(Operation::SetThreshold(item?, self.quantity?)),
            "restock" => Some(Operation::Restock(item?, self.quantity?)),
            _ => None,
        }
    }
}

fn apply(engine: &InventoryEngine, operation: Operation) -> Result<(), InventoryError> {
    match operation {
        Operation::Add(cart, item, quantity) => {
            engine.add_to_cart(cart, item, quantity)?;
        }
        Operation::Update(cart, item, quantity) => {
            engine.update_cart_quantity(cart, item, quantity)?;
        }
        Operation::Remove(cart, item) => engine.remove_from_cart(cart, item),
        Operation::Clear(cart) => engine.clear_cart(cart),
        Operation::Checkout(cart) => {
            engine.checkout(cart)?;
        }
        Operation::SetStock(item, quantity) => {
            engine.set_stock(item, quantity)?;
        }
        Operation::SetThreshold(item, threshold) => {
            engine.set_threshold(item, threshold)?;
        }
        Operation::Restock(item, quantity) => {
            engine.restock(item, quantity)?;
        }
    }
    Ok(())
}

/// Replays an operations CSV against the engine.
///
/// Rows are applied in file order. Malformed rows and rejected operations
/// are skipped and logged; a rejected operation leaves the engine as it was.
/// Returns the number of operations applied.
///
/// # Errors
///
/// Returns a CSV error if the reader fails or the header is unreadable.
pub fn replay_operations<R: Read>(
    engine: &InventoryEngine,
    reader: R,
) -> Result<usize, csv::Error> {
    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .has_headers(true)
        .from_reader(reader);

    let mut applied = 0;
    for result in rdr.deserialize::<OperationRecord>() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "skipping malformed operation row");
                continue;
            }
        };

        let Some(operation) = record.into_operation() else {
            warn!("skipping unknown or incomplete operation");
            continue;
        };

        match apply(engine, operation) {
            Ok(()) => applied += 1,
            Err(e) => debug!(?operation, error = %e, "operation rejected"),
        }
    }

    info!(applied, "operations replayed");
    Ok(applied)
}

#[derive(Debug, Serialize)]
struct Report {
    items: Vec<StockLevel>,
    snapshot: InventorySnapshot,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    movements: Vec<StockMovement>,
}

/// Writes the inventory report as pretty JSON.
///
/// # Errors
///
/// Returns a JSON error if serialization or writing fails.
pub fn write_report<W: Write>(engine: &InventoryEngine, mut writer: W) -> serde_json::Result<()> {
    let report = Report {
        items: engine.levels(),
        snapshot: engine.snapshot(),
        movements: engine.drain_movements(),
    };
    serde_json::to_writer_pretty(&mut writer, &report)?;
    writeln!(writer).map_err(serde_json::Error::io)?;
    Ok(())
}
