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

//! REST API for the inventory engine.
//!
//! Exposes the stock endpoints the storefront and admin scripts call. The cart
//! id travels in the request body; authentication and sessions belong to the
//! surrounding application.
//!
//! Run with:
//! ```sh
//! cargo run --example server
//! ```
//!
//! ```sh
//! # Register a record with 10 units
//! curl -X POST http://localhost:3000/admin/api/records \
//!   -H "Content-Type: application/json" \
//!   -d '{"item_id": 1, "stock": 10, "threshold": 5}'
//!
//! # Reserve 2 units for cart 7
//! curl -X POST http://localhost:3000/cart/add \
//!   -H "Content-Type: application/json" \
//!   -d '{"cart_id": 7, "item_id": 1, "quantity": 2}'
//!
//! # Shopper-facing status
//! curl http://localhost:3000/records/1/stock-status
//!
//! # Batch correction
//! curl -X PUT http://localhost:3000/admin/api/records/stock/batch \
//!   -H "Content-Type: application/json" \
//!   -d '[{"id": 1, "quantity": 20}, {"id": 2, "threshold": 3}]'
//!
//! # Dashboard
//! curl http://localhost:3000/admin/api/inventory/status
//! ```

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use stock_ledger_rs::{
    CartId, InventoryEngine, InventoryError, InventorySnapshot, ItemId, MutationResult,
    Reservation, StockLevel, StockMutation,
};
use tokio::net::TcpListener;

// === Request/Response DTOs ===

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub item_id: u64,
    pub stock: i64,
    pub threshold: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartLineRequest {
    pub cart_id: u64,
    pub item_id: u64,
    pub quantity: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItemRequest {
    pub cart_id: u64,
    pub item_id: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartRequest {
    pub cart_id: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuantityRequest {
    pub quantity: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdRequest {
    pub threshold: i64,
}

/// One row of the admin batch editor: either a stock or a threshold value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BatchEntry {
    Stock { id: u64, quantity: i64 },
    Threshold { id: u64, threshold: i64 },
}

impl BatchEntry {
    fn into_mutation(self) -> StockMutation {
        match self {
            Self::Stock { id, quantity } => StockMutation::SetStock {
                item_id: ItemId(id),
                quantity,
            },
            Self::Threshold { id, threshold } => StockMutation::SetThreshold {
                item_id: ItemId(id),
                threshold,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockStatusResponse {
    pub item: u64,
    pub status: String,
    pub stock: i64,
    pub threshold: i64,
}

impl From<StockLevel> for StockStatusResponse {
    fn from(level: StockLevel) -> Self {
        Self {
            item: level.item_id.0,
            status: level.status.to_string(),
            stock: level.stock,
            threshold: level.threshold,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationResponse {
    pub cart_id: u64,
    pub item_id: u64,
    pub quantity: i64,
}

impl From<Reservation> for ReservationResponse {
    fn from(reservation: Reservation) -> Self {
        Self {
            cart_id: reservation.cart_id.0,
            item_id: reservation.item_id.0,
            quantity: reservation.quantity,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviousValueResponse {
    pub previous: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockResponse {
    pub stock: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResultResponse {
    pub index: usize,
    /// Absent when the row carried no usable id.
    pub id: Option<u64>,
    pub ok: bool,
    pub previous: Option<i64>,
    pub error: Option<ErrorResponse>,
}

impl From<MutationResult> for BatchResultResponse {
    fn from(result: MutationResult) -> Self {
        let (previous, error) = match result.outcome {
            Ok(previous) => (Some(previous), None),
            Err(e) => (None, Some(ErrorResponse::from(&e))),
        };
        Self {
            index: result.index,
            id: Some(result.mutation.item_id().0),
            ok: error.is_none(),
            previous,
            error,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryStatusResponse {
    pub snapshot: InventorySnapshot,
    pub needing_restock: Vec<StockStatusResponse>,
}

/// Response body for errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl From<&InventoryError> for ErrorResponse {
    fn from(err: &InventoryError) -> Self {
        ErrorResponse {
            error: err.to_string(),
            code: error_status(err).1.to_string(),
        }
    }
}

fn error_status(err: &InventoryError) -> (StatusCode, &'static str) {
    match err {
        InventoryError::ItemNotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
        InventoryError::InvalidArgument(_) => (StatusCode::BAD_REQUEST, "INVALID_ARGUMENT"),
        InventoryError::NotEnoughStock { .. } => (StatusCode::CONFLICT, "NOT_ENOUGH_STOCK"),
        InventoryError::InsufficientStock { .. } => {
            (StatusCode::CONFLICT, "INSUFFICIENT_STOCK")
        }
        InventoryError::DuplicateItem(_) => (StatusCode::CONFLICT, "DUPLICATE_ITEM"),
        InventoryError::EmptyCart(_) => (StatusCode::UNPROCESSABLE_ENTITY, "EMPTY_CART"),
    }
}

// === Application State ===

/// Shared application state containing the inventory engine.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<InventoryEngine>,
}

// === Error Handling ===

/// Wrapper for converting `InventoryError` into HTTP responses.
pub struct AppError(InventoryError);

impl From<InventoryError> for AppError {
    fn from(err: InventoryError) -> Self {
        AppError(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, _) = error_status(&self.0);
        (status, Json(ErrorResponse::from(&self.0))).into_response()
    }
}

// === Handlers ===

/// POST /admin/api/records - Register a catalog item.
async fn register_item(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<StockStatusResponse>), AppError> {
    let level =
        state
            .engine
            .register_item(ItemId(request.item_id), request.stock, request.threshold)?;
    Ok((StatusCode::CREATED, Json(level.into())))
}

/// GET /records/{id}/stock-status - Shopper-facing status.
async fn stock_status(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<StockStatusResponse>, AppError> {
    let level = state.engine.item_level(ItemId(id))?;
    Ok(Json(level.into()))
}

/// POST /cart/add - Reserve units for a cart.
async fn add_to_cart(
    State(state): State<AppState>,
    Json(request): Json<CartLineRequest>,
) -> Result<Json<ReservationResponse>, AppError> {
    let reservation = state.engine.add_to_cart(
        CartId(request.cart_id),
        ItemId(request.item_id),
        request.quantity,
    )?;
    Ok(Json(reservation.into()))
}

/// POST /cart/update-quantity - Set a cart line's quantity.
async fn update_quantity(
    State(state): State<AppState>,
    Json(request): Json<CartLineRequest>,
) -> Result<Json<ReservationResponse>, AppError> {
    let reservation = state.engine.update_cart_quantity(
        CartId(request.cart_id),
        ItemId(request.item_id),
        request.quantity,
    )?;
    Ok(Json(reservation.into()))
}

/// POST /cart/remove - Release a cart line.
async fn remove_from_cart(
    State(state): State<AppState>,
    Json(request): Json<CartItemRequest>,
) -> StatusCode {
    state
        .engine
        .remove_from_cart(CartId(request.cart_id), ItemId(request.item_id));
    StatusCode::NO_CONTENT
}

/// POST /cart/clear - Release every line of a cart.
async fn clear_cart(State(state): State<AppState>, Json(request): Json<CartRequest>) -> StatusCode {
    state.engine.clear_cart(CartId(request.cart_id));
    StatusCode::NO_CONTENT
}

/// POST /cart/checkout - Commit a cart's reservations.
async fn checkout(
    State(state): State<AppState>,
    Json(request): Json<CartRequest>,
) -> Result<Json<Vec<ReservationResponse>>, AppError> {
    let committed = state.engine.checkout(CartId(request.cart_id))?;
    Ok(Json(committed.into_iter().map(Into::into).collect()))
}

/// GET /cart/{id} - Cart contents.
async fn cart_contents(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Json<Vec<ReservationResponse>> {
    let lines = state.engine.cart_contents(CartId(id));
    Json(lines.into_iter().map(Into::into).collect())
}

/// PUT /admin/api/records/{id}/stock - Overwrite the stock count.
async fn set_stock(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<QuantityRequest>,
) -> Result<Json<PreviousValueResponse>, AppError> {
    let previous = state.engine.set_stock(ItemId(id), request.quantity)?;
    Ok(Json(PreviousValueResponse { previous }))
}

/// POST /admin/api/records/{id}/stock/add - Receive new units.
async fn restock(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<QuantityRequest>,
) -> Result<Json<StockResponse>, AppError> {
    let stock = state.engine.restock(ItemId(id), request.quantity)?;
    Ok(Json(StockResponse { stock }))
}

/// PUT /admin/api/records/{id}/threshold - Overwrite the low-stock threshold.
async fn set_threshold(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<ThresholdRequest>,
) -> Result<Json<PreviousValueResponse>, AppError> {
    let previous = state.engine.set_threshold(ItemId(id), request.threshold)?;
    Ok(Json(PreviousValueResponse { previous }))
}

/// PUT /admin/api/records/stock/batch - Apply corrections with per-entry results.
///
/// Rows that do not decode are reported as `INVALID_ARGUMENT` in their own
/// slot; the remaining rows are still applied.
async fn batch_update(
    State(state): State<AppState>,
    Json(rows): Json<Vec<serde_json::Value>>,
) -> Json<Vec<BatchResultResponse>> {
    let mut responses: Vec<Option<BatchResultResponse>> = Vec::with_capacity(rows.len());
    let mut positions = Vec::new();
    let mut mutations = Vec::new();

    for (index, row) in rows.into_iter().enumerate() {
        let id = row.get("id").and_then(serde_json::Value::as_u64);
        match serde_json::from_value::<BatchEntry>(row) {
            Ok(entry) => {
                positions.push(index);
                mutations.push(entry.into_mutation());
                responses.push(None);
            }
            Err(_) => {
                let err = InventoryError::InvalidArgument(
                    "batch entry needs an id and a numeric quantity or threshold",
                );
                responses.push(Some(BatchResultResponse {
                    index,
                    id,
                    ok: false,
                    previous: None,
                    error: Some(ErrorResponse::from(&err)),
                }));
            }
        }
    }

    for result in state.engine.apply_batch(&mutations) {
        let index = positions[result.index];
        let mut response = BatchResultResponse::from(result);
        response.index = index;
        responses[index] = Some(response);
    }

    Json(responses.into_iter().flatten().collect())
}

/// GET /admin/api/inventory/status - Dashboard figures.
async fn inventory_status(State(state): State<AppState>) -> Json<InventoryStatusResponse> {
    Json(InventoryStatusResponse {
        snapshot: state.engine.snapshot(),
        needing_restock: state
            .engine
            .needing_restock()
            .into_iter()
            .map(Into::into)
            .collect(),
    })
}

// === Router ===

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/records/{id}/stock-status", get(stock_status))
        .route("/cart/add", post(add_to_cart))
        .route("/cart/update-quantity", post(update_quantity))
        .route("/cart/remove", post(remove_from_cart))
        .route("/cart/clear", post(clear_cart))
        .route("/cart/checkout", post(checkout))
        .route("/cart/{id}", get(cart_contents))
        .route("/admin/api/records", post(register_item))
        .route("/admin/api/records/stock/batch", put(batch_update))
        .route("/admin/api/records/{id}/stock", put(set_stock))
        .route("/admin/api/records/{id}/stock/add", post(restock))
        .route("/admin/api/records/{id}/threshold", put(set_threshold))
        .route("/admin/api/inventory/status", get(inventory_status))
        .with_state(state)
}

// === Main ===

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let state = AppState {
        engine: Arc::new(InventoryEngine::new()),
    };

    let app = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:3000").await.unwrap();
    println!("Inventory API server running on http://127.0.0.1:3000");
    println!();
    println!("Endpoints:");
    println!("  GET  /records/:id/stock-status          - Stock status");
    println!("  POST /cart/add                          - Reserve units");
    println!("  POST /cart/update-quantity              - Change a cart line");
    println!("  POST /cart/remove                       - Release a cart line");
    println!("  POST /cart/clear                        - Release a cart");
    println!("  POST /cart/checkout                     - Commit a cart");
    println!("  PUT  /admin/api/records/:id/stock       - Set stock");
    println!("  PUT  /admin/api/records/:id/threshold   - Set threshold");
    println!("  PUT  /admin/api/records/stock/batch     - Batch corrections");
    println!("  GET  /admin/api/inventory/status        - Dashboard");

    axum::serve(listener, app).await.unwrap();
}
