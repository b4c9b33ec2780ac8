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

//! Integration tests for the REST API server with concurrent requests.
//!
//! The router is compiled straight from the demo server so the tests exercise
//! the same handlers and error mapping.

#[allow(dead_code)]
#[path = "../demos/server.rs"]
mod server;

use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use server::{
    AppState, BatchResultResponse, ErrorResponse, InventoryStatusResponse, ReservationResponse,
    StockStatusResponse, create_router,
};
use std::sync::Arc;
use std::time::Instant;
use stock_ledger_rs::{CartId, InventoryEngine, ItemId};
use tokio::net::TcpListener;

/// Test server that binds to an ephemeral port.
struct TestServer {
    base_url: String,
    engine: Arc<InventoryEngine>,
}

impl TestServer {
    async fn new() -> Self {
        let engine = Arc::new(InventoryEngine::new());
        let state = AppState {
            engine: engine.clone(),
        };

        let app = create_router(state);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait for server to be ready by polling with retries
        let client = Client::new();
        let health_url = format!("{}/admin/api/inventory/status", base_url);
        for _ in 0..50 {
            match client.get(&health_url).send().await {
                Ok(_) => break,
                Err(_) => tokio::time::sleep(tokio::time::Duration::from_millis(50)).await,
            }
        }

        TestServer { base_url, engine }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn register(&self, id: u64, stock: i64, threshold: i64) {
        self.engine
            .register_item(ItemId(id), stock, Some(threshold))
            .unwrap();
    }
}

async fn add_to_cart(
    client: &Client,
    server: &TestServer,
    cart: u64,
    item: u64,
    qty: i64,
) -> reqwest::Response {
    client
        .post(server.url("/cart/add"))
        .json(&json!({"cart_id": cart, "item_id": item, "quantity": qty}))
        .send()
        .await
        .unwrap()
}

// === Functional Tests ===

#[tokio::test]
async fn register_and_read_stock_status() {
    let server = TestServer::new().await;
    let client = Client::new();

    let response = client
        .post(server.url("/admin/api/records"))
        .json(&json!({"item_id": 1, "stock": 10}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let status: StockStatusResponse = client
        .get(server.url("/records/1/stock-status"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status.status, "In Stock");
    assert_eq!(status.stock, 10);
    assert_eq!(status.threshold, 5);

    let duplicate = client
        .post(server.url("/admin/api/records"))
        .json(&json!({"item_id": 1, "stock": 3}))
        .send()
        .await
        .unwrap();
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn unknown_item_is_404() {
    let server = TestServer::new().await;
    let client = Client::new();

    let response = client
        .get(server.url("/records/77/stock-status"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: ErrorResponse = response.json().await.unwrap();
    assert_eq!(body.code, "NOT_FOUND");

    let response = add_to_cart(&client, &server, 1, 77, 1).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cart_flow_over_http() {
    let server = TestServer::new().await;
    let client = Client::new();
    server.register(1, 10, 5);

    let response = add_to_cart(&client, &server, 7, 1, 6).await;
    assert_eq!(response.status(), StatusCode::OK);
    let line: ReservationResponse = response.json().await.unwrap();
    assert_eq!(line.quantity, 6);

    let status: StockStatusResponse = client
        .get(server.url("/records/1/stock-status"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status.status, "Low Stock");
    assert_eq!(status.stock, 4);

    let response = add_to_cart(&client, &server, 8, 1, 5).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body: ErrorResponse = response.json().await.unwrap();
    assert_eq!(body.code, "NOT_ENOUGH_STOCK");

    let response = client
        .post(server.url("/cart/update-quantity"))
        .json(&json!({"cart_id": 7, "item_id": 1, "quantity": 2}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(server.engine.get_stock(ItemId(1)).unwrap().0, 8);

    let response = client
        .post(server.url("/cart/remove"))
        .json(&json!({"cart_id": 7, "item_id": 1}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(server.engine.get_stock(ItemId(1)).unwrap().0, 10);
}

#[tokio::test]
async fn bad_quantity_is_400() {
    let server = TestServer::new().await;
    let client = Client::new();
    server.register(1, 10, 5);

    let response = add_to_cart(&client, &server, 1, 1, 0).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = client
        .put(server.url("/admin/api/records/1/stock"))
        .json(&json!({"quantity": -1}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: ErrorResponse = response.json().await.unwrap();
    assert_eq!(body.code, "INVALID_ARGUMENT");
}

#[tokio::test]
async fn clear_and_checkout() {
    let server = TestServer::new().await;
    let client = Client::new();
    server.register(1, 10, 5);
    server.register(2, 10, 5);

    add_to_cart(&client, &server, 1, 1, 2).await;
    add_to_cart(&client, &server, 1, 2, 3).await;
    add_to_cart(&client, &server, 2, 1, 4).await;

    let response = client
        .post(server.url("/cart/clear"))
        .json(&json!({"cart_id": 1}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(server.engine.get_stock(ItemId(2)).unwrap().0, 10);

    let response = client
        .post(server.url("/cart/checkout"))
        .json(&json!({"cart_id": 2}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let committed: Vec<ReservationResponse> = response.json().await.unwrap();
    assert_eq!(committed.len(), 1);
    assert_eq!(server.engine.get_stock(ItemId(1)).unwrap().0, 6);

    let response = client
        .post(server.url("/cart/checkout"))
        .json(&json!({"cart_id": 2}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(server.engine.cart_contents(CartId(2)).is_empty());
}

#[tokio::test]
async fn admin_writes_return_previous_values() {
    let server = TestServer::new().await;
    let client = Client::new();
    server.register(1, 10, 5);

    let body: Value = client
        .put(server.url("/admin/api/records/1/stock"))
        .json(&json!({"quantity": 3}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["previous"], 10);

    let body: Value = client
        .put(server.url("/admin/api/records/1/threshold"))
        .json(&json!({"threshold": 2}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["previous"], 5);

    let body: Value = client
        .post(server.url("/admin/api/records/1/stock/add"))
        .json(&json!({"quantity": 4}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["stock"], 7);
}

#[tokio::test]
async fn batch_endpoint_reports_per_entry() {
    let server = TestServer::new().await;
    let client = Client::new();
    server.register(1, 10, 5);
    server.register(2, 10, 5);

    let response = client
        .put(server.url("/admin/api/records/stock/batch"))
        .json(&json!([
            {"id": 1, "quantity": 2},
            {"id": 99, "quantity": 4},
            {"id": 2, "threshold": -1},
            {"id": 2, "threshold": 12}
        ]))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let results: Vec<BatchResultResponse> = response.json().await.unwrap();
    let ok: Vec<bool> = results.iter().map(|r| r.ok).collect();
    assert_eq!(ok, vec![true, false, false, true]);
    assert_eq!(results[0].previous, Some(10));
    assert_eq!(results[1].error.as_ref().unwrap().code, "NOT_FOUND");
    assert_eq!(results[2].error.as_ref().unwrap().code, "INVALID_ARGUMENT");

    assert_eq!(server.engine.get_stock(ItemId(1)).unwrap(), (2, 5));
    assert_eq!(server.engine.get_stock(ItemId(2)).unwrap(), (10, 12));
}

#[tokio::test]
async fn batch_endpoint_applies_valid_rows_next_to_malformed_ones() {
    let server = TestServer::new().await;
    let client = Client::new();
    server.register(1, 3, 5);
    server.register(2, 3, 5);

    let response = client
        .put(server.url("/admin/api/records/stock/batch"))
        .json(&json!([
            {"id": 1},
            {"id": 2, "quantity": 10},
            {"id": 1, "quantity": null},
            {"id": 1, "threshold": "high"},
            {"quantity": 4},
            {"id": 1, "threshold": 1}
        ]))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let results: Vec<BatchResultResponse> = response.json().await.unwrap();
    let indexes: Vec<usize> = results.iter().map(|r| r.index).collect();
    assert_eq!(indexes, vec![0, 1, 2, 3, 4, 5]);
    let ok: Vec<bool> = results.iter().map(|r| r.ok).collect();
    assert_eq!(ok, vec![false, true, false, false, false, true]);

    for rejected in [0, 2, 3, 4] {
        assert_eq!(
            results[rejected].error.as_ref().unwrap().code,
            "INVALID_ARGUMENT"
        );
    }
    assert_eq!(results[0].id, Some(1));
    assert_eq!(results[4].id, None);
    assert_eq!(results[1].id, Some(2));
    assert_eq!(results[1].previous, Some(3));
    assert_eq!(results[5].previous, Some(5));

    assert_eq!(server.engine.get_stock(ItemId(2)).unwrap(), (10, 5));
    assert_eq!(server.engine.get_stock(ItemId(1)).unwrap(), (3, 1));
}

#[tokio::test]
async fn inventory_status_dashboard() {
    let server = TestServer::new().await;
    let client = Client::new();
    server.register(1, 0, 5);
    server.register(2, 3, 5);
    server.register(3, 40, 5);

    let status: InventoryStatusResponse = client
        .get(server.url("/admin/api/inventory/status"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(status.snapshot.total_items, 3);
    assert_eq!(status.snapshot.total_stock, 43);
    assert_eq!(status.snapshot.out_of_stock_count, 1);
    assert_eq!(status.snapshot.low_stock_count, 1);
    let restock: Vec<u64> = status.needing_restock.iter().map(|s| s.item).collect();
    assert_eq!(restock, vec![1, 2]);
}

// === Load Tests ===
// These tests are ignored in CI due to connection issues on some platforms.
// Run manually with: cargo test --test server_test -- --ignored

/// Concurrent shoppers race for limited stock; exactly the stock is sold.
#[tokio::test]
#[ignore = "requires running server, may fail in CI"]
async fn concurrent_add_to_cart_never_oversells() {
    let server = TestServer::new().await;
    let client = Client::new();

    const STOCK: i64 = 100;
    const SHOPPERS: u64 = 500;
    const BATCH_SIZE: usize = 100; // Limit concurrent connections
    server.register(1, STOCK, 5);

    let start = Instant::now();
    let carts: Vec<u64> = (1..=SHOPPERS).collect();
    let mut granted = 0usize;
    let mut refused = 0usize;

    // Process in batches to avoid exhausting ephemeral ports
    for batch in carts.chunks(BATCH_SIZE) {
        let handles: Vec<_> = batch
            .iter()
            .map(|&cart| {
                let client = client.clone();
                let url = server.url("/cart/add");
                tokio::spawn(async move {
                    client
                        .post(&url)
                        .json(&json!({"cart_id": cart, "item_id": 1, "quantity": 1}))
                        .send()
                        .await
                        .unwrap()
                        .status()
                })
            })
            .collect();

        let results: Vec<_> = futures::future::join_all(handles).await;
        for status in results {
            match status.unwrap() {
                StatusCode::OK => granted += 1,
                StatusCode::CONFLICT => refused += 1,
                other => panic!("unexpected status {other}"),
            }
        }
    }

    println!("Processed {} requests in {:?}", SHOPPERS, start.elapsed());

    assert_eq!(granted as i64, STOCK);
    assert_eq!(refused, SHOPPERS as usize - STOCK as usize);
    assert_eq!(server.engine.get_stock(ItemId(1)).unwrap().0, 0);
}

/// Admin corrections race with carts; counts stay non-negative and consistent.
#[tokio::test]
#[ignore = "requires running server, may fail in CI"]
async fn concurrent_admin_and_cart_traffic() {
    let server = TestServer::new().await;
    let client = Client::new();
    for id in 1..=5 {
        server.register(id, 50, 5);
    }

    const REQUESTS: u64 = 400;

    let handles: Vec<_> = (0..REQUESTS)
        .map(|i| {
            let client = client.clone();
            let item = i % 5 + 1;
            let (method_put, url, body) = match i % 4 {
                0 => (
                    true,
                    server.url(&format!("/admin/api/records/{item}/stock")),
                    json!({"quantity": 50}),
                ),
                1 => (
                    false,
                    server.url("/cart/remove"),
                    json!({"cart_id": i % 20, "item_id": item}),
                ),
                _ => (
                    false,
                    server.url("/cart/add"),
                    json!({"cart_id": i % 20, "item_id": item, "quantity": 2}),
                ),
            };
            tokio::spawn(async move {
                let request = if method_put {
                    client.put(&url)
                } else {
                    client.post(&url)
                };
                request.json(&body).send().await.unwrap().status()
            })
        })
        .collect();

    let results: Vec<_> = futures::future::join_all(handles).await;
    for status in results {
        let status = status.unwrap();
        assert!(
            status.is_success() || status == StatusCode::CONFLICT,
            "unexpected status {status}"
        );
    }

    for level in server.engine.levels() {
        assert!(level.stock >= 0);
    }
}
