//! Test utilities for boxrecon-core
//!
//! This module provides a mock catering API server that can be used for
//! development and integration tests of the HTTP client.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use serde::Deserialize;
use tokio::sync::oneshot;

use crate::client::types::{
    EventList, EventSummary, GuestOrder, OrderItem, OrderList, TokenResponse,
};

pub const MOCK_CLIENT_ID: &str = "test-client";
pub const MOCK_CLIENT_SECRET: &str = "test-secret";

/// Event whose orders endpoint always answers 500
pub const FAILING_EVENT_ID: &str = "EV-FAIL";
/// Event whose orders endpoint answers 503 on the first call only
pub const FLAKY_EVENT_ID: &str = "EV-FLAKY";

#[derive(Default)]
struct MockState {
    /// Count of tokens issued; tokens are numbered from 1
    issued: AtomicUsize,
    /// Tokens numbered at or below this are rejected
    revoked_through: AtomicUsize,
    flaky_calls: AtomicUsize,
    order_requests: AtomicUsize,
}

impl MockState {
    fn authorized(&self, headers: &HeaderMap) -> bool {
        let Some(value) = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer mock-token-"))
        else {
            return false;
        };
        match value.parse::<usize>() {
            Ok(n) => {
                n > self.revoked_through.load(Ordering::SeqCst)
                    && n <= self.issued.load(Ordering::SeqCst)
            }
            Err(_) => false,
        }
    }
}

/// Mock catering API server for testing and development
pub struct MockCateringServer {
    addr: SocketAddr,
    state: Arc<MockState>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockCateringServer {
    /// Start the mock server on an available port
    pub async fn start() -> Self {
        let state = Arc::new(MockState::default());
        let app = Router::new()
            .route("/oauth/token", post(handle_token))
            .route("/events", get(handle_events))
            .route("/events/:id/orders", get(handle_orders))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            state,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Get the base URL for this mock server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Reject every token issued so far, forcing clients to refresh
    pub fn revoke_tokens(&self) {
        let issued = self.state.issued.load(Ordering::SeqCst);
        self.state.revoked_through.store(issued, Ordering::SeqCst);
    }

    /// Number of tokens issued
    pub fn token_requests(&self) -> usize {
        self.state.issued.load(Ordering::SeqCst)
    }

    /// Number of calls to the orders endpoint, failures included
    pub fn order_requests(&self) -> usize {
        self.state.order_requests.load(Ordering::SeqCst)
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockCateringServer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[derive(Deserialize)]
struct TokenForm {
    grant_type: String,
    client_id: String,
    client_secret: String,
}

async fn handle_token(
    State(state): State<Arc<MockState>>,
    Form(form): Form<TokenForm>,
) -> Response {
    if form.grant_type != "client_credentials"
        || form.client_id != MOCK_CLIENT_ID
        || form.client_secret != MOCK_CLIENT_SECRET
    {
        return (StatusCode::UNAUTHORIZED, "invalid client").into_response();
    }

    let n = state.issued.fetch_add(1, Ordering::SeqCst) + 1;
    Json(TokenResponse {
        access_token: format!("mock-token-{}", n),
        expires_in: 3600,
    })
    .into_response()
}

#[derive(Deserialize)]
struct RangeQuery {
    from: String,
    to: String,
}

async fn handle_events(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Query(range): Query<RangeQuery>,
) -> Response {
    if !state.authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    // Kickoffs are ISO 8601, so the date prefix compares lexically
    let events: Vec<EventSummary> = mock_events()
        .into_iter()
        .filter(|e| {
            let day = &e.kickoff[..10];
            day >= range.from.as_str() && day <= range.to.as_str()
        })
        .collect();

    Json(EventList { events }).into_response()
}

async fn handle_orders(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    if !state.authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    state.order_requests.fetch_add(1, Ordering::SeqCst);

    if id == FAILING_EVENT_ID {
        return (StatusCode::INTERNAL_SERVER_ERROR, "orders unavailable").into_response();
    }
    if id == FLAKY_EVENT_ID && state.flaky_calls.fetch_add(1, Ordering::SeqCst) == 0 {
        return (StatusCode::SERVICE_UNAVAILABLE, "try again").into_response();
    }

    match mock_orders().remove(&id) {
        Some(orders) => Json(OrderList { orders }).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

fn event(id: &str, name: &str, kickoff: &str) -> EventSummary {
    EventSummary {
        id: id.to_string(),
        name: name.to_string(),
        kickoff: kickoff.to_string(),
    }
}

fn order(location: &str, guest: &str, items: &[(&str, f64, f64)]) -> GuestOrder {
    GuestOrder {
        location: location.to_string(),
        guest: guest.to_string(),
        order_type: "Preorder".to_string(),
        status: "Completed".to_string(),
        items: items
            .iter()
            .map(|(menu_item, quantity, unit_price)| OrderItem {
                menu_item: menu_item.to_string(),
                quantity: *quantity,
                unit_price: *unit_price,
            })
            .collect(),
    }
}

/// Events served by the mock, in kickoff order
pub fn mock_events() -> Vec<EventSummary> {
    vec![
        event("EV-1001", "Arsenal v Chelsea", "2024-03-09T15:00:00"),
        event(FAILING_EVENT_ID, "Arsenal v Spurs", "2024-03-12T19:45:00"),
        event(FLAKY_EVENT_ID, "Arsenal v Everton", "2024-03-16T12:30:00"),
        event("EV-2001", "Arsenal v Fulham", "2024-04-20T15:00:00"),
    ]
}

fn mock_orders() -> HashMap<String, Vec<GuestOrder>> {
    HashMap::from([
        (
            "EV-1001".to_string(),
            vec![
                order(
                    "Executive Box 5",
                    "Jo Bloggs (jo@example.com)",
                    &[("Champagne", 2.0, 45.0), ("Sharing Platter", 1.0, 30.0)],
                ),
                order("Box 7", "Al Smith (al@example.com)", &[("Beer Bucket", 1.0, 45.0)]),
            ],
        ),
        (
            FLAKY_EVENT_ID.to_string(),
            vec![order(
                "Box 7",
                "Al Smith (al@example.com)",
                &[("Soft Drinks", 4.0, 3.5)],
            )],
        ),
        (
            "EV-2001".to_string(),
            vec![order(
                "Exec Box 5",
                "Jo Bloggs (jo@example.com)",
                &[("Red Wine", 1.0, 32.0)],
            )],
        ),
    ])
}
