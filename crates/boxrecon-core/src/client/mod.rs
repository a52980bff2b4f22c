//! Remote catering/ticketing API client
//!
//! # Architecture
//!
//! - `CateringApi` trait: event listing and per-event orders
//! - `CateringClient` enum: concrete wrapper providing Clone + compile-time dispatch
//! - Backends: `HttpCateringClient` (reqwest, owns its bearer token),
//!   `MockCateringClient` (seeded in memory)
//!
//! # Configuration
//!
//! Environment variables:
//! - `BOXRECON_API_BACKEND`: Backend to use (http, mock). Default: http
//! - `BOXRECON_API_URL`: API base URL (overrides `api.base_url` in config)
//! - `BOXRECON_CLIENT_ID`: Client-credentials id (required for http)
//! - `BOXRECON_CLIENT_SECRET`: Client-credentials secret (required for http)
//!
//! Fetching is sequential. A failed event is recorded in
//! [`FetchReport::failures`] and omitted from the table; the run continues.

mod http;
mod mock;
mod token;
pub mod types;

pub use http::HttpCateringClient;
pub use mock::MockCateringClient;
pub use token::TokenManager;
pub use types::{EventSummary, GuestOrder, OrderItem};

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::{ApiColumns, ApiConfig};
use crate::error::{Error, Result};
use crate::table::RawTable;

/// Operations every catering backend provides
#[async_trait]
pub trait CateringApi: Send + Sync {
    /// Events with kickoff between `from` and `to` inclusive
    async fn list_events(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<EventSummary>>;

    /// Guest orders (with line items) for one event
    async fn event_orders(&self, event_id: &str) -> Result<Vec<GuestOrder>>;

    /// Check if the backend is reachable and accepts our credentials
    async fn health_check(&self) -> bool;

    /// Get the base URL (for logging)
    fn base_url(&self) -> &str;
}

/// Client-credentials identity for the HTTP backend
#[derive(Clone)]
pub struct ApiCredentials {
    pub base_url: String,
    pub client_id: String,
    pub client_secret: String,
}

impl std::fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("base_url", &self.base_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .finish()
    }
}

impl ApiCredentials {
    pub fn new(base_url: &str, client_id: &str, client_secret: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
        }
    }

    /// Read credentials from the environment
    ///
    /// Required: `BOXRECON_CLIENT_ID`, `BOXRECON_CLIENT_SECRET`, and either
    /// `BOXRECON_API_URL` or `api.base_url` in config.
    pub fn from_env(config: &ApiConfig) -> Option<Self> {
        let base_url = std::env::var("BOXRECON_API_URL")
            .ok()
            .or_else(|| config.base_url.clone())?;
        let client_id = std::env::var("BOXRECON_CLIENT_ID").ok()?;
        let client_secret = std::env::var("BOXRECON_CLIENT_SECRET").ok()?;
        Some(Self::new(&base_url, &client_id, &client_secret))
    }

    /// Identity used in memoization keys (never includes the secret)
    pub fn identity(&self) -> String {
        format!("{}|{}", self.base_url, self.client_id)
    }
}

/// Concrete catering client enum
///
/// Provides Clone and compile-time dispatch without Box<dyn> overhead.
#[derive(Clone)]
pub enum CateringClient {
    Http(HttpCateringClient),
    Mock(MockCateringClient),
}

impl CateringClient {
    /// Create a client from environment variables
    ///
    /// Returns None if the required environment variables are not set.
    pub fn from_env(config: &ApiConfig) -> Option<Self> {
        let backend = std::env::var("BOXRECON_API_BACKEND").unwrap_or_else(|_| "http".to_string());

        match backend.to_lowercase().as_str() {
            "http" => HttpCateringClient::from_env(config).map(CateringClient::Http),
            "mock" => Some(CateringClient::Mock(MockCateringClient::seeded())),
            _ => {
                warn!(backend = %backend, "Unknown BOXRECON_API_BACKEND, falling back to http");
                HttpCateringClient::from_env(config).map(CateringClient::Http)
            }
        }
    }

    pub fn http(credentials: ApiCredentials, config: &ApiConfig) -> Result<Self> {
        Ok(CateringClient::Http(HttpCateringClient::new(credentials, config)?))
    }

    pub fn mock(mock: MockCateringClient) -> Self {
        CateringClient::Mock(mock)
    }
}

#[async_trait]
impl CateringApi for CateringClient {
    async fn list_events(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<EventSummary>> {
        match self {
            CateringClient::Http(b) => b.list_events(from, to).await,
            CateringClient::Mock(b) => b.list_events(from, to).await,
        }
    }

    async fn event_orders(&self, event_id: &str) -> Result<Vec<GuestOrder>> {
        match self {
            CateringClient::Http(b) => b.event_orders(event_id).await,
            CateringClient::Mock(b) => b.event_orders(event_id).await,
        }
    }

    async fn health_check(&self) -> bool {
        match self {
            CateringClient::Http(b) => b.health_check().await,
            CateringClient::Mock(b) => b.health_check().await,
        }
    }

    fn base_url(&self) -> &str {
        match self {
            CateringClient::Http(b) => b.base_url(),
            CateringClient::Mock(b) => b.base_url(),
        }
    }
}

/// One event whose orders could not be fetched
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchFailure {
    pub event_id: String,
    pub event_name: String,
    /// HTTP status, when the server answered
    pub status: Option<u16>,
    pub message: String,
}

/// Flattened line items plus the events that were omitted
#[derive(Debug, Clone)]
pub struct FetchReport {
    pub table: RawTable,
    pub events: usize,
    pub failures: Vec<FetchFailure>,
}

impl FetchReport {
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Fetch orders for each event in turn and flatten them to one row per item
///
/// Columns follow [`ApiColumns::header`]. A failed event is logged, recorded
/// and skipped.
pub async fn fetch_line_items<A: CateringApi + ?Sized>(
    api: &A,
    events: &[EventSummary],
    columns: &ApiColumns,
) -> FetchReport {
    let mut rows = Vec::new();
    let mut failures = Vec::new();

    for event in events {
        match api.event_orders(&event.id).await {
            Ok(orders) => {
                let before = rows.len();
                for order in &orders {
                    for item in &order.items {
                        rows.push(vec![
                            event.id.clone(),
                            order.location.clone(),
                            event.name.clone(),
                            event.kickoff.clone(),
                            order.guest.clone(),
                            order.order_type.clone(),
                            item.menu_item.clone(),
                            item.quantity.to_string(),
                            item.unit_price.to_string(),
                            order.status.clone(),
                        ]);
                    }
                }
                debug!(
                    event_id = %event.id,
                    orders = orders.len(),
                    lines = rows.len() - before,
                    "Fetched event orders"
                );
            }
            Err(e) => {
                warn!(event_id = %event.id, error = %e, "Failed to fetch event orders, omitting");
                failures.push(FetchFailure {
                    event_id: event.id.clone(),
                    event_name: event.name.clone(),
                    status: e.status(),
                    message: e.to_string(),
                });
            }
        }
    }

    FetchReport {
        table: RawTable::new(columns.header(), rows),
        events: events.len(),
        failures,
    }
}

/// List events in a date range, then fetch their line items
///
/// Failing to list events is an error; failing one event is not.
pub async fn fetch_range<A: CateringApi + ?Sized>(
    api: &A,
    from: NaiveDate,
    to: NaiveDate,
    columns: &ApiColumns,
) -> Result<FetchReport> {
    if from > to {
        return Err(Error::InvalidData(format!(
            "date range is reversed: {} > {}",
            from, to
        )));
    }
    let events = api.list_events(from, to).await?;
    Ok(fetch_line_items(api, &events, columns).await)
}
