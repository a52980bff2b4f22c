//! Catering API payloads

use serde::{Deserialize, Serialize};

/// An event returned by `GET /events`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSummary {
    pub id: String,
    pub name: String,
    /// Kickoff as sent by the API (ISO 8601)
    pub kickoff: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventList {
    #[serde(default)]
    pub events: Vec<EventSummary>,
}

/// One menu/enhancement line on a guest order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub menu_item: String,
    #[serde(default)]
    pub quantity: f64,
    #[serde(default)]
    pub unit_price: f64,
}

/// A guest order for one event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuestOrder {
    pub location: String,
    /// Packed "Name (email)" as the API returns it
    pub guest: String,
    #[serde(default)]
    pub order_type: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderList {
    #[serde(default)]
    pub orders: Vec<GuestOrder>,
}

/// Client-credentials token response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Lifetime in seconds
    #[serde(default = "default_expires_in")]
    pub expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}
