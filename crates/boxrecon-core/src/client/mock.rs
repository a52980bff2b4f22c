//! In-memory catering API for tests and offline runs

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::{Error, Result};
use crate::normalize::parse_timestamp;

use super::types::{EventSummary, GuestOrder, OrderItem};
use super::CateringApi;

/// Seeded catering backend with injectable per-event failures
#[derive(Debug, Clone, Default)]
pub struct MockCateringClient {
    events: Vec<EventSummary>,
    orders: HashMap<String, Vec<GuestOrder>>,
    failures: HashMap<String, u16>,
    /// Whether health_check should return true
    pub healthy: bool,
}

impl MockCateringClient {
    /// Empty healthy backend
    pub fn new() -> Self {
        Self {
            healthy: true,
            ..Default::default()
        }
    }

    /// Backend seeded with two boxes at one fixture
    pub fn seeded() -> Self {
        let event = EventSummary {
            id: "EV-1001".to_string(),
            name: "Arsenal v Chelsea".to_string(),
            kickoff: "2024-03-09T15:00:00".to_string(),
        };
        let orders = vec![
            GuestOrder {
                location: "Executive Box 5".to_string(),
                guest: "Jo Bloggs (jo@example.com)".to_string(),
                order_type: "Preorder".to_string(),
                status: "Completed".to_string(),
                items: vec![
                    OrderItem {
                        menu_item: "Champagne".to_string(),
                        quantity: 2.0,
                        unit_price: 45.0,
                    },
                    OrderItem {
                        menu_item: "Sharing Platter".to_string(),
                        quantity: 1.0,
                        unit_price: 30.0,
                    },
                ],
            },
            GuestOrder {
                location: "Box 7".to_string(),
                guest: "Al Smith (al@example.com)".to_string(),
                order_type: "Preorder".to_string(),
                status: "Completed".to_string(),
                items: vec![OrderItem {
                    menu_item: "Beer Bucket".to_string(),
                    quantity: 1.0,
                    unit_price: 45.0,
                }],
            },
        ];
        Self::new().with_event(event, orders)
    }

    pub fn with_event(mut self, event: EventSummary, orders: Vec<GuestOrder>) -> Self {
        self.orders.insert(event.id.clone(), orders);
        self.events.push(event);
        self
    }

    /// Make `event_orders` for this event fail with the given HTTP status
    pub fn with_failure(mut self, event_id: &str, status: u16) -> Self {
        self.failures.insert(event_id.to_string(), status);
        self
    }

    pub fn unhealthy() -> Self {
        Self {
            healthy: false,
            ..Default::default()
        }
    }
}

#[async_trait]
impl CateringApi for MockCateringClient {
    async fn list_events(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<EventSummary>> {
        Ok(self
            .events
            .iter()
            .filter(|e| {
                parse_timestamp(&e.kickoff)
                    .map(|k| k.date() >= from && k.date() <= to)
                    .unwrap_or(false)
            })
            .cloned()
            .collect())
    }

    async fn event_orders(&self, event_id: &str) -> Result<Vec<GuestOrder>> {
        if let Some(status) = self.failures.get(event_id) {
            return Err(Error::Api {
                status: *status,
                message: format!("mock failure for {}", event_id),
            });
        }
        self.orders
            .get(event_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("event {}", event_id)))
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }

    fn base_url(&self) -> &str {
        "mock://catering"
    }
}
