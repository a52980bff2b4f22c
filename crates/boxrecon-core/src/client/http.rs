//! HTTP catering API backend
//!
//! Every request is bounded by the configured timeout. Connect errors,
//! timeouts and 5xx responses are retried up to `max_retries` times; a 401
//! drops the cached token and retries once with a fresh one.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::ApiConfig;
use crate::error::{Error, Result};

use super::token::TokenManager;
use super::types::{EventList, EventSummary, GuestOrder, OrderList};
use super::{ApiCredentials, CateringApi};

const RETRY_DELAY: Duration = Duration::from_millis(250);

/// Join path segments onto the base URL, percent-encoding each one
fn endpoint_url(base_url: &str, segments: &[&str]) -> Result<Url> {
    let mut url = Url::parse(base_url)
        .map_err(|e| Error::Config(format!("Invalid catering API URL {}: {}", base_url, e)))?;
    url.path_segments_mut()
        .map_err(|_| Error::Config(format!("Catering API URL cannot take a path: {}", base_url)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

#[derive(Clone)]
pub struct HttpCateringClient {
    http_client: Client,
    base_url: String,
    max_retries: u32,
    tokens: Arc<TokenManager>,
}

impl HttpCateringClient {
    pub fn new(credentials: ApiCredentials, config: &ApiConfig) -> Result<Self> {
        let http_client = Client::builder().timeout(config.timeout()).build()?;
        let tokens = TokenManager::new(
            http_client.clone(),
            &credentials,
            &config.token_path,
            config.refresh_skew(),
        );

        Ok(Self {
            http_client,
            base_url: credentials.base_url,
            max_retries: config.max_retries,
            tokens: Arc::new(tokens),
        })
    }

    /// Create from environment credentials, or `None` when they are not set
    pub fn from_env(config: &ApiConfig) -> Option<Self> {
        let credentials = ApiCredentials::from_env(config)?;
        match Self::new(credentials, config) {
            Ok(client) => Some(client),
            Err(e) => {
                warn!(error = %e, "Failed to build catering API client");
                None
            }
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = endpoint_url(&self.base_url, segments)?;
        let path = url.path();
        let mut attempt = 0;
        let mut refreshed = false;

        loop {
            match self.get_once(&url, query).await {
                Ok(value) => return Ok(value),
                Err(Error::Api { status: 401, .. }) if !refreshed => {
                    debug!(path, "Token rejected, refreshing");
                    refreshed = true;
                    self.tokens.invalidate().await;
                }
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    warn!(path, attempt, error = %e, "Transient API failure, retrying");
                    tokio::time::sleep(RETRY_DELAY).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn get_once<T: DeserializeOwned>(
        &self,
        url: &Url,
        query: &[(&str, String)],
    ) -> Result<T> {
        let token = self.tokens.valid_token().await?;
        let response = self
            .http_client
            .get(url.clone())
            .bearer_auth(token)
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl CateringApi for HttpCateringClient {
    async fn list_events(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<EventSummary>> {
        let query = [
            ("from", from.format("%Y-%m-%d").to_string()),
            ("to", to.format("%Y-%m-%d").to_string()),
        ];
        let list: EventList = self.get_json(&["events"], &query).await?;
        debug!(events = list.events.len(), "Listed events");
        Ok(list.events)
    }

    async fn event_orders(&self, event_id: &str) -> Result<Vec<GuestOrder>> {
        let list: OrderList = self.get_json(&["events", event_id, "orders"], &[]).await?;
        Ok(list.orders)
    }

    async fn health_check(&self) -> bool {
        self.tokens.valid_token().await.is_ok()
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }
}
