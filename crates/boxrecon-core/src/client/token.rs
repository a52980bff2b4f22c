//! Bearer token ownership for the catering API
//!
//! The token and its expiry live inside the client, behind an async mutex,
//! so concurrent callers share one refresh.

use std::time::{Duration, Instant};

use reqwest::Client;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{Error, Result};

use super::types::TokenResponse;
use super::ApiCredentials;

/// Upper bound on the lifetime we trust from a token response
const MAX_TOKEN_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

fn expiry_from(now: Instant, expires_in: u64) -> Instant {
    let lifetime = Duration::from_secs(expires_in).min(MAX_TOKEN_LIFETIME);
    now.checked_add(lifetime).unwrap_or(now)
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

pub struct TokenManager {
    http_client: Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    refresh_skew: Duration,
    current: Mutex<Option<CachedToken>>,
}

impl TokenManager {
    pub fn new(
        http_client: Client,
        credentials: &ApiCredentials,
        token_path: &str,
        refresh_skew: Duration,
    ) -> Self {
        Self {
            http_client,
            token_url: format!("{}{}", credentials.base_url, token_path),
            client_id: credentials.client_id.clone(),
            client_secret: credentials.client_secret.clone(),
            refresh_skew,
            current: Mutex::new(None),
        }
    }

    /// Return a token that is not within the refresh skew of expiring
    pub async fn valid_token(&self) -> Result<String> {
        let mut current = self.current.lock().await;
        if let Some(token) = current.as_ref() {
            let fresh = Instant::now()
                .checked_add(self.refresh_skew)
                .is_some_and(|deadline| deadline < token.expires_at);
            if fresh {
                return Ok(token.access_token.clone());
            }
        }

        let token = self.request_token().await?;
        let access_token = token.access_token.clone();
        *current = Some(token);
        Ok(access_token)
    }

    /// Drop the cached token so the next call refreshes
    pub async fn invalidate(&self) {
        *self.current.lock().await = None;
    }

    async fn request_token(&self) -> Result<CachedToken> {
        debug!(url = %self.token_url, "Requesting access token");
        let response = self
            .http_client
            .post(&self.token_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Auth(format!("token request returned {}: {}", status, body)));
        }

        let token: TokenResponse = response.json().await?;
        Ok(CachedToken {
            access_token: token.access_token,
            expires_at: expiry_from(Instant::now(), token.expires_in),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_from_caps_lifetime() {
        let now = Instant::now();
        assert_eq!(expiry_from(now, 3600), now + Duration::from_secs(3600));
        assert_eq!(expiry_from(now, u64::MAX), now + MAX_TOKEN_LIFETIME);
        assert_eq!(expiry_from(now, 0), now);
    }
}
