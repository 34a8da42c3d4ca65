//! Google OAuth session — exchanges a refresh token for short-lived access
//! tokens and caches them until expiry.
//!
//! Constructed once at startup and passed by reference into the mailbox and
//! calendar clients; nothing reads ambient credential state.

use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::Config;

const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";

/// Refresh the token this many seconds before it actually expires.
const EXPIRY_SLACK_SECS: i64 = 60;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

struct CachedToken {
    access_token: SecretString,
    expires_at: DateTime<Utc>,
}

/// Shared Google API session.
pub struct GoogleSession {
    http: reqwest::Client,
    client_id: String,
    client_secret: SecretString,
    refresh_token: SecretString,
    token_endpoint: String,
    cached: Mutex<Option<CachedToken>>,
}

impl GoogleSession {
    pub fn new(http: reqwest::Client, config: &Config) -> Self {
        Self {
            http,
            client_id: config.google_client_id.clone(),
            client_secret: config.google_client_secret.clone(),
            refresh_token: config.google_refresh_token.clone(),
            token_endpoint: TOKEN_ENDPOINT.to_string(),
            cached: Mutex::new(None),
        }
    }

    /// Get a valid access token, refreshing it if the cached one has expired.
    ///
    /// Errors are returned as strings so each caller can wrap them in its own
    /// auth error kind.
    pub async fn access_token(&self) -> Result<String, String> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref() {
            if token.expires_at > Utc::now() {
                return Ok(token.access_token.expose_secret().to_string());
            }
        }

        debug!("Refreshing Google access token");
        let response = self
            .http
            .post(&self.token_endpoint)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.expose_secret()),
                ("refresh_token", self.refresh_token.expose_secret()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| format!("token request failed: {e}"))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(format!("token endpoint returned {status}: {detail}"));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| format!("malformed token response: {e}"))?;

        let expires_at =
            Utc::now() + Duration::seconds((token.expires_in - EXPIRY_SLACK_SECS).max(0));
        let access = token.access_token.clone();
        *cached = Some(CachedToken {
            access_token: SecretString::from(token.access_token),
            expires_at,
        });

        Ok(access)
    }
}
