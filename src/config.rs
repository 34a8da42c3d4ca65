//! Environment-driven configuration.

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default model for triage classification.
const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Default OpenAI-compatible endpoint.
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Default number of unread messages fetched per cycle.
const DEFAULT_FETCH_LIMIT: u32 = 5;

/// Default recency window for the unread query, in minutes.
const DEFAULT_LOOKBACK_MINS: i64 = 60;

/// Agent configuration, built from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Google OAuth client id.
    pub google_client_id: String,
    /// Google OAuth client secret.
    pub google_client_secret: SecretString,
    /// Google OAuth refresh token (gmail.modify + calendar.events.readonly scopes).
    pub google_refresh_token: SecretString,
    /// API key for the reasoning service.
    pub openai_api_key: SecretString,
    /// Base URL of the OpenAI-compatible endpoint.
    pub openai_base_url: String,
    /// Model used for classification and drafting.
    pub model: String,
    /// Owner's address — spam rescue promotes mail addressed to it.
    pub personal_email: String,
    /// Max unread messages fetched per cycle.
    pub fetch_limit: u32,
    /// Recency window for the unread query, in minutes.
    pub lookback_mins: i64,
    /// Poll interval in seconds. `None` runs a single cycle and exits.
    pub poll_interval_secs: Option<u64>,
    /// Whether the calendar capability is bound to the pipeline.
    pub calendar_enabled: bool,
}

impl Config {
    /// Build config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let google_client_id = require("GOOGLE_CLIENT_ID")?;
        let google_client_secret = SecretString::from(require("GOOGLE_CLIENT_SECRET")?);
        let google_refresh_token = SecretString::from(require("GOOGLE_REFRESH_TOKEN")?);
        let openai_api_key = SecretString::from(require("OPENAI_API_KEY")?);

        let openai_base_url = std::env::var("OPENAI_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_OPENAI_BASE_URL.to_string());

        let model = std::env::var("TRIAGE_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        let personal_email = require("PERSONAL_EMAIL")?;

        let fetch_limit: u32 = std::env::var("TRIAGE_FETCH_LIMIT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_FETCH_LIMIT);

        let lookback_mins: i64 = std::env::var("TRIAGE_LOOKBACK_MINS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_LOOKBACK_MINS);

        let poll_interval_secs: Option<u64> = std::env::var("TRIAGE_POLL_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse().ok());

        let calendar_enabled = std::env::var("TRIAGE_CALENDAR")
            .map(|s| !matches!(s.trim(), "0" | "false" | "off"))
            .unwrap_or(true);

        Ok(Self {
            google_client_id,
            google_client_secret,
            google_refresh_token,
            openai_api_key,
            openai_base_url,
            model,
            personal_email,
            fetch_limit,
            lookback_mins,
            poll_interval_secs,
            calendar_enabled,
        })
    }

    /// Gmail search query for unread messages within the lookback window.
    ///
    /// Bulk categories are excluded at the provider before classification
    /// ever runs. Gmail's `after:` only has day granularity, so the date is
    /// derived from `now - lookback`.
    pub fn unread_query(&self, now: chrono::DateTime<chrono::Utc>) -> String {
        let since = now - chrono::Duration::minutes(self.lookback_mins);
        format!(
            "is:unread after:{} -category:promotions -category:social -category:updates",
            since.format("%Y/%m/%d")
        )
    }
}

fn require(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn unread_query_uses_lookback_date() {
        let config = Config {
            google_client_id: "id".into(),
            google_client_secret: SecretString::from("secret"),
            google_refresh_token: SecretString::from("token"),
            openai_api_key: SecretString::from("key"),
            openai_base_url: DEFAULT_OPENAI_BASE_URL.into(),
            model: DEFAULT_MODEL.into(),
            personal_email: "me@example.com".into(),
            fetch_limit: 5,
            lookback_mins: 60,
            poll_interval_secs: None,
            calendar_enabled: true,
        };

        // 00:30 UTC minus 60 minutes crosses the date boundary
        let now = chrono::Utc.with_ymd_and_hms(2024, 6, 10, 0, 30, 0).unwrap();
        let query = config.unread_query(now);
        assert!(query.starts_with("is:unread after:2024/06/09"));
        assert!(query.contains("-category:promotions"));
        assert!(query.contains("-category:social"));
        assert!(query.contains("-category:updates"));
    }
}
