//! Calendar collaborator — a 7-day lookahead over the owner's primary
//! calendar, rendered into the scheduling context handed back to the model.

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Deserialize;

use crate::auth::GoogleSession;
use crate::error::CalendarError;

const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";

/// Time window for a calendar query, always UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl CalendarWindow {
    /// The fixed lookahead used by the pipeline: exactly now to now + 7 days.
    pub fn next_seven_days(now: DateTime<Utc>) -> Self {
        Self {
            start: now,
            end: now + Duration::days(7),
        }
    }
}

/// Start of an event — either a timed `dateTime` or an all-day `date`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTime {
    #[serde(default)]
    pub date_time: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
}

impl EventTime {
    /// Human-readable label: "Mon, Jun 03 02:00 PM". All-day events render
    /// at midnight; unparseable values pass through raw.
    pub fn label(&self) -> String {
        if let Some(ref dt) = self.date_time {
            if let Ok(parsed) = DateTime::parse_from_rfc3339(dt) {
                return parsed.format("%a, %b %d %I:%M %p").to_string();
            }
            return dt.clone();
        }
        if let Some(ref d) = self.date {
            if let Ok(parsed) = NaiveDate::parse_from_str(d, "%Y-%m-%d") {
                if let Some(midnight) = parsed.and_hms_opt(0, 0, 0) {
                    return midnight.format("%a, %b %d %I:%M %p").to_string();
                }
            }
            return d.clone();
        }
        "(no start time)".to_string()
    }
}

/// A calendar event as consumed by the pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct CalendarEvent {
    pub start: EventTime,
    #[serde(default)]
    pub summary: String,
}

/// Render events into the scheduling context string, one line per event,
/// in the order the calendar returned them.
pub fn render_schedule(events: &[CalendarEvent]) -> String {
    let mut out = String::from("My upcoming schedule:\n");
    for event in events {
        out.push_str(&format!("- {}: {}\n", event.start.label(), event.summary));
    }
    out
}

/// Trait for calendar lookups.
#[async_trait]
pub trait Calendar: Send + Sync {
    /// List events within the window, chronologically ascending.
    async fn list_events(&self, window: &CalendarWindow) -> Result<Vec<CalendarEvent>, CalendarError>;
}

// ── Google Calendar implementation ──────────────────────────────────

/// Google Calendar v3 client scoped to the primary calendar.
pub struct GoogleCalendar {
    http: reqwest::Client,
    session: std::sync::Arc<GoogleSession>,
    base_url: String,
}

impl GoogleCalendar {
    pub fn new(http: reqwest::Client, session: std::sync::Arc<GoogleSession>) -> Self {
        Self {
            http,
            session,
            base_url: CALENDAR_API_BASE.to_string(),
        }
    }
}

#[derive(Deserialize)]
struct EventsResponse {
    #[serde(default)]
    items: Vec<CalendarEvent>,
}

#[async_trait]
impl Calendar for GoogleCalendar {
    async fn list_events(&self, window: &CalendarWindow) -> Result<Vec<CalendarEvent>, CalendarError> {
        let token = self
            .session
            .access_token()
            .await
            .map_err(CalendarError::Auth)?;

        let response = self
            .http
            .get(format!("{}/calendars/primary/events", self.base_url))
            .bearer_auth(token)
            .query(&[
                ("timeMin", window.start.to_rfc3339()),
                ("timeMax", window.end.to_rfc3339()),
                ("singleEvents", "true".to_string()),
                ("orderBy", "startTime".to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(CalendarError::Api {
                status: status.as_u16(),
                detail,
            });
        }

        let events: EventsResponse = response.json().await?;
        Ok(events.items)
    }
}
