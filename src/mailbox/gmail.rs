//! Gmail REST implementation of the [`Mailbox`] trait.

use async_trait::async_trait;
use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use chrono::Utc;
use serde::Deserialize;
use tracing::debug;

use crate::auth::GoogleSession;
use crate::error::MailboxError;
use crate::mailbox::{Envelope, Mailbox};
use crate::pipeline::types::InboundMessage;

const GMAIL_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1/users/me";

// ── Wire types ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    messages: Vec<MessageRef>,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageResponse {
    id: String,
    #[serde(default)]
    thread_id: String,
    #[serde(default)]
    payload: Payload,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Payload {
    mime_type: String,
    headers: Vec<Header>,
    body: PartBody,
    parts: Vec<Payload>,
}

#[derive(Debug, Deserialize)]
struct Header {
    name: String,
    value: String,
}

#[derive(Debug, Default, Deserialize)]
struct PartBody {
    #[serde(default)]
    data: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DraftResponse {
    id: String,
}

// ── Payload helpers ─────────────────────────────────────────────────

/// Look up a header by name, case-insensitively.
fn header_value<'a>(headers: &'a [Header], name: &str) -> &'a str {
    headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.as_str())
        .unwrap_or("")
}

/// Decode Gmail's URL-safe base64 body data, tolerating absent padding.
fn decode_body(data: &str) -> Option<String> {
    let bytes = URL_SAFE_NO_PAD
        .decode(data.trim_end_matches('='))
        .ok()?;
    Some(String::from_utf8_lossy(&bytes).into_owned())
}

/// Extract the first text/plain body part.
///
/// Multipart messages are scanned in part order; single-part plain-text
/// messages carry the body at the top level. Anything else (HTML-only,
/// attachments) yields an empty body — deliberately no HTML-to-text
/// fallback.
fn extract_plain_text(payload: &Payload) -> String {
    for part in &payload.parts {
        if part.mime_type.starts_with("text/plain") {
            if let Some(text) = part.body.data.as_deref().and_then(decode_body) {
                return text;
            }
        }
    }
    if payload.mime_type.starts_with("text/plain") {
        if let Some(text) = payload.body.data.as_deref().and_then(decode_body) {
            return text;
        }
    }
    String::new()
}

/// Build the RFC 822 text of a reply and encode it the way the drafts
/// endpoint expects.
fn encode_draft_mime(to: &str, subject: &str, body: &str) -> String {
    let mime = format!(
        "To: {to}\r\nSubject: {subject}\r\nContent-Type: text/plain; charset=\"UTF-8\"\r\n\r\n{body}"
    );
    URL_SAFE.encode(mime.as_bytes())
}

// ── Client ──────────────────────────────────────────────────────────

/// Gmail v1 client for the authenticated user's mailbox.
pub struct GmailMailbox {
    http: reqwest::Client,
    session: std::sync::Arc<GoogleSession>,
    base_url: String,
}

impl GmailMailbox {
    pub fn new(http: reqwest::Client, session: std::sync::Arc<GoogleSession>) -> Self {
        Self {
            http,
            session,
            base_url: GMAIL_API_BASE.to_string(),
        }
    }

    async fn token(&self) -> Result<String, MailboxError> {
        self.session.access_token().await.map_err(MailboxError::Auth)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, MailboxError> {
        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(MailboxError::Auth("access token rejected".into()));
        }
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(MailboxError::Api {
                status: status.as_u16(),
                detail,
            });
        }
        Ok(response)
    }

    async fn list_ids(&self, query: &str, limit: Option<u32>) -> Result<Vec<String>, MailboxError> {
        let token = self.token().await?;
        let mut request = self
            .http
            .get(format!("{}/messages", self.base_url))
            .bearer_auth(token)
            .query(&[("q", query)]);
        if let Some(limit) = limit {
            request = request.query(&[("maxResults", limit.to_string())]);
        }

        let response = Self::check(request.send().await?).await?;
        let list: ListResponse = response.json().await?;
        Ok(list.messages.into_iter().map(|m| m.id).collect())
    }

    async fn modify_labels(
        &self,
        id: &str,
        remove: &[&str],
        add: &[&str],
    ) -> Result<(), MailboxError> {
        let token = self.token().await?;
        let response = self
            .http
            .post(format!("{}/messages/{}/modify", self.base_url, id))
            .bearer_auth(token)
            .json(&serde_json::json!({
                "removeLabelIds": remove,
                "addLabelIds": add,
            }))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}

#[async_trait]
impl Mailbox for GmailMailbox {
    async fn list_unread(&self, query: &str, limit: u32) -> Result<Vec<String>, MailboxError> {
        debug!(query, limit, "Listing unread messages");
        self.list_ids(query, Some(limit)).await
    }

    async fn fetch(&self, id: &str) -> Result<InboundMessage, MailboxError> {
        let token = self.token().await?;
        let response = self
            .http
            .get(format!("{}/messages/{}", self.base_url, id))
            .bearer_auth(token)
            .query(&[("format", "full")])
            .send()
            .await?;
        let response = Self::check(response).await?;
        let message: MessageResponse = response.json().await?;

        Ok(InboundMessage {
            sender: header_value(&message.payload.headers, "From").to_string(),
            subject: header_value(&message.payload.headers, "Subject").to_string(),
            body: extract_plain_text(&message.payload),
            thread_id: message.thread_id,
            id: message.id,
        })
    }

    async fn create_draft(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        thread_id: &str,
    ) -> Result<String, MailboxError> {
        let raw = encode_draft_mime(to, subject, body);
        let token = self.token().await?;
        let response = self
            .http
            .post(format!("{}/drafts", self.base_url))
            .bearer_auth(token)
            .json(&serde_json::json!({
                "message": { "raw": raw, "threadId": thread_id },
            }))
            .send()
            .await?;
        let response = Self::check(response).await?;
        let draft: DraftResponse = response.json().await?;
        Ok(draft.id)
    }

    async fn mark_read(&self, id: &str) -> Result<(), MailboxError> {
        self.modify_labels(id, &["UNREAD"], &[]).await
    }

    async fn list_spam(&self, newer_than_days: i64) -> Result<Vec<String>, MailboxError> {
        let since = Utc::now() - chrono::Duration::days(newer_than_days);
        let query = format!("in:spam after:{}", since.format("%Y/%m/%d"));
        self.list_ids(&query, None).await
    }

    async fn envelope(&self, id: &str) -> Result<Envelope, MailboxError> {
        let token = self.token().await?;
        let response = self
            .http
            .get(format!("{}/messages/{}", self.base_url, id))
            .bearer_auth(token)
            .query(&[
                ("format", "metadata"),
                ("metadataHeaders", "To"),
                ("metadataHeaders", "Subject"),
            ])
            .send()
            .await?;
        let response = Self::check(response).await?;
        let message: MessageResponse = response.json().await?;

        Ok(Envelope {
            to: header_value(&message.payload.headers, "To").to_string(),
            subject: header_value(&message.payload.headers, "Subject").to_string(),
        })
    }

    async fn rescue_from_spam(&self, id: &str) -> Result<(), MailboxError> {
        self.modify_labels(id, &["SPAM"], &["IMPORTANT"]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b64(text: &str) -> String {
        URL_SAFE_NO_PAD.encode(text.as_bytes())
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let headers = vec![
            Header {
                name: "subject".into(),
                value: "Hello".into(),
            },
            Header {
                name: "From".into(),
                value: "alice@example.com".into(),
            },
        ];
        assert_eq!(header_value(&headers, "Subject"), "Hello");
        assert_eq!(header_value(&headers, "FROM"), "alice@example.com");
        assert_eq!(header_value(&headers, "To"), "");
    }

    #[test]
    fn extracts_first_plain_text_part() {
        let payload = Payload {
            mime_type: "multipart/alternative".into(),
            parts: vec![
                Payload {
                    mime_type: "text/plain; charset=UTF-8".into(),
                    body: PartBody {
                        data: Some(b64("plain body")),
                    },
                    ..Default::default()
                },
                Payload {
                    mime_type: "text/html".into(),
                    body: PartBody {
                        data: Some(b64("<p>html body</p>")),
                    },
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        assert_eq!(extract_plain_text(&payload), "plain body");
    }

    #[test]
    fn html_only_message_yields_empty_body() {
        let payload = Payload {
            mime_type: "multipart/alternative".into(),
            parts: vec![Payload {
                mime_type: "text/html".into(),
                body: PartBody {
                    data: Some(b64("<p>only html</p>")),
                },
                ..Default::default()
            }],
            ..Default::default()
        };
        assert_eq!(extract_plain_text(&payload), "");
    }

    #[test]
    fn single_part_message_uses_top_level_body() {
        let payload = Payload {
            mime_type: "text/plain".into(),
            body: PartBody {
                data: Some(b64("short note")),
            },
            ..Default::default()
        };
        assert_eq!(extract_plain_text(&payload), "short note");
    }

    #[test]
    fn body_decoding_tolerates_padded_data() {
        // "hi!" encodes to a padded string under standard url-safe base64
        let padded = URL_SAFE.encode("hi!".as_bytes());
        assert!(padded.ends_with('='));
        assert_eq!(decode_body(&padded).as_deref(), Some("hi!"));
    }

    #[test]
    fn draft_mime_is_well_formed() {
        let raw = encode_draft_mime("alice@example.com", "Re: Catching up", "Sounds good.\n\nBest,\nRahul");
        let decoded = String::from_utf8(URL_SAFE.decode(&raw).unwrap()).unwrap();
        assert!(decoded.starts_with("To: alice@example.com\r\n"));
        assert!(decoded.contains("Subject: Re: Catching up\r\n"));
        // Blank line separates headers from body
        assert!(decoded.contains("\r\n\r\nSounds good."));
    }

    #[test]
    fn message_response_tolerates_missing_payload() {
        let raw = r#"{"id": "m1", "threadId": "t1"}"#;
        let message: MessageResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(message.id, "m1");
        assert_eq!(extract_plain_text(&message.payload), "");
    }
}
