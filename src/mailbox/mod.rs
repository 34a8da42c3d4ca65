//! Mailbox collaborator — listing, fetching, drafting, and label mutation.

pub mod gmail;

pub use gmail::GmailMailbox;

use async_trait::async_trait;

use crate::error::MailboxError;
use crate::pipeline::types::InboundMessage;

/// Addressing headers of a message, fetched without the body.
#[derive(Debug, Clone)]
pub struct Envelope {
    /// Raw To header value.
    pub to: String,
    pub subject: String,
}

/// Trait for the mail provider.
#[async_trait]
pub trait Mailbox: Send + Sync {
    /// List message ids matching a provider-specific query.
    async fn list_unread(&self, query: &str, limit: u32) -> Result<Vec<String>, MailboxError>;

    /// Fetch a full message. The body is the first text/plain part, or empty
    /// if none exists (no HTML-to-text fallback).
    async fn fetch(&self, id: &str) -> Result<InboundMessage, MailboxError>;

    /// Create a reply draft attached to a thread. Returns the draft id.
    async fn create_draft(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        thread_id: &str,
    ) -> Result<String, MailboxError>;

    /// Remove the unread marker.
    async fn mark_read(&self, id: &str) -> Result<(), MailboxError>;

    /// List spam-folder message ids newer than the given number of days.
    async fn list_spam(&self, newer_than_days: i64) -> Result<Vec<String>, MailboxError>;

    /// Fetch just the addressing headers of a message.
    async fn envelope(&self, id: &str) -> Result<Envelope, MailboxError>;

    /// Move a message out of spam and mark it important.
    async fn rescue_from_spam(&self, id: &str) -> Result<(), MailboxError>;
}
