//! Spam-rescue routine.
//!
//! Scans recent spam for anything addressed directly to the owner and moves
//! it back to the inbox. Providers occasionally misfile personal mail; this
//! runs as a companion pass alongside triage.

use std::sync::Arc;

use tracing::{error, info};

use crate::error::MailboxError;
use crate::mailbox::Mailbox;

/// How far back in the spam folder to look.
const SPAM_LOOKBACK_DAYS: i64 = 30;

/// Counters for one rescue pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RescueReport {
    /// Spam messages examined.
    pub scanned: usize,
    /// Messages moved back to the inbox.
    pub rescued: usize,
    /// Messages whose lookup or rescue failed.
    pub failed: usize,
}

/// Rescues misfiled personal mail out of the spam folder.
pub struct SpamRescue {
    mailbox: Arc<dyn Mailbox>,
    owner_email: String,
}

impl SpamRescue {
    pub fn new(mailbox: Arc<dyn Mailbox>, owner_email: impl Into<String>) -> Self {
        Self {
            mailbox,
            owner_email: owner_email.into(),
        }
    }

    /// Run one pass over recent spam. Only the initial listing can fail the
    /// pass as a whole; per-message failures are logged and skipped.
    pub async fn run(&self) -> Result<RescueReport, MailboxError> {
        let ids = self.mailbox.list_spam(SPAM_LOOKBACK_DAYS).await?;
        let mut report = RescueReport {
            scanned: ids.len(),
            ..Default::default()
        };

        if ids.is_empty() {
            info!("No recent spam to scan");
            return Ok(report);
        }
        info!(count = ids.len(), "Scanning spam for misfiled mail");

        for id in &ids {
            match self.rescue_one(id).await {
                Ok(true) => report.rescued += 1,
                Ok(false) => {}
                Err(e) => {
                    error!(id = %id, error = %e, "Failed to examine spam message");
                    report.failed += 1;
                }
            }
        }

        info!(
            rescued = report.rescued,
            failed = report.failed,
            "Rescue pass complete"
        );
        Ok(report)
    }

    /// Returns whether the message was rescued.
    async fn rescue_one(&self, id: &str) -> Result<bool, MailboxError> {
        let envelope = self.mailbox.envelope(id).await?;
        if !addressed_to(&envelope.to, &self.owner_email) {
            return Ok(false);
        }

        self.mailbox.rescue_from_spam(id).await?;
        info!(id = %id, subject = %envelope.subject, "Rescued message from spam");
        Ok(true)
    }
}

/// Case-insensitive substring match, so display-name forms like
/// `"Rahul <rahul@example.com>"` still count.
fn addressed_to(to_header: &str, owner: &str) -> bool {
    to_header.to_ascii_lowercase().contains(&owner.to_ascii_lowercase())
}
