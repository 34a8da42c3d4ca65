//! Batch runner — drives one triage cycle over the unread set.
//!
//! Strictly sequential: each message is fetched, classified, drafted, and
//! marked read to completion before the next is considered. A per-message
//! failure is logged and skipped so the rest of the batch still runs; the
//! failed message stays unread for the next cycle.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::error::Error;
use crate::mailbox::Mailbox;
use crate::pipeline::triage::TriagePipeline;
use crate::pipeline::types::InboundMessage;

/// Counters for one cycle.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// Unread ids returned by the mailbox.
    pub listed: usize,
    /// Messages carried through to mark-read.
    pub processed: usize,
    /// Reply drafts successfully created.
    pub drafted: usize,
    /// Messages skipped due to a fetch or classification failure.
    pub failed: usize,
}

/// Runs the decision pipeline over a batch of unread messages.
pub struct TriageRunner {
    mailbox: Arc<dyn Mailbox>,
    pipeline: TriagePipeline,
}

impl TriageRunner {
    pub fn new(mailbox: Arc<dyn Mailbox>, pipeline: TriagePipeline) -> Self {
        Self { mailbox, pipeline }
    }

    /// Run one full cycle: list, then process each message independently.
    ///
    /// Only the initial listing can fail the cycle as a whole.
    pub async fn run_cycle(&self, query: &str, limit: u32) -> Result<CycleReport, Error> {
        let ids = self.mailbox.list_unread(query, limit).await?;
        let mut report = CycleReport {
            listed: ids.len(),
            ..Default::default()
        };

        if ids.is_empty() {
            info!("No unread messages");
            return Ok(report);
        }
        info!(count = ids.len(), "Processing unread messages");

        for id in &ids {
            match self.process_one(id).await {
                Ok(drafted) => {
                    report.processed += 1;
                    if drafted {
                        report.drafted += 1;
                    }
                }
                Err(e) => {
                    // Left unread for the next cycle
                    error!(id = %id, error = %e, "Failed to process message");
                    report.failed += 1;
                }
            }
        }

        info!(
            processed = report.processed,
            drafted = report.drafted,
            failed = report.failed,
            "Cycle complete"
        );
        Ok(report)
    }

    /// Process a single message to completion. Returns whether a draft was
    /// created.
    async fn process_one(&self, id: &str) -> Result<bool, Error> {
        let message = self.mailbox.fetch(id).await?;
        info!(id = %message.id, subject = %message.subject, "Classifying message");

        let decision = self.pipeline.decide(&message).await?;

        let drafted = if decision.needs_reply {
            self.create_reply_draft(&message, &decision.reply_draft).await
        } else {
            info!(id = %message.id, "No reply needed");
            false
        };

        // Unconditional — a failed draft attempt still retires the message
        // from the unread set.
        self.mailbox.mark_read(id).await?;

        Ok(drafted)
    }

    /// Create the reply draft. Draft failures are captured, not raised, so
    /// the message still completes its cycle.
    async fn create_reply_draft(&self, message: &InboundMessage, draft: &str) -> bool {
        let subject = format!("Re: {}", message.subject);
        match self
            .mailbox
            .create_draft(&message.sender, &subject, draft, &message.thread_id)
            .await
        {
            Ok(draft_id) => {
                info!(id = %message.id, draft_id = %draft_id, "Draft created");
                true
            }
            Err(e) => {
                warn!(id = %message.id, error = %e, "Draft creation failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet, VecDeque};
    use std::sync::Mutex;

    use crate::error::{LlmError, MailboxError};
    use crate::llm::{CompletionRequest, CompletionResponse, LlmProvider};
    use crate::mailbox::Envelope;

    /// In-memory mailbox with scriptable fetch failures.
    struct FakeMailbox {
        messages: HashMap<String, InboundMessage>,
        order: Vec<String>,
        fail_fetch: HashSet<String>,
        fail_draft: bool,
        drafts: Mutex<Vec<(String, String, String)>>,
        marked_read: Mutex<Vec<String>>,
    }

    impl FakeMailbox {
        fn new(messages: Vec<InboundMessage>) -> Self {
            let order = messages.iter().map(|m| m.id.clone()).collect();
            Self {
                messages: messages.into_iter().map(|m| (m.id.clone(), m)).collect(),
                order,
                fail_fetch: HashSet::new(),
                fail_draft: false,
                drafts: Mutex::new(Vec::new()),
                marked_read: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl Mailbox for FakeMailbox {
        async fn list_unread(
            &self,
            _query: &str,
            limit: u32,
        ) -> Result<Vec<String>, MailboxError> {
            Ok(self.order.iter().take(limit as usize).cloned().collect())
        }

        async fn fetch(&self, id: &str) -> Result<InboundMessage, MailboxError> {
            if self.fail_fetch.contains(id) {
                return Err(MailboxError::Api {
                    status: 500,
                    detail: "backend error".into(),
                });
            }
            self.messages
                .get(id)
                .cloned()
                .ok_or_else(|| MailboxError::Api {
                    status: 404,
                    detail: format!("no message {id}"),
                })
        }

        async fn create_draft(
            &self,
            to: &str,
            subject: &str,
            _body: &str,
            thread_id: &str,
        ) -> Result<String, MailboxError> {
            if self.fail_draft {
                return Err(MailboxError::Api {
                    status: 400,
                    detail: "invalid draft".into(),
                });
            }
            self.drafts
                .lock()
                .unwrap()
                .push((to.into(), subject.into(), thread_id.into()));
            Ok(format!("draft-{}", self.drafts.lock().unwrap().len()))
        }

        async fn mark_read(&self, id: &str) -> Result<(), MailboxError> {
            self.marked_read.lock().unwrap().push(id.into());
            Ok(())
        }

        async fn list_spam(&self, _newer_than_days: i64) -> Result<Vec<String>, MailboxError> {
            Ok(Vec::new())
        }

        async fn envelope(&self, _id: &str) -> Result<Envelope, MailboxError> {
            unimplemented!("not used by the runner")
        }

        async fn rescue_from_spam(&self, _id: &str) -> Result<(), MailboxError> {
            unimplemented!("not used by the runner")
        }
    }

    /// LLM replaying one response per classified message.
    struct SequenceLlm {
        responses: Mutex<VecDeque<String>>,
    }

    impl SequenceLlm {
        fn new(responses: Vec<&str>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into_iter().map(String::from).collect()),
            })
        }
    }

    #[async_trait::async_trait]
    impl LlmProvider for SequenceLlm {
        fn model_name(&self) -> &str {
            "sequence"
        }

        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            let content = self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| LlmError::RequestFailed {
                    provider: "sequence".into(),
                    reason: "no response scripted".into(),
                })?;
            Ok(CompletionResponse {
                content: Some(content),
                tool_calls: Vec::new(),
            })
        }
    }

    fn make_message(id: &str, sender: &str, subject: &str) -> InboundMessage {
        InboundMessage {
            id: id.into(),
            sender: sender.into(),
            subject: subject.into(),
            body: "Quick question for you.".into(),
            thread_id: format!("thread-{id}"),
        }
    }

    const NEEDS_REPLY: &str = r#"{"needs_reply": true, "reply_draft": "Sure thing.\n\nBest,\nRahul"}"#;
    const NO_REPLY: &str = r#"{"needs_reply": false, "reply_draft": ""}"#;

    #[tokio::test]
    async fn drafts_reply_and_marks_read() {
        let mailbox = Arc::new(FakeMailbox::new(vec![make_message(
            "m1",
            "alice@example.com",
            "Lunch?",
        )]));
        let llm = SequenceLlm::new(vec![NEEDS_REPLY]);
        let runner = TriageRunner::new(mailbox.clone(), TriagePipeline::new(llm, None));

        let report = runner.run_cycle("is:unread", 5).await.unwrap();
        assert_eq!(
            report,
            CycleReport {
                listed: 1,
                processed: 1,
                drafted: 1,
                failed: 0,
            }
        );

        let drafts = mailbox.drafts.lock().unwrap().clone();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].0, "alice@example.com");
        assert_eq!(drafts[0].1, "Re: Lunch?");
        assert_eq!(drafts[0].2, "thread-m1");
        assert_eq!(*mailbox.marked_read.lock().unwrap(), vec!["m1"]);
    }

    #[tokio::test]
    async fn no_reply_message_is_marked_read_without_draft() {
        let mailbox = Arc::new(FakeMailbox::new(vec![make_message(
            "m1",
            "news@letter.com",
            "Weekly digest",
        )]));
        let llm = SequenceLlm::new(vec![NO_REPLY]);
        let runner = TriageRunner::new(mailbox.clone(), TriagePipeline::new(llm, None));

        let report = runner.run_cycle("is:unread", 5).await.unwrap();
        assert_eq!(report.drafted, 0);
        assert_eq!(report.processed, 1);
        assert!(mailbox.drafts.lock().unwrap().is_empty());
        assert_eq!(*mailbox.marked_read.lock().unwrap(), vec!["m1"]);
    }

    #[tokio::test]
    async fn fetch_failure_is_isolated_to_its_message() {
        let mut mailbox = FakeMailbox::new(vec![
            make_message("m1", "a@x.com", "One"),
            make_message("m2", "b@x.com", "Two"),
            make_message("m3", "c@x.com", "Three"),
        ]);
        mailbox.fail_fetch.insert("m2".into());
        let mailbox = Arc::new(mailbox);

        // Only m1 and m3 reach the LLM
        let llm = SequenceLlm::new(vec![NO_REPLY, NO_REPLY]);
        let runner = TriageRunner::new(mailbox.clone(), TriagePipeline::new(llm, None));

        let report = runner.run_cycle("is:unread", 5).await.unwrap();
        assert_eq!(report.listed, 3);
        assert_eq!(report.processed, 2);
        assert_eq!(report.failed, 1);

        // m2 stays unread for the next cycle
        assert_eq!(*mailbox.marked_read.lock().unwrap(), vec!["m1", "m3"]);
    }

    #[tokio::test]
    async fn classification_failure_leaves_message_unread() {
        let mailbox = Arc::new(FakeMailbox::new(vec![
            make_message("m1", "a@x.com", "One"),
            make_message("m2", "b@x.com", "Two"),
        ]));
        // Script a response for m1 only; m2's LLM call errors
        let llm = SequenceLlm::new(vec![NO_REPLY]);
        let runner = TriageRunner::new(mailbox.clone(), TriagePipeline::new(llm, None));

        let report = runner.run_cycle("is:unread", 5).await.unwrap();
        assert_eq!(report.processed, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(*mailbox.marked_read.lock().unwrap(), vec!["m1"]);
    }

    #[tokio::test]
    async fn draft_failure_is_captured_and_message_still_completes() {
        let mut mailbox = FakeMailbox::new(vec![make_message("m1", "a@x.com", "One")]);
        mailbox.fail_draft = true;
        let mailbox = Arc::new(mailbox);

        let llm = SequenceLlm::new(vec![NEEDS_REPLY]);
        let runner = TriageRunner::new(mailbox.clone(), TriagePipeline::new(llm, None));

        let report = runner.run_cycle("is:unread", 5).await.unwrap();
        assert_eq!(report.processed, 1);
        assert_eq!(report.drafted, 0);
        assert_eq!(report.failed, 0);
        assert_eq!(*mailbox.marked_read.lock().unwrap(), vec!["m1"]);
    }

    #[tokio::test]
    async fn limit_bounds_the_batch() {
        let mailbox = Arc::new(FakeMailbox::new(vec![
            make_message("m1", "a@x.com", "One"),
            make_message("m2", "b@x.com", "Two"),
            make_message("m3", "c@x.com", "Three"),
        ]));
        let llm = SequenceLlm::new(vec![NO_REPLY, NO_REPLY]);
        let runner = TriageRunner::new(mailbox.clone(), TriagePipeline::new(llm, None));

        let report = runner.run_cycle("is:unread", 2).await.unwrap();
        assert_eq!(report.listed, 2);
        assert_eq!(report.processed, 2);
    }
}
