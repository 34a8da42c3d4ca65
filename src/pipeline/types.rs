//! Shared types for the decision pipeline.

use serde::{Deserialize, Serialize};

/// An unread message pulled from the mailbox. Read-only input to the
/// pipeline; never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Provider-native message id.
    pub id: String,
    /// Sender address (possibly with display name, as the provider gives it).
    pub sender: String,
    /// Subject line.
    pub subject: String,
    /// First text/plain body part; empty if the message was HTML-only.
    pub body: String,
    /// Thread the reply draft should attach to.
    pub thread_id: String,
}

/// The sole output contract of the pipeline.
///
/// `reply_draft` is an empty string (never absent) when `needs_reply` is
/// false, and deserialization defaults it so malformed-but-close model
/// output still yields a complete decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyDecision {
    pub needs_reply: bool,
    #[serde(default)]
    pub reply_draft: String,
}

impl ReplyDecision {
    /// Decision for a message that needs no reply.
    pub fn no_reply() -> Self {
        Self {
            needs_reply: false,
            reply_draft: String::new(),
        }
    }
}

/// Result of parsing the model's final content.
///
/// The model is instructed to return a JSON decision object but sometimes
/// returns prose, markdown, or a decision nested inside a string. Parsing
/// never fails outright: `Malformed` collapses into a default decision that
/// keeps the raw text as the draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecisionParse {
    Parsed(ReplyDecision),
    Malformed(String),
}

impl DecisionParse {
    /// Parse raw model content.
    ///
    /// If the first-level parse succeeds but `reply_draft` itself looks like
    /// a JSON object, one nested parse is attempted and wins if it succeeds.
    /// Exactly one level — a decision nested two deep stays a string.
    pub fn from_raw(raw: &str) -> Self {
        let trimmed = raw.trim();
        match serde_json::from_str::<ReplyDecision>(trimmed) {
            Ok(outer) => {
                if outer.reply_draft.trim_start().starts_with('{') {
                    if let Ok(inner) = serde_json::from_str::<ReplyDecision>(&outer.reply_draft) {
                        return Self::Parsed(inner);
                    }
                }
                Self::Parsed(outer)
            }
            Err(_) => Self::Malformed(trimmed.to_string()),
        }
    }

    /// Collapse into the output contract: malformed content defaults to
    /// needs-reply with the raw text as the draft.
    pub fn into_decision(self) -> ReplyDecision {
        match self {
            Self::Parsed(decision) => decision,
            Self::Malformed(raw) => ReplyDecision {
                needs_reply: true,
                reply_draft: raw,
            },
        }
    }
}
