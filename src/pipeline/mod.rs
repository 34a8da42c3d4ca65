//! The reply-decision pipeline and its batch runner.

pub mod runner;
pub mod triage;
pub mod types;

pub use runner::{CycleReport, TriageRunner};
pub use triage::TriagePipeline;
pub use types::{InboundMessage, ReplyDecision};
