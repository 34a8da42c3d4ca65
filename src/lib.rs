//! Inbox triage agent — classifies unread mail with an LLM and drafts replies.

pub mod auth;
pub mod calendar;
pub mod config;
pub mod error;
pub mod llm;
pub mod mailbox;
pub mod pipeline;
pub mod rescue;
