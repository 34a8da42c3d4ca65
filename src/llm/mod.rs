//! LLM integration.
//!
//! The provider speaks an OpenAI-compatible chat-completions protocol; the
//! pipeline drives tool calls explicitly, one round-trip at a time.

pub mod provider;

pub use provider::{
    ChatMessage, CompletionRequest, CompletionResponse, FunctionCall, LlmProvider, OpenAiProvider,
    ToolCall, ToolDefinition,
};

use std::sync::Arc;

use crate::config::Config;

/// Create the LLM provider from configuration.
pub fn create_provider(http: reqwest::Client, config: &Config) -> Arc<dyn LlmProvider> {
    tracing::info!("Using OpenAI-compatible provider (model: {})", config.model);
    Arc::new(OpenAiProvider::new(
        http,
        config.openai_base_url.clone(),
        config.openai_api_key.clone(),
        config.model.clone(),
    ))
}
