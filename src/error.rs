//! Error types for the inbox triage agent.

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Mailbox error: {0}")]
    Mailbox(#[from] MailboxError),

    #[error("Calendar error: {0}")]
    Calendar(#[from] CalendarError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Mail provider errors.
#[derive(Debug, thiserror::Error)]
pub enum MailboxError {
    #[error("Mailbox request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Mailbox API returned {status}: {detail}")]
    Api { status: u16, detail: String },

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Message {id} has malformed payload: {reason}")]
    MalformedMessage { id: String, reason: String },
}

/// Calendar provider errors.
#[derive(Debug, thiserror::Error)]
pub enum CalendarError {
    #[error("Calendar request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Calendar API returned {status}: {detail}")]
    Api { status: u16, detail: String },

    #[error("Authentication failed: {0}")]
    Auth(String),
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Decision pipeline errors.
///
/// Parse failures and unavailable tools are recovered inside the pipeline
/// and never surface here; only collaborator transport failures do.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Calendar error: {0}")]
    Calendar(#[from] CalendarError),
}

/// Result type alias for the agent.
pub type Result<T> = std::result::Result<T, Error>;
