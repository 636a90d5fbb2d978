//! Error types for the feed curator.

use std::time::Duration;

/// Top-level error type for the curator.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Triage error: {0}")]
    Triage(#[from] TriageError),

    #[error("Summary error: {0}")]
    Summary(#[from] SummaryError),

    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),

    #[error("Email error: {0}")]
    Email(#[from] EmailError),

    #[error("Session closed")]
    SessionClosed,
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Feed fetch/parse errors.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("Feed {url} unavailable: {reason}")]
    Unavailable { url: String, reason: String },

    #[error("Feed {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Provider {provider} timed out after {timeout:?}")]
    Timeout {
        provider: String,
        timeout: Duration,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Relevance classification errors.
#[derive(Debug, thiserror::Error)]
pub enum TriageError {
    #[error("Classification unavailable for {scope}: {reason}")]
    Unavailable { scope: String, reason: String },
}

/// Summarization errors.
#[derive(Debug, thiserror::Error)]
pub enum SummaryError {
    #[error("Summarization unavailable for {article}: {reason}")]
    Unavailable { article: String, reason: String },
}

/// Destination publishing errors.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Destination {destination} changed between read and write")]
    Conflict { destination: String },

    #[error("Destination {destination} unavailable: {reason}")]
    Unavailable {
        destination: String,
        reason: String,
    },
}

/// Email delivery errors.
#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("Email to {recipient} failed: {reason}")]
    Unavailable { recipient: String, reason: String },
}

/// Result type alias for the curator.
pub type Result<T> = std::result::Result<T, Error>;
