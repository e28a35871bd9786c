//! Error types for the token source crate.

use std::time::Duration;
use thiserror::Error;

/// Result type alias using the LLM error type.
pub type Result<T> = std::result::Result<T, LlmError>;

// ─────────────────────────────────────────────────────────────────────────────
// Rate Limit Info
// ─────────────────────────────────────────────────────────────────────────────

/// Information about a rate limit error.
#[derive(Debug, Clone)]
pub struct RateLimitInfo {
    /// The error message from the provider.
    pub message: String,
    /// The provider's `Retry-After` hint, kept for logs.
    pub retry_after: Option<Duration>,
}

impl RateLimitInfo {
    /// Parse rate limit info from an OpenAI-style body and `Retry-After` header.
    pub fn parse_openai(message: &str, retry_after_header: Option<&str>) -> Self {
        Self {
            message: message.to_string(),
            retry_after: retry_after_header.and_then(parse_retry_after_header),
        }
    }
}

impl std::fmt::Display for RateLimitInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(retry_after) = self.retry_after {
            write!(f, " (retry after {:.2}s)", retry_after.as_secs_f64())?;
        }
        Ok(())
    }
}

/// Parse a Retry-After header value given in seconds.
fn parse_retry_after_header(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

// ─────────────────────────────────────────────────────────────────────────────
// LLM Error
// ─────────────────────────────────────────────────────────────────────────────

/// Error type for token source operations.
///
/// Only [`LlmError::Config`] ever escapes a [`crate::TokenSource`]; every
/// other variant is recovered by switching to the fallback generator.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Backend/API error from the provider.
    #[error("Backend error: {0}")]
    Backend(String),

    /// Network/connectivity error.
    #[error("Network error: {0}")]
    Network(String),

    /// Configuration error (API key missing, unreadable key file, etc.).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Rate limit exceeded.
    #[error("Rate limit exceeded: {0}")]
    RateLimit(RateLimitInfo),

    /// Authentication failed.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LlmError {
    /// Short machine-readable kind, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Backend(_) => "backend",
            Self::Network(_) => "network",
            Self::Config(_) => "config",
            Self::Serialization(_) => "serialization",
            Self::RateLimit(_) => "rate_limit",
            Self::Auth(_) => "auth",
            Self::Internal(_) => "internal",
        }
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Network(format!("Request timed out: {}", err))
        } else if err.is_connect() {
            LlmError::Network(format!("Connection failed: {}", err))
        } else {
            LlmError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(err: serde_json::Error) -> Self {
        LlmError::Serialization(err.to_string())
    }
}
