//! Error types for the advisor

use thiserror::Error;

/// Errors that can occur while asking providers for a recommendation
#[derive(Debug, Error, PartialEq, Clone)]
pub enum AdvisorError {
    /// Provider has no credential or model list configured
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    /// Connection-level failure
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Request did not finish within its time budget
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// Credentials rejected by the backend (never includes key details)
    #[error("Authentication rejected with status {0}")]
    AuthRejected(u16),

    /// Backend does not serve the requested model
    #[error("Model not available: {0}")]
    ModelUnavailable(String),

    /// Any other non-success HTTP status
    #[error("HTTP error {status}: {body}")]
    Http {
        /// Status code returned by the backend
        status: u16,
        /// Response body, truncated
        body: String,
    },

    /// Response body could not be decoded
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Stream failed after text already reached the consumer
    #[error("Stream from {model} interrupted after {delivered} chunks: {reason}")]
    StreamInterrupted {
        /// Model that was streaming
        model: String,
        /// Number of chunks delivered before the failure
        delivered: usize,
        /// Underlying failure
        reason: String,
    },

    /// Caller cancelled the request
    #[error("Request cancelled")]
    Cancelled,

    /// Every model of a provider failed at the transport level
    #[error("All models failed for provider {provider}: {}", .failures.join("; "))]
    AllModelsFailed {
        /// Provider identifier
        provider: String,
        /// One message per hard failure, in attempt order
        failures: Vec<String>,
    },

    /// Every provider failed
    #[error("All providers failed: {}", .0.join("; "))]
    AllProvidersFailed(Vec<String>),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl AdvisorError {
    /// Whether this error came from the caller cancelling
    pub fn is_cancelled(&self) -> bool {
        matches!(self, AdvisorError::Cancelled)
    }

    /// Whether the backend rejected the configured credential
    pub fn is_credential_rejection(&self) -> bool {
        matches!(self, AdvisorError::AuthRejected(_))
    }

    /// Whether the orchestrator may move on to the next provider.
    ///
    /// Cancellation is a user decision and an interrupted stream has already
    /// handed text to the consumer, so neither falls through.
    pub fn is_fallback_eligible(&self) -> bool {
        !matches!(
            self,
            AdvisorError::Cancelled | AdvisorError::StreamInterrupted { .. }
        )
    }

    /// Individual failure messages carried by aggregate errors
    pub fn failure_messages(&self) -> Vec<String> {
        match self {
            AdvisorError::AllModelsFailed { failures, .. } => failures.clone(),
            AdvisorError::AllProvidersFailed(messages) => messages.clone(),
            other => vec![other.to_string()],
        }
    }
}

impl From<serde_json::Error> for AdvisorError {
    fn from(err: serde_json::Error) -> Self {
        AdvisorError::InvalidResponse(err.to_string())
    }
}

impl From<reqwest::Error> for AdvisorError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AdvisorError::Timeout(err.to_string())
        } else if err.is_decode() {
            AdvisorError::InvalidResponse(err.to_string())
        } else {
            AdvisorError::NetworkError(err.to_string())
        }
    }
}
