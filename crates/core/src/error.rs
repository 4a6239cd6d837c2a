//! Error types for the studyforge domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant. Collaborators raise
//! typed errors; the agent's classifier matches over their rendered
//! messages, so Display texts here are part of the recovery contract.

use thiserror::Error;

/// The top-level error type for all studyforge operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Language model errors ---
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    // --- Search / scrape errors ---
    #[error("Research error: {0}")]
    Research(#[from] ResearchError),

    // --- Content artifact errors ---
    #[error("Content error: {0}")]
    Content(#[from] ContentError),

    // --- Caller-contract violations (never retried, never classified) ---
    #[error("Invalid action: {0}")]
    InvalidAction(String),

    // --- Cooperative cancellation ---
    #[error("Run aborted by cancellation signal")]
    Aborted,

    // --- Structured mode ran out of steps with nothing to show ---
    #[error("No content generated: the run ended before any artifact was produced")]
    NoContentGenerated,

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ModelError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by model provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Model returned malformed output: {0}")]
    MalformedOutput(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),
}

#[derive(Debug, Clone, Error)]
pub enum ResearchError {
    #[error("Search request failed: {reason}")]
    SearchFailed { reason: String },

    #[error("Search provider not configured: {0}")]
    NotConfigured(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, Error)]
pub enum ContentError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Content type not determined yet")]
    TypeNotDetermined,

    #[error("Nothing to refine: no artifact has been generated")]
    NothingToRefine,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_error_displays_correctly() {
        let err = Error::Model(ModelError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn rate_limit_message_carries_marker() {
        // The classifier keys on this substring.
        let err = ModelError::RateLimited {
            retry_after_secs: 5,
        };
        assert!(err.to_string().to_lowercase().contains("rate limited"));
    }

    #[test]
    fn validation_error_has_stable_prefix() {
        let err = ContentError::Validation("quiz has no questions".into());
        assert!(err.to_string().starts_with("Validation failed:"));
    }

    #[test]
    fn aborted_mentions_abort() {
        assert!(Error::Aborted.to_string().to_lowercase().contains("abort"));
    }
}
