//! Model transport errors

use std::time::Duration;
use thiserror::Error;

/// A single model call failed
#[derive(Debug, Error)]
pub enum LlmError {
    /// HTTP 429; the retry policy's own schedule decides the wait
    #[error("Rate limited by provider")]
    RateLimited,

    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LlmError {
    /// Transient: an identical request may succeed later
    ///
    /// Rate limits, request timeouts (408), 5xx and transport failures are
    /// transient; other statuses and unreadable bodies are permanent.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::RateLimited | LlmError::Network(_) | LlmError::Timeout(_) => true,
            LlmError::ApiError { status, .. } => *status == 408 || *status >= 500,
            LlmError::InvalidResponse(_) | LlmError::Json(_) => false,
        }
    }
}
