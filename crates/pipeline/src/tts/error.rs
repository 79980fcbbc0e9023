//! Synthesis error classification

use thiserror::Error;

/// Speech synthesis errors
///
/// Validation failures are raised before any provider call. Provider
/// failures are split by HTTP status so callers can pick a precise apology
/// or a non-telephony fallback.
#[derive(Error, Debug)]
pub enum TtsError {
    #[error("Text is required for speech synthesis")]
    EmptyText,

    #[error("Text too long: {len} characters exceeds the {max} character limit")]
    TextTooLong { len: usize, max: usize },

    #[error("Synthesis authentication failed: {0}")]
    Authentication(String),

    #[error("Invalid synthesis request: {0}")]
    BadRequest(String),

    #[error("Synthesis payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Synthesis rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("Synthesis provider error (HTTP {status}): {message}")]
    Provider { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TtsError {
    /// Classify a non-success provider status
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => TtsError::Authentication(message),
            400 => TtsError::BadRequest(message),
            413 => TtsError::PayloadTooLarge(message),
            429 => TtsError::RateLimited(message),
            _ => TtsError::Provider { status, message },
        }
    }

    /// True for failures detected before contacting the provider
    pub fn is_validation(&self) -> bool {
        matches!(self, TtsError::EmptyText | TtsError::TextTooLong { .. })
    }

    /// HTTP status to report to API clients
    pub fn http_status(&self) -> u16 {
        match self {
            TtsError::EmptyText | TtsError::TextTooLong { .. } => 400,
            TtsError::Authentication(_) => 401,
            TtsError::BadRequest(_) => 422,
            TtsError::PayloadTooLarge(_) => 413,
            TtsError::RateLimited(_) => 429,
            TtsError::Provider { .. } | TtsError::Network(_) => 502,
            TtsError::Io(_) => 500,
        }
    }
}

impl From<voice_tutor_core::Error> for TtsError {
    fn from(err: voice_tutor_core::Error) -> Self {
        match err {
            voice_tutor_core::Error::Provider { status, message } => TtsError::from_status(status, message),
            voice_tutor_core::Error::Network(msg) => TtsError::Network(msg),
            voice_tutor_core::Error::Io(e) => TtsError::Io(e),
            other => TtsError::Provider {
                status: 500,
                message: other.to_string(),
            },
        }
    }
}

impl From<TtsError> for voice_tutor_core::Error {
    fn from(err: TtsError) -> Self {
        match err {
            TtsError::EmptyText | TtsError::TextTooLong { .. } => {
                voice_tutor_core::Error::InvalidInput(err.to_string())
            }
            other => voice_tutor_core::Error::Synthesis(other.to_string()),
        }
    }
}
