//! Answer generation for the voice tutor
//!
//! Features:
//! - OpenAI-compatible chat backend (Groq)
//! - Level-aware prompt construction with bounded history
//! - Rate-limit retry with linear backoff, then one context-free fallback
//! - Output cleanup for spoken playback

pub mod backend;
pub mod generator;
pub mod prompt;
pub mod retry;
pub mod voice_text;

pub use backend::{FinishReason, GenerationResult, LlmBackend, OpenAIBackend, OpenAIConfig};
pub use generator::{Answer, AnswerGenerator};
pub use prompt::{truncate_preview, HistoryBounds, Message, PromptBuilder, Role};
pub use retry::{with_retry, AttemptPlan, AttemptStrategy, RetryPolicy};
pub use voice_text::clean_for_voice;

use thiserror::Error;

/// LLM errors
#[derive(Error, Debug)]
pub enum LlmError {
    /// Provider signalled rate limiting (HTTP 429); the only retryable error
    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout")]
    Timeout,

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl LlmError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, LlmError::RateLimited(_))
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Network(err.to_string())
        }
    }
}

impl From<LlmError> for voice_tutor_core::Error {
    fn from(err: LlmError) -> Self {
        voice_tutor_core::Error::Llm(err.to_string())
    }
}
