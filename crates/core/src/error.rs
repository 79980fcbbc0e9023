//! Error types shared across crates

use thiserror::Error;

/// Result alias using the core error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type
///
/// Component crates keep their own richer error enums and convert into this
/// one at capability-trait boundaries.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Transcription error: {0}")]
    Transcription(String),

    #[error("Synthesis error: {0}")]
    Synthesis(String),

    #[error("LLM error: {0}")]
    Llm(String),

    /// Non-success HTTP status from a hosted provider
    #[error("Provider returned HTTP {status}: {message}")]
    Provider { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
