//! Speech gateways for the voice tutor
//!
//! - `stt` - transcription of recorded audio (URL or bytes)
//! - `tts` - speech synthesis with input validation, error classification
//!   and audio asset cleanup

pub mod stt;
pub mod tts;

pub use stt::{DeepgramStt, DeepgramSttConfig};
pub use tts::{
    DeepgramTts, DeepgramTtsConfig, SpeechSynthesizer, SynthesisTarget, TtsError, AVAILABLE_VOICES,
};

use thiserror::Error;

/// Transcription gateway errors
///
/// An empty transcript is not an error; it is a successful result with
/// blank text.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Transcription provider error (HTTP {status}): {message}")]
    Provider { status: u16, message: String },

    #[error("Malformed transcription response: {0}")]
    MalformedResponse(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<reqwest::Error> for PipelineError {
    fn from(err: reqwest::Error) -> Self {
        PipelineError::Network(err.to_string())
    }
}

impl From<PipelineError> for voice_tutor_core::Error {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Provider { status, message } => {
                voice_tutor_core::Error::Provider { status, message }
            }
            PipelineError::Network(msg) => voice_tutor_core::Error::Network(msg),
            other => voice_tutor_core::Error::Transcription(other.to_string()),
        }
    }
}
