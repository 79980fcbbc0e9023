//! Transcript types

use serde::{Deserialize, Serialize};

/// Result of transcribing one recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptResult {
    /// Recognized text; empty when no speech was recognized
    #[serde(rename = "transcript")]
    pub text: String,
    /// Confidence score (0.0 - 1.0)
    pub confidence: f32,
    /// Language reported by the provider, or the requested locale
    pub language: String,
}

impl TranscriptResult {
    pub fn new(text: impl Into<String>, confidence: f32, language: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            confidence,
            language: language.into(),
        }
    }

    /// Successful call with no recognized speech
    pub fn empty(language: impl Into<String>) -> Self {
        Self::new(String::new(), 0.0, language)
    }

    /// True when the transcript has no non-whitespace content
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}
