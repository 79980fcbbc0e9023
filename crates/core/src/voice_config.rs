//! Voice selection passed into each synthesis call

use serde::{Deserialize, Serialize};

/// Voice/model selector for speech synthesis
///
/// Passed explicitly per call; providers hold no mutable voice state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceConfig {
    /// Provider model id, e.g. `aura-2-thalia-en`
    pub model: String,
}

impl VoiceConfig {
    /// MIME type of synthesized audio
    pub const CONTENT_TYPE: &'static str = "audio/mpeg";

    pub fn new(model: impl Into<String>) -> Self {
        Self { model: model.into() }
    }
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self::new("aura-2-thalia-en")
    }
}
