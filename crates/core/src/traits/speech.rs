//! Speech processing traits

use crate::audio::AudioSource;
use crate::transcript::TranscriptResult;
use crate::{Result, VoiceConfig};
use async_trait::async_trait;

/// Speech-to-Text interface
///
/// Implementations:
/// - `DeepgramStt` - hosted prerecorded transcription
///
/// # Example
///
/// ```ignore
/// let stt: Arc<dyn SpeechToText> = Arc::new(DeepgramStt::new(config)?);
/// let transcript = stt.transcribe(&AudioSource::url(recording_url)).await?;
/// println!("Transcribed: {}", transcript.text);
/// ```
#[async_trait]
pub trait SpeechToText: Send + Sync + 'static {
    /// Transcribe a recording
    ///
    /// An empty transcript is a successful result, not an error.
    async fn transcribe(&self, source: &AudioSource) -> Result<TranscriptResult>;

    /// Get model name for logging
    fn model_name(&self) -> &str;
}

/// Text-to-Speech interface
///
/// Implementations:
/// - `DeepgramTts` - hosted Aura voices
#[async_trait]
pub trait TextToSpeech: Send + Sync + 'static {
    /// Synthesize text to encoded audio bytes
    ///
    /// # Arguments
    /// * `text` - Text to speak, already validated by the caller
    /// * `voice` - Voice selection for this call
    async fn synthesize(&self, text: &str, voice: &VoiceConfig) -> Result<Vec<u8>>;

    /// Get model name for logging
    fn model_name(&self) -> &str;
}
