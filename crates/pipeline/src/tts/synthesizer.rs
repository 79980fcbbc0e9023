//! Speech Synthesizer
//!
//! Validates input before any provider call, writes audio to the public
//! audio directory (or returns it in memory) and sweeps stale files.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use voice_tutor_config::Settings;
use voice_tutor_core::{SynthesizedAudio, TextToSpeech, VoiceConfig};

use super::TtsError;

/// Where synthesized audio goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesisTarget {
    /// Write to `<audio_dir>/<file name>`
    File(String),
    /// Return the bytes
    Buffer,
}

impl SynthesisTarget {
    /// Deterministic file for one turn of a call
    ///
    /// A retried webhook for the same turn rewrites the same file; a new
    /// turn never touches an earlier turn's audio.
    pub fn for_call_turn(call_id: &str, turn_key: &str) -> Self {
        Self::File(format!(
            "{}_{}_response.mp3",
            file_safe(call_id, "anonymous"),
            file_safe(turn_key, "turn")
        ))
    }

    /// Uniquely named file
    pub fn unique_file() -> Self {
        Self::File(format!("{}.mp3", uuid::Uuid::new_v4()))
    }
}

fn file_safe(part: &str, fallback: &str) -> String {
    let safe: String = part
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect();
    if safe.is_empty() {
        fallback.to_string()
    } else {
        safe
    }
}

/// Speech synthesis with validation and asset management
pub struct SpeechSynthesizer {
    provider: Arc<dyn TextToSpeech>,
    voice: VoiceConfig,
    max_chars: usize,
    audio_dir: PathBuf,
    public_base_url: String,
}

impl SpeechSynthesizer {
    pub fn new(
        provider: Arc<dyn TextToSpeech>,
        voice: VoiceConfig,
        audio_dir: impl Into<PathBuf>,
        public_base_url: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            voice,
            max_chars: voice_tutor_config::constants::synthesis::MAX_CHARS,
            audio_dir: audio_dir.into(),
            public_base_url: public_base_url.into(),
        }
    }

    pub fn from_settings(provider: Arc<dyn TextToSpeech>, settings: &Settings) -> Self {
        Self::new(
            provider,
            VoiceConfig::new(settings.tts.voice_model.clone()),
            settings.tts.audio_dir.clone(),
            settings.server.public_base_url.clone(),
        )
        .with_max_chars(settings.tts.max_chars)
    }

    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self
    }

    /// Default voice for calls that don't pick one
    pub fn voice(&self) -> &VoiceConfig {
        &self.voice
    }

    pub fn audio_dir(&self) -> &Path {
        &self.audio_dir
    }

    /// Reject empty or oversize input
    pub fn validate(&self, text: &str) -> Result<(), TtsError> {
        if text.trim().is_empty() {
            return Err(TtsError::EmptyText);
        }
        let len = text.chars().count();
        if len > self.max_chars {
            return Err(TtsError::TextTooLong {
                len,
                max: self.max_chars,
            });
        }
        Ok(())
    }

    /// Synthesize with the default voice
    pub async fn synthesize(
        &self,
        text: &str,
        target: SynthesisTarget,
    ) -> Result<SynthesizedAudio, TtsError> {
        self.synthesize_with_voice(text, target, &self.voice).await
    }

    /// Synthesize with an explicit voice
    pub async fn synthesize_with_voice(
        &self,
        text: &str,
        target: SynthesisTarget,
        voice: &VoiceConfig,
    ) -> Result<SynthesizedAudio, TtsError> {
        self.validate(text)?;

        let start = Instant::now();
        let audio = self.provider.synthesize(text, voice).await?;

        let result = match target {
            SynthesisTarget::Buffer => SynthesizedAudio::Buffer {
                data: audio,
                content_type: VoiceConfig::CONTENT_TYPE.to_string(),
            },
            SynthesisTarget::File(name) => {
                tokio::fs::create_dir_all(&self.audio_dir).await?;
                let path = self.audio_dir.join(&name);
                tokio::fs::write(&path, &audio).await?;
                let url = format!("{}/audio/{}", self.public_base_url.trim_end_matches('/'), name);
                SynthesizedAudio::File { path, url }
            }
        };

        tracing::info!(
            voice = %voice.model,
            chars = text.chars().count(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Speech synthesized"
        );

        Ok(result)
    }

    /// Delete audio files older than `max_age`, returning how many went
    ///
    /// Best effort: unreadable entries and failed deletions are logged and
    /// skipped.
    pub async fn cleanup_older_than(&self, max_age: Duration) -> usize {
        let mut deleted = 0;

        let mut entries = match tokio::fs::read_dir(&self.audio_dir).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(dir = %self.audio_dir.display(), error = %e, "Audio cleanup skipped");
                return 0;
            }
        };

        let now = SystemTime::now();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "Audio cleanup stopped early");
                    break;
                }
            };

            let path = entry.path();
            let modified = match entry.metadata().await.and_then(|m| {
                if m.is_file() {
                    m.modified().map(Some)
                } else {
                    Ok(None)
                }
            }) {
                Ok(Some(modified)) => modified,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Cannot stat audio file");
                    continue;
                }
            };

            let age = now.duration_since(modified).unwrap_or_default();
            if age <= max_age {
                continue;
            }

            match tokio::fs::remove_file(&path).await {
                Ok(()) => deleted += 1,
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "Failed to delete audio file"),
            }
        }

        tracing::info!(deleted, "Cleaned up old audio files");
        deleted
    }
}
