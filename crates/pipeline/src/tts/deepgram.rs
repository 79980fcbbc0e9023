//! Deepgram Aura speech synthesis

use async_trait::async_trait;
use reqwest::Client;
use std::time::{Duration, Instant};

use voice_tutor_config::TtsSettings;
use voice_tutor_core::{Error as CoreError, Result as CoreResult, TextToSpeech, VoiceConfig};

use super::TtsError;

/// Aura-2 English voices offered to clients
pub const AVAILABLE_VOICES: &[&str] = &[
    "aura-2-thalia-en",
    "aura-2-andromeda-en",
    "aura-2-helena-en",
    "aura-2-apollo-en",
    "aura-2-arcas-en",
    "aura-2-aries-en",
    "aura-2-orpheus-en",
    "aura-2-zeus-en",
];

/// Deepgram TTS configuration
#[derive(Debug, Clone)]
pub struct DeepgramTtsConfig {
    /// API root, e.g. `https://api.deepgram.com/v1`
    pub endpoint: String,
    pub api_key: String,
    pub timeout: Duration,
}

impl DeepgramTtsConfig {
    pub fn from_settings(settings: &TtsSettings) -> Self {
        Self {
            endpoint: settings.endpoint.clone(),
            api_key: settings.api_key.clone(),
            timeout: Duration::from_millis(settings.timeout_ms),
        }
    }
}

impl Default for DeepgramTtsConfig {
    fn default() -> Self {
        Self::from_settings(&TtsSettings::default())
    }
}

/// Synthesis provider backed by Deepgram's speak API
pub struct DeepgramTts {
    config: DeepgramTtsConfig,
    client: Client,
}

impl DeepgramTts {
    pub fn new(config: DeepgramTtsConfig) -> Result<Self, TtsError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| TtsError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    fn speak_url(&self) -> String {
        format!("{}/speak", self.config.endpoint.trim_end_matches('/'))
    }
}

#[async_trait]
impl TextToSpeech for DeepgramTts {
    async fn synthesize(&self, text: &str, voice: &VoiceConfig) -> CoreResult<Vec<u8>> {
        let start = Instant::now();

        let response = self
            .client
            .post(self.speak_url())
            .query(&[("model", voice.model.as_str())])
            .header(reqwest::header::AUTHORIZATION, format!("Token {}", self.config.api_key))
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await
            .map_err(|e| CoreError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), error = %message, "Deepgram TTS error");
            return Err(CoreError::Provider {
                status: status.as_u16(),
                message,
            });
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| CoreError::Network(e.to_string()))?;

        tracing::debug!(
            model = %voice.model,
            bytes = audio.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Deepgram TTS completed"
        );

        Ok(audio.to_vec())
    }

    fn model_name(&self) -> &str {
        "deepgram-aura"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speak_url() {
        let tts = DeepgramTts::new(DeepgramTtsConfig {
            endpoint: "https://api.deepgram.com/v1".to_string(),
            api_key: "key".to_string(),
            timeout: Duration::from_secs(5),
        })
        .unwrap();
        assert_eq!(tts.speak_url(), "https://api.deepgram.com/v1/speak");
    }

    #[test]
    fn test_default_voice_offered() {
        assert!(AVAILABLE_VOICES.contains(&VoiceConfig::default().model.as_str()));
    }
}
