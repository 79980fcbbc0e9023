//! Deepgram prerecorded transcription
//!
//! Two entry modes share one request path: a fetchable recording URL is
//! sent as a JSON body, raw bytes are sent as-is with their MIME type.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::{Duration, Instant};

use voice_tutor_config::SttSettings;
use voice_tutor_core::{AudioSource, Result as CoreResult, SpeechToText, TranscriptResult};

use crate::PipelineError;

/// Deepgram STT configuration
#[derive(Debug, Clone)]
pub struct DeepgramSttConfig {
    /// API root, e.g. `https://api.deepgram.com/v1`
    pub endpoint: String,
    pub api_key: String,
    /// Recognition model (`nova-2`)
    pub model: String,
    /// Regional English variant (`en-IN`)
    pub language: String,
    pub timeout: Duration,
}

impl DeepgramSttConfig {
    pub fn from_settings(settings: &SttSettings) -> Self {
        Self {
            endpoint: settings.endpoint.clone(),
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
            language: settings.language.clone(),
            timeout: Duration::from_millis(settings.timeout_ms),
        }
    }

    /// Recognition options: accuracy-first, single speaker, nothing redacted
    fn query(&self) -> Vec<(&'static str, String)> {
        vec![
            ("model", self.model.clone()),
            ("language", self.language.clone()),
            ("smart_format", "true".to_string()),
            ("punctuate", "true".to_string()),
            ("diarize", "false".to_string()),
            ("filler_words", "false".to_string()),
            ("profanity_filter", "false".to_string()),
        ]
    }
}

impl Default for DeepgramSttConfig {
    fn default() -> Self {
        Self::from_settings(&SttSettings::default())
    }
}

/// Transcription gateway backed by Deepgram
pub struct DeepgramStt {
    config: DeepgramSttConfig,
    client: Client,
}

impl DeepgramStt {
    pub fn new(config: DeepgramSttConfig) -> Result<Self, PipelineError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PipelineError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        if config.api_key.is_empty() {
            tracing::warn!("Deepgram API key not configured; transcription requests will fail");
        }

        Ok(Self { config, client })
    }

    fn listen_url(&self) -> String {
        format!("{}/listen", self.config.endpoint.trim_end_matches('/'))
    }

    /// Transcribe and keep the precise gateway error
    pub async fn transcribe_source(&self, source: &AudioSource) -> Result<TranscriptResult, PipelineError> {
        let start = Instant::now();
        tracing::info!(source = %source.describe(), "Starting transcription");

        let request = self
            .client
            .post(self.listen_url())
            .query(&self.config.query())
            .header(reqwest::header::AUTHORIZATION, format!("Token {}", self.config.api_key));

        let request = match source {
            AudioSource::Url(url) => request.json(&serde_json::json!({ "url": url })),
            AudioSource::Bytes { data, mime_type } => request
                .header(reqwest::header::CONTENT_TYPE, mime_type.as_str())
                .body(data.clone()),
        };

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::error!(status = status.as_u16(), body = %body, "Deepgram transcription failed");
            return Err(PipelineError::Provider {
                status: status.as_u16(),
                message: body,
            });
        }

        let result = parse_listen_response(&body, &self.config.language)?;

        tracing::info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            confidence = result.confidence,
            chars = result.text.len(),
            "Transcription completed"
        );

        Ok(result)
    }
}

#[async_trait]
impl SpeechToText for DeepgramStt {
    async fn transcribe(&self, source: &AudioSource) -> CoreResult<TranscriptResult> {
        Ok(self.transcribe_source(source).await?)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

/// Extract transcript, confidence and language from a listen response
fn parse_listen_response(body: &str, default_language: &str) -> Result<TranscriptResult, PipelineError> {
    let parsed: ListenResponse =
        serde_json::from_str(body).map_err(|e| PipelineError::MalformedResponse(e.to_string()))?;

    let channel = parsed
        .results
        .channels
        .into_iter()
        .next()
        .ok_or_else(|| PipelineError::MalformedResponse("No channels in response".to_string()))?;

    let language = channel
        .detected_language
        .unwrap_or_else(|| default_language.to_string());

    let alternative = channel
        .alternatives
        .into_iter()
        .next()
        .ok_or_else(|| PipelineError::MalformedResponse("No alternatives in response".to_string()))?;

    Ok(TranscriptResult::new(
        alternative.transcript,
        alternative.confidence,
        language,
    ))
}

#[derive(Debug, Deserialize)]
struct ListenResponse {
    results: ListenResults,
}

#[derive(Debug, Deserialize)]
struct ListenResults {
    channels: Vec<ListenChannel>,
}

#[derive(Debug, Deserialize)]
struct ListenChannel {
    #[serde(default)]
    alternatives: Vec<ListenAlternative>,
    #[serde(default)]
    detected_language: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListenAlternative {
    #[serde(default)]
    transcript: String,
    #[serde(default)]
    confidence: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DeepgramSttConfig::default();
        assert_eq!(config.model, "nova-2");
        assert_eq!(config.language, "en-IN");
    }

    #[test]
    fn test_query_options() {
        let query = DeepgramSttConfig::default().query();
        let get = |k: &str| query.iter().find(|(key, _)| *key == k).map(|(_, v)| v.as_str());
        assert_eq!(get("smart_format"), Some("true"));
        assert_eq!(get("punctuate"), Some("true"));
        assert_eq!(get("diarize"), Some("false"));
        assert_eq!(get("filler_words"), Some("false"));
        assert_eq!(get("profanity_filter"), Some("false"));
    }

    #[test]
    fn test_listen_url() {
        let stt = DeepgramStt::new(DeepgramSttConfig {
            endpoint: "https://api.deepgram.com/v1/".to_string(),
            ..DeepgramSttConfig::default()
        })
        .unwrap();
        assert_eq!(stt.listen_url(), "https://api.deepgram.com/v1/listen");
    }

    #[test]
    fn test_parse_transcript() {
        let body = r#"{"metadata":{},"results":{"channels":[{"alternatives":[
            {"transcript":"What is Newton's second law?","confidence":0.97}
        ],"detected_language":"en"}]}}"#;
        let result = parse_listen_response(body, "en-IN").unwrap();
        assert_eq!(result.text, "What is Newton's second law?");
        assert!((result.confidence - 0.97).abs() < 1e-6);
        assert_eq!(result.language, "en");
    }

    #[test]
    fn test_empty_transcript_is_success() {
        let body = r#"{"results":{"channels":[{"alternatives":[{"transcript":"","confidence":0.0}]}]}}"#;
        let result = parse_listen_response(body, "en-IN").unwrap();
        assert!(result.is_blank());
        assert_eq!(result.language, "en-IN");
    }

    #[test]
    fn test_malformed_response() {
        assert!(matches!(
            parse_listen_response("{}", "en-IN"),
            Err(PipelineError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_listen_response(r#"{"results":{"channels":[]}}"#, "en-IN"),
            Err(PipelineError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_listen_response("not json", "en-IN"),
            Err(PipelineError::MalformedResponse(_))
        ));
    }
}
