//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::constants::{endpoints, generation, history, models, synthesis, telephony, timeouts};
use crate::ConfigError;

/// Runtime environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    /// Development mode - provider keys optional
    #[default]
    Development,
    Staging,
    /// Production mode - all validations enforced
    Production,
}

impl RuntimeEnvironment {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    /// Check if strict validation should be applied
    pub fn is_strict(&self) -> bool {
        matches!(self, Self::Production | Self::Staging)
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: RuntimeEnvironment,

    #[serde(default)]
    pub server: ServerConfig,

    /// Telephony call-flow configuration
    #[serde(default)]
    pub telephony: TelephonyConfig,

    #[serde(default)]
    pub llm: LlmSettings,

    #[serde(default)]
    pub stt: SttSettings,

    #[serde(default)]
    pub tts: TtsSettings,

    /// Conversation history bounds
    #[serde(default)]
    pub history: HistoryConfig,

    /// Persistence configuration (ScyllaDB)
    #[serde(default)]
    pub persistence: PersistenceConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Externally reachable base URL, used for audio links handed to the
    /// telephony platform
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// CORS allowed origins (empty = permissive in development)
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000)
}
fn default_public_base_url() -> String {
    std::env::var("BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}
fn default_timeout() -> u64 {
    60
}
fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_base_url: default_public_base_url(),
            timeout_seconds: default_timeout(),
            cors_enabled: true,
            cors_origins: Vec::new(),
        }
    }
}

/// Telephony call-flow configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelephonyConfig {
    /// Voice used for spoken prompts
    #[serde(default = "default_voice")]
    pub voice: String,

    #[serde(default = "default_locale")]
    pub locale: String,

    /// Path prefix for webhook routes and redirect targets
    #[serde(default = "default_route_prefix")]
    pub route_prefix: String,

    #[serde(default = "default_level_gather_timeout")]
    pub level_gather_timeout_secs: u32,

    #[serde(default = "default_continue_gather_timeout")]
    pub continue_gather_timeout_secs: u32,

    #[serde(default = "default_max_recording")]
    pub max_recording_secs: u32,

    /// Silence before recording gives up on the caller starting to speak
    #[serde(default = "default_speech_start_timeout")]
    pub speech_start_timeout_secs: u32,

    #[serde(default = "default_true")]
    pub play_beep: bool,

    /// Budget for transcribe + generate + synthesize in one webhook
    #[serde(default = "default_turn_timeout")]
    pub turn_timeout_secs: u64,
}

fn default_voice() -> String {
    telephony::VOICE.to_string()
}
fn default_locale() -> String {
    telephony::LOCALE.to_string()
}
fn default_route_prefix() -> String {
    "/api/twilio".to_string()
}
fn default_level_gather_timeout() -> u32 {
    telephony::LEVEL_GATHER_TIMEOUT_SECS
}
fn default_continue_gather_timeout() -> u32 {
    telephony::CONTINUE_GATHER_TIMEOUT_SECS
}
fn default_max_recording() -> u32 {
    telephony::MAX_RECORDING_SECS
}
fn default_speech_start_timeout() -> u32 {
    telephony::SPEECH_START_TIMEOUT_SECS
}
fn default_turn_timeout() -> u64 {
    timeouts::TURN_SECS
}

impl Default for TelephonyConfig {
    fn default() -> Self {
        Self {
            voice: default_voice(),
            locale: default_locale(),
            route_prefix: default_route_prefix(),
            level_gather_timeout_secs: default_level_gather_timeout(),
            continue_gather_timeout_secs: default_continue_gather_timeout(),
            max_recording_secs: default_max_recording(),
            speech_start_timeout_secs: default_speech_start_timeout(),
            play_beep: true,
            turn_timeout_secs: default_turn_timeout(),
        }
    }
}

/// Generation provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,

    /// Falls back to `GROQ_API_KEY`
    #[serde(default = "default_groq_api_key")]
    pub api_key: String,

    #[serde(default = "default_llm_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_top_p")]
    pub top_p: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    #[serde(default = "default_llm_timeout")]
    pub timeout_ms: u64,

    /// Attempts per strategy when rate limited, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Linear backoff base
    #[serde(default = "default_retry_base_delay")]
    pub retry_base_delay_ms: u64,
}

fn default_llm_endpoint() -> String {
    endpoints::GROQ_DEFAULT.to_string()
}
fn default_groq_api_key() -> String {
    std::env::var("GROQ_API_KEY").unwrap_or_default()
}
fn default_llm_model() -> String {
    std::env::var("GROQ_MODEL").unwrap_or_else(|_| models::LLM_DEFAULT.to_string())
}
fn default_temperature() -> f32 {
    generation::TEMPERATURE
}
fn default_top_p() -> f32 {
    generation::TOP_P
}
fn default_max_tokens() -> usize {
    generation::MAX_TOKENS
}
fn default_llm_timeout() -> u64 {
    timeouts::LLM_REQUEST_MS
}
fn default_max_attempts() -> u32 {
    generation::MAX_ATTEMPTS
}
fn default_retry_base_delay() -> u64 {
    generation::RETRY_BASE_DELAY_MS
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            endpoint: default_llm_endpoint(),
            api_key: default_groq_api_key(),
            model: default_llm_model(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            max_tokens: default_max_tokens(),
            timeout_ms: default_llm_timeout(),
            max_attempts: default_max_attempts(),
            retry_base_delay_ms: default_retry_base_delay(),
        }
    }
}

/// Transcription provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SttSettings {
    #[serde(default = "default_deepgram_endpoint")]
    pub endpoint: String,

    /// Falls back to `DEEPGRAM_API_KEY`
    #[serde(default = "default_deepgram_api_key")]
    pub api_key: String,

    #[serde(default = "default_stt_model")]
    pub model: String,

    /// Regional English variant
    #[serde(default = "default_locale")]
    pub language: String,

    #[serde(default = "default_stt_timeout")]
    pub timeout_ms: u64,
}

fn default_deepgram_endpoint() -> String {
    endpoints::DEEPGRAM_DEFAULT.to_string()
}
fn default_deepgram_api_key() -> String {
    std::env::var("DEEPGRAM_API_KEY").unwrap_or_default()
}
fn default_stt_model() -> String {
    models::STT_DEFAULT.to_string()
}
fn default_stt_timeout() -> u64 {
    timeouts::STT_REQUEST_MS
}

impl Default for SttSettings {
    fn default() -> Self {
        Self {
            endpoint: default_deepgram_endpoint(),
            api_key: default_deepgram_api_key(),
            model: default_stt_model(),
            language: default_locale(),
            timeout_ms: default_stt_timeout(),
        }
    }
}

/// Synthesis provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsSettings {
    #[serde(default = "default_deepgram_endpoint")]
    pub endpoint: String,

    /// Falls back to `DEEPGRAM_API_KEY`
    #[serde(default = "default_deepgram_api_key")]
    pub api_key: String,

    #[serde(default = "default_tts_voice")]
    pub voice_model: String,

    #[serde(default = "default_tts_max_chars")]
    pub max_chars: usize,

    /// Directory synthesized audio is written to and served from
    #[serde(default = "default_audio_dir")]
    pub audio_dir: PathBuf,

    #[serde(default = "default_cleanup_max_age")]
    pub cleanup_max_age_hours: u64,

    /// Background sweep interval; 0 disables the sweep
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_mins: u64,

    #[serde(default = "default_tts_timeout")]
    pub timeout_ms: u64,
}

fn default_tts_voice() -> String {
    models::TTS_VOICE_DEFAULT.to_string()
}
fn default_tts_max_chars() -> usize {
    synthesis::MAX_CHARS
}
fn default_audio_dir() -> PathBuf {
    PathBuf::from("public/audio")
}
fn default_cleanup_max_age() -> u64 {
    synthesis::CLEANUP_MAX_AGE_HOURS
}
fn default_cleanup_interval() -> u64 {
    synthesis::CLEANUP_INTERVAL_MINS
}
fn default_tts_timeout() -> u64 {
    timeouts::TTS_REQUEST_MS
}

impl Default for TtsSettings {
    fn default() -> Self {
        Self {
            endpoint: default_deepgram_endpoint(),
            api_key: default_deepgram_api_key(),
            voice_model: default_tts_voice(),
            max_chars: default_tts_max_chars(),
            audio_dir: default_audio_dir(),
            cleanup_max_age_hours: default_cleanup_max_age(),
            cleanup_interval_mins: default_cleanup_interval(),
            timeout_ms: default_tts_timeout(),
        }
    }
}

/// Conversation history bounds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Turns fetched as generation context
    #[serde(default = "default_context_turns")]
    pub context_turns: usize,

    /// Q/A pairs summarized in the system prompt
    #[serde(default = "default_prompt_pairs")]
    pub prompt_pairs: usize,

    /// Prior answers are truncated to this many characters
    #[serde(default = "default_answer_preview")]
    pub answer_preview_chars: usize,
}

fn default_context_turns() -> usize {
    history::CONTEXT_TURNS
}
fn default_prompt_pairs() -> usize {
    history::PROMPT_PAIRS
}
fn default_answer_preview() -> usize {
    history::ANSWER_PREVIEW_CHARS
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            context_turns: default_context_turns(),
            prompt_pairs: default_prompt_pairs(),
            answer_preview_chars: default_answer_preview(),
        }
    }
}

/// Persistence configuration for ScyllaDB
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Enable ScyllaDB persistence (false = in-memory only)
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_scylla_hosts")]
    pub scylla_hosts: Vec<String>,

    #[serde(default = "default_scylla_keyspace")]
    pub keyspace: String,

    #[serde(default = "default_replication_factor")]
    pub replication_factor: u8,
}

fn default_scylla_hosts() -> Vec<String> {
    std::env::var("SCYLLA_HOSTS")
        .map(|s| s.split(',').map(|h| h.trim().to_string()).collect())
        .unwrap_or_else(|_| vec!["127.0.0.1:9042".to_string()])
}

fn default_scylla_keyspace() -> String {
    std::env::var("SCYLLA_KEYSPACE").unwrap_or_else(|_| "voice_tutor".to_string())
}

fn default_replication_factor() -> u8 {
    1
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            scylla_hosts: default_scylla_hosts(),
            keyspace: default_scylla_keyspace(),
            replication_factor: default_replication_factor(),
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub log_json: bool,

    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
            metrics_enabled: true,
        }
    }
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_server()?;
        self.validate_telephony()?;
        self.validate_llm()?;
        self.validate_tts()?;
        self.validate_history()?;
        self.validate_provider_keys()?;
        Ok(())
    }

    fn validate_server(&self) -> Result<(), ConfigError> {
        let server = &self.server;

        if server.port == 0 {
            return Err(invalid("server.port", "Port cannot be 0"));
        }

        if server.timeout_seconds == 0 {
            return Err(invalid("server.timeout_seconds", "Timeout must be at least 1 second"));
        }

        if !server.public_base_url.starts_with("http://")
            && !server.public_base_url.starts_with("https://")
        {
            return Err(invalid(
                "server.public_base_url",
                format!("Must start with http:// or https://, got {}", server.public_base_url),
            ));
        }

        Ok(())
    }

    fn validate_telephony(&self) -> Result<(), ConfigError> {
        let t = &self.telephony;

        if !t.route_prefix.starts_with('/') {
            return Err(invalid("telephony.route_prefix", "Must start with '/'"));
        }

        if t.max_recording_secs == 0 {
            return Err(invalid("telephony.max_recording_secs", "Must be at least 1"));
        }

        if t.level_gather_timeout_secs == 0 || t.continue_gather_timeout_secs == 0 {
            return Err(invalid("telephony.*_gather_timeout_secs", "Gather timeouts must be at least 1"));
        }

        if t.turn_timeout_secs == 0 {
            return Err(invalid("telephony.turn_timeout_secs", "Must be at least 1"));
        }

        Ok(())
    }

    fn validate_llm(&self) -> Result<(), ConfigError> {
        let llm = &self.llm;

        if llm.max_attempts == 0 {
            return Err(invalid("llm.max_attempts", "Must be at least 1"));
        }

        if !(0.0..=2.0).contains(&llm.temperature) {
            return Err(invalid(
                "llm.temperature",
                format!("Must be between 0.0 and 2.0, got {}", llm.temperature),
            ));
        }

        if !(0.0..=1.0).contains(&llm.top_p) {
            return Err(invalid(
                "llm.top_p",
                format!("Must be between 0.0 and 1.0, got {}", llm.top_p),
            ));
        }

        if llm.max_tokens == 0 {
            return Err(invalid("llm.max_tokens", "Must be at least 1"));
        }

        Ok(())
    }

    fn validate_tts(&self) -> Result<(), ConfigError> {
        if self.tts.max_chars == 0 {
            return Err(invalid("tts.max_chars", "Must be at least 1"));
        }
        if self.tts.voice_model.trim().is_empty() {
            return Err(ConfigError::MissingField("tts.voice_model".to_string()));
        }
        Ok(())
    }

    fn validate_history(&self) -> Result<(), ConfigError> {
        let h = &self.history;
        if h.prompt_pairs > h.context_turns {
            return Err(invalid(
                "history.prompt_pairs",
                format!(
                    "Cannot exceed history.context_turns ({} > {})",
                    h.prompt_pairs, h.context_turns
                ),
            ));
        }
        if h.answer_preview_chars == 0 {
            return Err(invalid("history.answer_preview_chars", "Must be at least 1"));
        }
        Ok(())
    }

    /// Provider keys are only mandatory outside development
    fn validate_provider_keys(&self) -> Result<(), ConfigError> {
        if !self.environment.is_strict() {
            return Ok(());
        }
        if self.llm.api_key.is_empty() {
            return Err(ConfigError::MissingField("llm.api_key".to_string()));
        }
        if self.stt.api_key.is_empty() {
            return Err(ConfigError::MissingField("stt.api_key".to_string()));
        }
        if self.tts.api_key.is_empty() {
            return Err(ConfigError::MissingField("tts.api_key".to_string()));
        }
        Ok(())
    }
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        message: message.into(),
    }
}

/// Load settings from `config/` in the working directory and the environment
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    load_settings_from(Path::new("config"), env)
}

/// Load settings from a config directory
///
/// Priority: env vars > `{dir}/{env}.*` > `{dir}/default.*` > defaults
pub fn load_settings_from(dir: &Path, env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    builder = builder.add_source(File::from(dir.join("default")).required(false));

    if let Some(env_name) = env {
        builder = builder.add_source(File::from(dir.join(env_name)).required(false));
    }

    builder = builder.add_source(
        Environment::with_prefix("VOICE_TUTOR")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert!(!settings.llm.model.is_empty());
        assert_eq!(settings.llm.max_attempts, 3);
        assert_eq!(settings.llm.retry_base_delay_ms, 2000);
        assert_eq!(settings.stt.model, "nova-2");
        assert_eq!(settings.tts.max_chars, 2000);
        assert_eq!(settings.history.context_turns, 5);
        assert_eq!(settings.telephony.max_recording_secs, 60);
        assert!(!settings.persistence.enabled);
    }

    #[test]
    fn test_turn_budget_fits_webhook_window() {
        let settings = Settings::default();
        assert_eq!(settings.telephony.turn_timeout_secs, 12);
        assert!(settings.telephony.turn_timeout_secs < 15);
        assert!(settings.llm.timeout_ms <= settings.telephony.turn_timeout_secs * 1000);

        let mut settings = Settings::default();
        settings.telephony.turn_timeout_secs = 0;
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "telephony.turn_timeout_secs"
        ));
    }

    #[test]
    fn test_default_settings_validate() {
        assert!(Settings::default().validate().is_ok());
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let mut settings = Settings::default();
        settings.llm.max_attempts = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_route_prefix_validation() {
        let mut settings = Settings::default();
        settings.telephony.route_prefix = "api/twilio".to_string();
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "telephony.route_prefix"
        ));
    }

    #[test]
    fn test_base_url_requires_scheme() {
        let mut settings = Settings::default();
        settings.server.public_base_url = "example.com".to_string();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_history_bounds() {
        let mut settings = Settings::default();
        settings.history.prompt_pairs = 6;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_production_requires_keys() {
        let mut settings = Settings::default();
        settings.environment = RuntimeEnvironment::Production;
        settings.llm.api_key.clear();
        assert!(matches!(settings.validate(), Err(ConfigError::MissingField(_))));

        settings.llm.api_key = "gsk".to_string();
        settings.stt.api_key = "dg".to_string();
        settings.tts.api_key = "dg".to_string();
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("default.toml"),
            "[tts]\nmax_chars = 1500\nvoice_model = \"aura-asteria-en\"\n\n[history]\ncontext_turns = 4\n",
        )
        .unwrap();

        let settings = load_settings_from(dir.path(), None).unwrap();
        assert_eq!(settings.tts.max_chars, 1500);
        assert_eq!(settings.tts.voice_model, "aura-asteria-en");
        assert_eq!(settings.history.context_turns, 4);
        assert_eq!(settings.history.prompt_pairs, 3);
    }

    #[test]
    fn test_missing_dir_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_settings_from(&dir.path().join("nope"), Some("staging")).unwrap();
        assert_eq!(settings.tts.max_chars, 2000);
        assert_eq!(settings.environment, RuntimeEnvironment::Development);
    }
}
