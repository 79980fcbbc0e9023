//! Configuration management for the voice tutor
//!
//! Supports loading configuration from:
//! - YAML/TOML files under `config/`
//! - Environment variables (`VOICE_TUTOR__` prefix, `__` section separator)
//! - Provider key fallbacks (`GROQ_API_KEY`, `DEEPGRAM_API_KEY`)

pub mod constants;
pub mod settings;

pub use settings::{
    load_settings, load_settings_from, HistoryConfig, LlmSettings, ObservabilityConfig,
    PersistenceConfig, RuntimeEnvironment, ServerConfig, Settings, SttSettings, TelephonyConfig,
    TtsSettings,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}
