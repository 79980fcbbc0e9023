//! Core traits and types for the voice tutor
//!
//! This crate provides foundational types used across all other crates:
//! - Academic level catalog (7 static instructional profiles)
//! - Caller, Turn and generation-context records
//! - Phone number normalization
//! - Audio source and transcript types
//! - Speech capability traits (STT, TTS)
//! - Error types

pub mod audio;
pub mod caller;
pub mod error;
pub mod level;
pub mod phone;
pub mod traits;
pub mod transcript;
pub mod voice_config;

pub use audio::{AudioSource, SynthesizedAudio};
pub use caller::{Caller, CallerStats, GenerationContext, LevelUsage, Turn};
pub use error::{Error, Result};
pub use level::{AcademicLevel, LevelCategory, DEFAULT_LEVEL};
pub use phone::normalize_phone;
pub use transcript::TranscriptResult;
pub use voice_config::VoiceConfig;

pub use traits::{SpeechToText, TextToSpeech};
