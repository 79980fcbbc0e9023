//! Text-to-Speech
//!
//! `DeepgramTts` talks to the provider; `SpeechSynthesizer` validates input,
//! writes or returns audio and classifies failures.

mod deepgram;
mod error;
mod synthesizer;

pub use deepgram::{DeepgramTts, DeepgramTtsConfig, AVAILABLE_VOICES};
pub use error::TtsError;
pub use synthesizer::{SpeechSynthesizer, SynthesisTarget};
