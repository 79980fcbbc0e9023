//! Capability traits for pluggable speech providers

mod speech;

pub use speech::{SpeechToText, TextToSpeech};
