//! Speech-to-Text
//!
//! Prerecorded transcription through Deepgram's listen API.

mod deepgram;

pub use deepgram::{DeepgramStt, DeepgramSttConfig};
