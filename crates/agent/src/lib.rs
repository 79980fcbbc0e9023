//! Call-flow orchestration for the voice tutor
//!
//! Features:
//! - Stateless, webhook-driven call state machine
//! - Per-turn pipeline: transcription, context, generation, synthesis, history
//! - Spoken fallbacks for every failure path

pub mod call_flow;
pub mod orchestrator;

pub use call_flow::{CallResponse, CallState, CallbackRoutes, Verb};
pub use orchestrator::{
    CallFlowConfig, CallFlowOrchestrator, CallStatusEvent, RecordingEvent, TurnOutcome,
};

use std::time::Duration;

use thiserror::Error;
use voice_tutor_llm::LlmError;
use voice_tutor_pipeline::TtsError;

/// Turn pipeline errors
#[derive(Error, Debug)]
pub enum CallFlowError {
    #[error("Transcription failed: {0}")]
    Transcription(String),

    #[error("Generation failed: {0}")]
    Generation(#[from] LlmError),

    #[error("Synthesis failed: {0}")]
    Synthesis(#[from] TtsError),

    #[error("Turn exceeded {0:?}")]
    TimedOut(Duration),
}

impl CallFlowError {
    /// Metric/log label for the failing stage
    pub fn stage(&self) -> &'static str {
        match self {
            CallFlowError::Transcription(_) => "stt",
            CallFlowError::Generation(_) => "llm",
            CallFlowError::Synthesis(_) => "tts",
            CallFlowError::TimedOut(_) => "timeout",
        }
    }

    /// Synthesis was rate limited
    pub fn is_voice_busy(&self) -> bool {
        matches!(self, CallFlowError::Synthesis(TtsError::RateLimited(_)))
    }
}
