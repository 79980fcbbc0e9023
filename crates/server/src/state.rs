//! Application State
//!
//! Shared state across all handlers.

use std::sync::Arc;

use voice_tutor_agent::{CallFlowConfig, CallFlowOrchestrator};
use voice_tutor_config::Settings;
use voice_tutor_core::{SpeechToText, TextToSpeech};
use voice_tutor_llm::{AnswerGenerator, LlmBackend, OpenAIBackend, OpenAIConfig};
use voice_tutor_persistence::HistoryStore;
use voice_tutor_pipeline::{
    DeepgramStt, DeepgramSttConfig, DeepgramTts, DeepgramTtsConfig, SpeechSynthesizer,
};

use crate::twiml::SayVoice;
use crate::ServerError;

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub orchestrator: Arc<CallFlowOrchestrator>,
    pub stt: Arc<dyn SpeechToText>,
    pub generator: Arc<AnswerGenerator>,
    pub synthesizer: Arc<SpeechSynthesizer>,
    /// ScyllaDB or in-memory
    pub history: Arc<dyn HistoryStore>,
}

impl AppState {
    /// Wire state from already-built components
    pub fn new(
        config: Settings,
        stt: Arc<dyn SpeechToText>,
        llm: Arc<dyn LlmBackend>,
        tts: Arc<dyn TextToSpeech>,
        history: Arc<dyn HistoryStore>,
    ) -> Self {
        let generator = Arc::new(AnswerGenerator::from_settings(llm, &config));
        let synthesizer = Arc::new(SpeechSynthesizer::from_settings(tts, &config));
        let orchestrator = Arc::new(CallFlowOrchestrator::new(
            stt.clone(),
            generator.clone(),
            synthesizer.clone(),
            history.clone(),
            CallFlowConfig::from_settings(&config),
        ));

        Self {
            config: Arc::new(config),
            orchestrator,
            stt,
            generator,
            synthesizer,
            history,
        }
    }

    /// Build the hosted providers from settings
    pub fn from_settings(config: Settings, history: Arc<dyn HistoryStore>) -> Result<Self, ServerError> {
        let stt = DeepgramStt::new(DeepgramSttConfig::from_settings(&config.stt))
            .map_err(|e| ServerError::Configuration(format!("STT: {}", e)))?;
        let llm = OpenAIBackend::new(OpenAIConfig::from_settings(&config.llm))
            .map_err(|e| ServerError::Configuration(format!("LLM: {}", e)))?;
        let tts = DeepgramTts::new(DeepgramTtsConfig::from_settings(&config.tts))
            .map_err(|e| ServerError::Configuration(format!("TTS: {}", e)))?;

        tracing::info!(
            stt = %config.stt.model,
            llm = %config.llm.model,
            tts = %config.tts.voice_model,
            history = history.backend_name(),
            "Providers initialized"
        );

        Ok(Self::new(
            config,
            Arc::new(stt),
            Arc::new(llm),
            Arc::new(tts),
            history,
        ))
    }

    /// Voice used for TwiML `<Say>`
    pub fn say_voice(&self) -> SayVoice {
        SayVoice {
            voice: self.config.telephony.voice.clone(),
            language: self.config.telephony.locale.clone(),
        }
    }
}
