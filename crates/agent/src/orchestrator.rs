//! Call-Flow Orchestrator
//!
//! Turns telephony callbacks into the next instruction. State is rebuilt per
//! callback from the call id, caller number and the `level` URL parameter;
//! nothing is kept in memory between callbacks.
//!
//! The per-turn pipeline runs strictly in order: transcribe, resolve caller,
//! fetch context, generate, synthesize, persist. Missing recordings and
//! empty transcripts loop back to recording; anything else that fails ends
//! the call with an apology.

use std::sync::Arc;
use std::time::{Duration, Instant};

use voice_tutor_config::{Settings, TelephonyConfig};
use voice_tutor_core::{AcademicLevel, AudioSource, Caller, GenerationContext, SpeechToText};
use voice_tutor_llm::AnswerGenerator;
use voice_tutor_persistence::{HistoryStore, NewTurn};
use voice_tutor_pipeline::{SpeechSynthesizer, SynthesisTarget, TtsError};

use crate::call_flow::{CallResponse, CallState, CallbackRoutes, Verb};
use crate::CallFlowError;

mod phrases {
    pub const WELCOME: &str = "Welcome to Guru Call, your AI-powered voice tutor!";
    pub const NO_SELECTION: &str = "No selection made. Defaulting to Class 6 to 10 level.";
    pub const NO_QUESTION_HEARD: &str = "I did not hear a question. Please try again.";
    pub const NO_RECORDING: &str = "Sorry, I could not receive your recording. Please try again.";
    pub const PROCESSING: &str = "Processing your question. Please wait.";
    pub const NOT_UNDERSTOOD: &str =
        "Sorry, I could not understand your question. Please speak clearly and try again.";
    pub const ANSWER_INTRO: &str = "Here is your answer.";
    pub const CONTINUE_PROMPT: &str = "Press 1 to ask another question, or press 2 to end the call.";
    pub const INVALID_CHOICE: &str = "Sorry, that was not a valid choice.";
    pub const NEXT_QUESTION: &str = "Please ask your next question after the beep.";
    pub const GOODBYE: &str = "Thank you for using Guru Call. Goodbye!";
    pub const FAREWELL: &str = "Thank you for using Guru Call. Have a great day learning! Goodbye!";
    pub const GENERIC_APOLOGY: &str =
        "Sorry, an error occurred while processing your question. Please try again later.";
    pub const VOICE_BUSY: &str =
        "Sorry, our voice service is busy right now. Please call again in a few minutes.";
}

/// Knobs for the call flow
#[derive(Debug, Clone)]
pub struct CallFlowConfig {
    pub telephony: TelephonyConfig,
    /// Turns fetched as generation context
    pub context_turns: usize,
    /// Budget for the whole per-turn pipeline; must stay under the
    /// platform's webhook timeout so the caller hears the apology
    pub turn_timeout: Duration,
}

impl CallFlowConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            telephony: settings.telephony.clone(),
            context_turns: settings.history.context_turns,
            turn_timeout: Duration::from_secs(settings.telephony.turn_timeout_secs),
        }
    }

    pub fn with_turn_timeout(mut self, turn_timeout: Duration) -> Self {
        self.turn_timeout = turn_timeout;
        self
    }
}

impl Default for CallFlowConfig {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

/// Recording callback payload
#[derive(Debug, Clone)]
pub struct RecordingEvent {
    pub call_id: String,
    /// Caller's number as sent by the platform
    pub from: String,
    /// Platform id of this recording; distinguishes turns within a call
    pub recording_id: Option<String>,
    pub recording_url: Option<String>,
    pub recording_duration_secs: Option<u32>,
    pub level: AcademicLevel,
}

impl RecordingEvent {
    /// URL of a recording that actually holds audio
    fn usable_recording(&self) -> Option<&str> {
        if self.recording_duration_secs == Some(0) {
            return None;
        }
        self.recording_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    /// Stable per-turn key: the recording id, else the recording URL's
    /// last path segment (the platform puts the id there)
    fn turn_key<'a>(&'a self, recording_url: &'a str) -> &'a str {
        self.recording_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| {
                recording_url
                    .split(['?', '#'])
                    .next()
                    .unwrap_or(recording_url)
                    .trim_end_matches('/')
                    .rsplit('/')
                    .next()
                    .unwrap_or(recording_url)
            })
    }
}

/// Status callback payload
#[derive(Debug, Clone, Default)]
pub struct CallStatusEvent {
    pub call_id: String,
    pub from: String,
    pub status: String,
    pub duration_secs: Option<u32>,
}

/// Result of the per-turn pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    NoRecording,
    EmptyTranscript,
    Answered {
        question: String,
        answer: String,
        audio_url: String,
        elapsed_ms: u64,
        used_fallback: bool,
    },
}

/// Webhook-driven tutoring state machine
pub struct CallFlowOrchestrator {
    stt: Arc<dyn SpeechToText>,
    generator: Arc<AnswerGenerator>,
    synthesizer: Arc<SpeechSynthesizer>,
    store: Arc<dyn HistoryStore>,
    config: CallFlowConfig,
    routes: CallbackRoutes,
}

impl CallFlowOrchestrator {
    pub fn new(
        stt: Arc<dyn SpeechToText>,
        generator: Arc<AnswerGenerator>,
        synthesizer: Arc<SpeechSynthesizer>,
        store: Arc<dyn HistoryStore>,
        config: CallFlowConfig,
    ) -> Self {
        let routes = CallbackRoutes::new(config.telephony.route_prefix.clone());
        Self {
            stt,
            generator,
            synthesizer,
            store,
            config,
            routes,
        }
    }

    pub fn routes(&self) -> &CallbackRoutes {
        &self.routes
    }

    pub fn config(&self) -> &CallFlowConfig {
        &self.config
    }

    /// Entry: welcome, then gather one level digit
    pub fn voice_entry(&self) -> CallResponse {
        tracing::info!("Incoming call received");
        metrics::counter!("voice_tutor_calls_total").increment(1);

        let t = &self.config.telephony;
        CallResponse::new(CallState::LevelSelect)
            .say(phrases::WELCOME)
            .gather(
                1,
                t.level_gather_timeout_secs,
                self.routes.level_selected(),
                vec![Verb::Say(level_menu())],
            )
            // Reached only when the gather times out
            .say(phrases::NO_SELECTION)
            .redirect(self.routes.record(AcademicLevel::default()))
    }

    /// LevelSelect: confirm the category and move to recording
    pub fn level_selected(&self, digits: Option<&str>, from: &str) -> CallResponse {
        let level = AcademicLevel::resolve(digits.map(str::trim));
        tracing::info!(caller = %from, digits = ?digits, level = %level, "Level selected");

        CallResponse::new(CallState::Recording)
            .say(format!(
                "Great! You selected {}. Please ask your question after the beep.",
                level.name()
            ))
            .redirect(self.routes.record(level))
    }

    /// Recording: record the question, looping when nothing is captured
    pub fn record_prompt(&self, level: AcademicLevel) -> CallResponse {
        let t = &self.config.telephony;
        CallResponse::new(CallState::Recording)
            .record(
                t.max_recording_secs,
                t.speech_start_timeout_secs,
                t.play_beep,
                self.routes.process(level),
            )
            .say(phrases::NO_QUESTION_HEARD)
            .redirect(self.routes.record(level))
    }

    /// Processing: run the turn pipeline and build the reply
    ///
    /// Never fails; every error becomes a spoken outcome.
    pub async fn record_complete(&self, event: RecordingEvent) -> CallResponse {
        let level = event.level;
        tracing::info!(
            call_id = %event.call_id,
            caller = %event.from,
            level = %level,
            recording = ?event.recording_url,
            "Processing recording"
        );

        let outcome = match tokio::time::timeout(self.config.turn_timeout, self.run_turn(&event)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(CallFlowError::TimedOut(self.config.turn_timeout)),
        };

        match outcome {
            Ok(TurnOutcome::NoRecording) => {
                metrics::counter!("voice_tutor_call_redirects_total", "reason" => "no_recording").increment(1);
                CallResponse::new(CallState::Recording)
                    .say(phrases::NO_RECORDING)
                    .redirect(self.routes.record(level))
            }
            Ok(TurnOutcome::EmptyTranscript) => {
                metrics::counter!("voice_tutor_call_redirects_total", "reason" => "empty_transcript").increment(1);
                CallResponse::new(CallState::Recording)
                    .say(phrases::PROCESSING)
                    .say(phrases::NOT_UNDERSTOOD)
                    .redirect(self.routes.record(level))
            }
            Ok(TurnOutcome::Answered { audio_url, .. }) => {
                let t = &self.config.telephony;
                CallResponse::new(CallState::Answered)
                    .say(phrases::PROCESSING)
                    .say(phrases::ANSWER_INTRO)
                    .play(audio_url)
                    .gather(
                        1,
                        t.continue_gather_timeout_secs,
                        self.routes.continue_choice(level),
                        vec![Verb::Say(phrases::CONTINUE_PROMPT.to_string())],
                    )
                    // Reached only when the gather times out
                    .say(phrases::GOODBYE)
                    .hangup()
            }
            Err(e) => {
                metrics::counter!("voice_tutor_call_failures_total", "stage" => e.stage()).increment(1);
                tracing::error!(call_id = %event.call_id, stage = e.stage(), error = %e, "Turn failed");

                let apology = if e.is_voice_busy() {
                    phrases::VOICE_BUSY
                } else {
                    phrases::GENERIC_APOLOGY
                };
                CallResponse::new(CallState::Ended)
                    .say(phrases::PROCESSING)
                    .say(apology)
                    .hangup()
            }
        }
    }

    /// The per-turn pipeline
    pub async fn run_turn(&self, event: &RecordingEvent) -> Result<TurnOutcome, CallFlowError> {
        let start = Instant::now();
        let level = event.level;

        let Some(recording_url) = event.usable_recording() else {
            tracing::warn!(call_id = %event.call_id, "No usable recording");
            return Ok(TurnOutcome::NoRecording);
        };

        // 1. Transcribe
        let stage = Instant::now();
        let transcript = self
            .stt
            .transcribe(&AudioSource::url(recording_url))
            .await
            .map_err(|e| CallFlowError::Transcription(e.to_string()))?;
        record_stage("stt", stage);

        if transcript.is_blank() {
            tracing::info!(call_id = %event.call_id, "Empty transcript");
            return Ok(TurnOutcome::EmptyTranscript);
        }
        let question = transcript.text.trim().to_string();
        tracing::info!(call_id = %event.call_id, confidence = transcript.confidence, question = %question, "Transcribed");

        // 2-3. Caller and context; storage trouble only costs personalization
        let caller = match self.store.find_or_create_caller(&event.from).await {
            Ok(caller) => Some(caller),
            Err(e) => {
                tracing::warn!(caller = %event.from, error = %e, "Caller lookup failed, answering without history");
                None
            }
        };
        let context = match &caller {
            Some(caller) => {
                self.store
                    .recent_context(caller.id, self.config.context_turns)
                    .await
            }
            None => GenerationContext::empty(),
        };

        // 4. Generate
        let stage = Instant::now();
        let answer = self.generator.generate(&question, level, Some(&context)).await?;
        record_stage("llm", stage);
        if answer.attempts > 1 {
            metrics::counter!("voice_tutor_generation_retries_total").increment(u64::from(answer.attempts - 1));
        }
        if answer.used_fallback {
            metrics::counter!("voice_tutor_generation_fallbacks_total").increment(1);
        }

        // 5. Synthesize under a name derived from the call turn
        let stage = Instant::now();
        let target = SynthesisTarget::for_call_turn(&event.call_id, event.turn_key(recording_url));
        let audio = self.synthesizer.synthesize(&answer.text, target).await?;
        record_stage("tts", stage);
        let audio_url = audio
            .url()
            .map(str::to_string)
            .ok_or_else(|| CallFlowError::Synthesis(TtsError::Network("Synthesized audio has no URL".to_string())))?;

        // 6. Persist
        let elapsed_ms = start.elapsed().as_millis() as u64;
        if let Some(caller) = &caller {
            self.persist_turn(caller, level, &question, &answer.text, &audio_url, elapsed_ms)
                .await;
        }

        record_stage("total", start);
        metrics::counter!("voice_tutor_turns_completed_total", "level" => level.code()).increment(1);
        tracing::info!(
            call_id = %event.call_id,
            level = %level,
            elapsed_ms,
            used_fallback = answer.used_fallback,
            "Turn completed"
        );

        Ok(TurnOutcome::Answered {
            question,
            answer: answer.text,
            audio_url,
            elapsed_ms,
            used_fallback: answer.used_fallback,
        })
    }

    /// Store the turn and the caller's level; failures are only logged
    async fn persist_turn(
        &self,
        caller: &Caller,
        level: AcademicLevel,
        question: &str,
        answer: &str,
        audio_url: &str,
        elapsed_ms: u64,
    ) {
        let turn = NewTurn {
            caller_id: caller.id,
            phone_number: caller.phone_number.clone(),
            level,
            question: question.to_string(),
            answer: answer.to_string(),
            audio_url: Some(audio_url.to_string()),
            response_time_ms: elapsed_ms,
        };

        if let Err(e) = self.store.record_turn(turn).await {
            metrics::counter!("voice_tutor_persistence_failures_total").increment(1);
            tracing::error!(caller_id = %caller.id, error = %e, "Failed to record turn");
        }
        if let Err(e) = self.store.update_preferred_level(caller.id, level).await {
            tracing::warn!(caller_id = %caller.id, error = %e, "Failed to update preferred level");
        }
    }

    /// ContinueLoop: `1` records again, `2` or no input ends the call
    ///
    /// Any other digit re-prompts once; a second invalid digit ends the call.
    pub fn continue_or_end(&self, digits: Option<&str>, level: AcademicLevel, reprompted: bool) -> CallResponse {
        let digits = digits.map(str::trim).filter(|d| !d.is_empty());
        tracing::info!(digits = ?digits, level = %level, reprompted, "Continue choice");

        match digits {
            Some("1") => CallResponse::new(CallState::Recording)
                .say(phrases::NEXT_QUESTION)
                .redirect(self.routes.record(level)),
            Some("2") | None => farewell(),
            Some(_) if !reprompted => {
                let t = &self.config.telephony;
                CallResponse::new(CallState::ContinueLoop)
                    .say(phrases::INVALID_CHOICE)
                    .gather(
                        1,
                        t.continue_gather_timeout_secs,
                        self.routes.continue_retry(level),
                        vec![Verb::Say(phrases::CONTINUE_PROMPT.to_string())],
                    )
                    .say(phrases::GOODBYE)
                    .hangup()
            }
            Some(_) => farewell(),
        }
    }

    /// Status callback: observability only
    pub fn call_status(&self, event: &CallStatusEvent) {
        metrics::counter!("voice_tutor_call_status_total", "status" => event.status.clone()).increment(1);
        tracing::info!(
            call_id = %event.call_id,
            caller = %event.from,
            status = %event.status,
            duration_secs = ?event.duration_secs,
            "Call status"
        );
    }
}

fn farewell() -> CallResponse {
    CallResponse::new(CallState::Ended)
        .say(phrases::FAREWELL)
        .hangup()
}

fn level_menu() -> String {
    let options: Vec<String> = AcademicLevel::ALL
        .iter()
        .map(|level| format!("Press {} for {}.", level.digit(), level.name()))
        .collect();
    format!("Please select your education level. {}", options.join(" "))
}

fn record_stage(stage: &'static str, started: Instant) {
    metrics::histogram!("voice_tutor_stage_latency_ms", "stage" => stage)
        .record(started.elapsed().as_secs_f64() * 1000.0);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_menu_lists_all_levels() {
        let menu = level_menu();
        for level in AcademicLevel::ALL {
            assert!(menu.contains(&format!("Press {} for {}.", level.digit(), level.name())));
        }
    }

    #[test]
    fn test_zero_length_recording_is_unusable() {
        let mut event = RecordingEvent {
            call_id: "CA1".into(),
            from: "+1".into(),
            recording_id: None,
            recording_url: Some("https://api.twilio.com/rec/1".into()),
            recording_duration_secs: Some(0),
            level: AcademicLevel::default(),
        };
        assert!(event.usable_recording().is_none());

        event.recording_duration_secs = Some(4);
        assert_eq!(event.usable_recording(), Some("https://api.twilio.com/rec/1"));

        event.recording_url = Some("  ".into());
        assert!(event.usable_recording().is_none());
    }

    #[test]
    fn test_turn_key_prefers_recording_id() {
        let url = "https://api.twilio.com/2010-04-01/Accounts/AC1/Recordings/RE42";
        let mut event = RecordingEvent {
            call_id: "CA1".into(),
            from: "+1".into(),
            recording_id: Some("RE7".into()),
            recording_url: Some(url.into()),
            recording_duration_secs: Some(3),
            level: AcademicLevel::default(),
        };
        assert_eq!(event.turn_key(url), "RE7");

        event.recording_id = None;
        assert_eq!(event.turn_key(url), "RE42");
        assert_eq!(event.turn_key("https://api.twilio.com/Recordings/RE43/?x=1"), "RE43");
    }
}
