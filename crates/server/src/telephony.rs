//! Telephony webhooks
//!
//! Form-encoded callbacks from the telephony platform. Each handler reads
//! the level from the query string, asks the orchestrator for the next
//! step and answers with TwiML.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::post,
    Form, Router,
};
use serde::Deserialize;

use voice_tutor_agent::{CallStatusEvent, RecordingEvent};
use voice_tutor_core::AcademicLevel;

use crate::state::AppState;
use crate::twiml::{render, Twiml};

/// Fields the platform posts; all optional since each callback sends a subset
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TwilioWebhook {
    pub call_sid: Option<String>,
    pub from: Option<String>,
    pub digits: Option<String>,
    pub recording_sid: Option<String>,
    pub recording_url: Option<String>,
    pub recording_duration: Option<String>,
    pub call_status: Option<String>,
    pub call_duration: Option<String>,
}

impl TwilioWebhook {
    fn from_number(&self) -> &str {
        self.from.as_deref().unwrap_or("unknown")
    }

    fn call_id(&self) -> &str {
        self.call_sid.as_deref().unwrap_or("anonymous")
    }
}

/// Correlation parameters carried in callback URLs
#[derive(Debug, Default, Deserialize)]
pub struct FlowQuery {
    pub level: Option<String>,
    pub reprompt: Option<String>,
}

impl FlowQuery {
    fn level(&self) -> AcademicLevel {
        AcademicLevel::resolve(self.level.as_deref())
    }

    fn reprompted(&self) -> bool {
        self.reprompt.as_deref() == Some("1")
    }
}

/// Webhook routes, to be nested under the telephony prefix
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/voice", post(voice))
        .route("/level-selected", post(level_selected))
        .route("/record", post(record))
        .route("/process", post(process))
        .route("/continue", post(continue_or_end))
        .route("/status", post(status))
}

async fn voice(State(state): State<AppState>) -> Twiml {
    render(&state.orchestrator.voice_entry(), &state.say_voice())
}

async fn level_selected(State(state): State<AppState>, Form(hook): Form<TwilioWebhook>) -> Twiml {
    let response = state
        .orchestrator
        .level_selected(hook.digits.as_deref(), hook.from_number());
    render(&response, &state.say_voice())
}

async fn record(State(state): State<AppState>, Query(query): Query<FlowQuery>) -> Twiml {
    render(&state.orchestrator.record_prompt(query.level()), &state.say_voice())
}

async fn process(
    State(state): State<AppState>,
    Query(query): Query<FlowQuery>,
    Form(hook): Form<TwilioWebhook>,
) -> Twiml {
    let event = RecordingEvent {
        call_id: hook.call_id().to_string(),
        from: hook.from_number().to_string(),
        recording_id: hook.recording_sid.clone(),
        recording_url: hook.recording_url.clone(),
        recording_duration_secs: hook.recording_duration.as_deref().and_then(|d| d.trim().parse().ok()),
        level: query.level(),
    };
    let response = state.orchestrator.record_complete(event).await;
    render(&response, &state.say_voice())
}

async fn continue_or_end(
    State(state): State<AppState>,
    Query(query): Query<FlowQuery>,
    Form(hook): Form<TwilioWebhook>,
) -> Twiml {
    let response = state
        .orchestrator
        .continue_or_end(hook.digits.as_deref(), query.level(), query.reprompted());
    render(&response, &state.say_voice())
}

async fn status(State(state): State<AppState>, Form(hook): Form<TwilioWebhook>) -> StatusCode {
    state.orchestrator.call_status(&CallStatusEvent {
        call_id: hook.call_id().to_string(),
        from: hook.from_number().to_string(),
        status: hook.call_status.clone().unwrap_or_else(|| "unknown".to_string()),
        duration_secs: hook.call_duration.as_deref().and_then(|d| d.trim().parse().ok()),
    });
    StatusCode::OK
}
