//! Voice Tutor Server
//!
//! Telephony webhooks (TwiML), the web-demo/development JSON API, health
//! and Prometheus metrics.

pub mod api;
pub mod http;
pub mod metrics;
pub mod state;
pub mod telephony;
pub mod twiml;

pub use api::ApiResponse;
pub use http::{create_router, spawn_audio_cleanup};
pub use metrics::{init_metrics, metrics_handler, record_error, record_request};
pub use state::AppState;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use voice_tutor_llm::LlmError;
use voice_tutor_persistence::PersistenceError;
use voice_tutor_pipeline::TtsError;

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Transcription failed: {0}")]
    Transcription(String),

    #[error("Generation failed: {0}")]
    Generation(#[from] LlmError),

    #[error(transparent)]
    Synthesis(#[from] TtsError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ServerError> for StatusCode {
    fn from(err: ServerError) -> Self {
        err.status_code()
    }
}

impl ServerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServerError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::Synthesis(e) => {
                StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            ServerError::Generation(e) if e.is_rate_limited() => StatusCode::TOO_MANY_REQUESTS,
            ServerError::Transcription(_)
            | ServerError::Generation(_)
            | ServerError::Persistence(_)
            | ServerError::Configuration(_)
            | ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl ServerError {
    /// Short label for error metrics
    pub fn kind(&self) -> &'static str {
        match self {
            ServerError::InvalidRequest(_) => "invalid_request",
            ServerError::NotFound(_) => "not_found",
            ServerError::Transcription(_) => "transcription",
            ServerError::Generation(_) => "generation",
            ServerError::Synthesis(_) => "synthesis",
            ServerError::Persistence(_) => "persistence",
            ServerError::Configuration(_) => "configuration",
            ServerError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        crate::metrics::record_error("api", self.kind());
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::warn!(error = %self, "Request rejected");
        }
        (status, Json(ApiResponse::<()>::error(self.to_string()))).into_response()
    }
}
