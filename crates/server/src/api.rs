//! JSON API
//!
//! Catalog, history and statistics lookups, development endpoints and the
//! web-demo path (transcribe bytes, generate with client-held history,
//! synthesize to a buffer).

use std::time::{Duration, Instant};

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};

use voice_tutor_core::{
    normalize_phone, AcademicLevel, AudioSource, GenerationContext, LevelCategory,
    SynthesizedAudio, Turn, VoiceConfig, DEFAULT_LEVEL,
};
use voice_tutor_persistence::NewTurn;
use voice_tutor_pipeline::{SynthesisTarget, AVAILABLE_VOICES};

use crate::state::AppState;
use crate::ServerError;

/// Envelope for every JSON API response
///
/// `data` is flattened so payload fields sit next to `success`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(flatten)]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            message: None,
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ServerError>;

/// GET /health
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "healthy",
            "service": "voice-tutor",
            "version": env!("CARGO_PKG_VERSION"),
            "persistence": state.history.backend_name(),
            "model": state.generator.model_name(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })),
    )
}

#[derive(Debug, Serialize)]
pub struct CategoriesData {
    pub categories: &'static [LevelCategory],
}

/// GET /api/categories
pub async fn categories() -> Json<ApiResponse<CategoriesData>> {
    Json(ApiResponse::ok(CategoriesData {
        categories: AcademicLevel::catalog(),
    }))
}

#[derive(Debug, Serialize)]
pub struct VoicesData {
    pub voices: &'static [&'static str],
    pub default: String,
}

/// GET /api/voices
pub async fn voices(State(state): State<AppState>) -> Json<ApiResponse<VoicesData>> {
    Json(ApiResponse::ok(VoicesData {
        voices: AVAILABLE_VOICES,
        default: state.synthesizer.voice().model.clone(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct TestAiRequest {
    #[serde(default)]
    pub question: String,
    pub level: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestAiData {
    pub question: String,
    pub level: AcademicLevel,
    pub answer: String,
    pub tokens_used: usize,
    /// Milliseconds
    pub response_time: u64,
}

/// POST /api/test-ai
pub async fn test_ai(
    State(state): State<AppState>,
    Json(request): Json<TestAiRequest>,
) -> ApiResult<TestAiData> {
    let question = require_text(&request.question, "Question")?;
    let level = AcademicLevel::resolve(request.level.as_deref());
    let start = Instant::now();
    let answer = state.generator.generate(question, level, None).await?;

    Ok(Json(ApiResponse::ok(TestAiData {
        question: question.to_string(),
        level,
        answer: answer.text,
        tokens_used: answer.tokens_used,
        response_time: start.elapsed().as_millis() as u64,
    })))
}

#[derive(Debug, Deserialize)]
pub struct TestTtsRequest {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestTtsData {
    pub audio_url: String,
    pub audio_path: String,
}

/// POST /api/test-tts
pub async fn test_tts(
    State(state): State<AppState>,
    Json(request): Json<TestTtsRequest>,
) -> ApiResult<TestTtsData> {
    let audio = state
        .synthesizer
        .synthesize(&request.text, SynthesisTarget::unique_file())
        .await?;

    match audio {
        SynthesizedAudio::File { path, url } => Ok(Json(ApiResponse::ok(TestTtsData {
            audio_url: url,
            audio_path: path.display().to_string(),
        }))),
        SynthesizedAudio::Buffer { .. } => Err(ServerError::Internal(
            "Synthesizer returned a buffer for a file target".to_string(),
        )),
    }
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryData {
    pub phone_number: String,
    pub count: usize,
    pub history: Vec<Turn>,
}

/// GET /api/history/:phone
pub async fn history(
    State(state): State<AppState>,
    Path(phone): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<HistoryData> {
    let limit = query.limit.unwrap_or(10);
    let turns = state.history.recent_turns_by_phone(&phone, limit).await?;

    Ok(Json(ApiResponse::ok(HistoryData {
        phone_number: normalize_phone(&phone),
        count: turns.len(),
        history: turns,
    })))
}

/// GET /api/stats/:phone
pub async fn stats(
    State(state): State<AppState>,
    Path(phone): Path<String>,
) -> ApiResult<voice_tutor_core::CallerStats> {
    match state.history.caller_stats(&phone).await? {
        Some(stats) => Ok(Json(ApiResponse::ok(stats))),
        None => Err(ServerError::NotFound(format!(
            "No caller with phone number {}",
            normalize_phone(&phone)
        ))),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupRequest {
    pub max_age_hours: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupData {
    pub deleted_files: usize,
}

/// POST /api/cleanup
pub async fn cleanup(
    State(state): State<AppState>,
    body: Option<Json<CleanupRequest>>,
) -> ApiResult<CleanupData> {
    let hours = body
        .and_then(|Json(request)| request.max_age_hours)
        .unwrap_or(state.config.tts.cleanup_max_age_hours);
    let deleted_files = state
        .synthesizer
        .cleanup_older_than(Duration::from_secs(hours * 3600))
        .await;

    Ok(Json(
        ApiResponse::ok(CleanupData { deleted_files })
            .with_message(format!("Cleaned up {} audio files", deleted_files)),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscribeRequest {
    #[serde(default)]
    pub audio: String,
    pub mime_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TranscribeData {
    pub transcription: String,
}

/// POST /api/stt/transcribe
pub async fn transcribe(
    State(state): State<AppState>,
    Json(request): Json<TranscribeRequest>,
) -> ApiResult<TranscribeData> {
    let encoded = require_text(&request.audio, "Audio data")?;
    let data = BASE64
        .decode(encoded)
        .map_err(|e| ServerError::InvalidRequest(format!("Audio is not valid base64: {}", e)))?;
    if data.is_empty() {
        return Err(ServerError::InvalidRequest("Audio data is required".to_string()));
    }

    let mime_type = request.mime_type.unwrap_or_else(|| "audio/wav".to_string());
    let source = AudioSource::bytes(data, mime_type);
    let transcript = state
        .stt
        .transcribe(&source)
        .await
        .map_err(|e| ServerError::Transcription(e.to_string()))?;

    tracing::info!(chars = transcript.text.len(), "Web audio transcribed");
    Ok(Json(ApiResponse::ok(TranscribeData {
        transcription: transcript.text,
    })))
}

/// One message of client-held conversation history
#[derive(Debug, Clone, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    #[serde(default)]
    pub question: String,
    pub education_level: Option<String>,
    #[serde(default)]
    pub context: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateData {
    pub response: String,
    pub tokens_used: usize,
}

/// POST /api/generate
pub async fn generate(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> ApiResult<GenerateData> {
    let question = require_text(&request.question, "Question")?;
    let level = level_from_education(request.education_level.as_deref().unwrap_or("high_school"));
    let context = context_from_messages(&request.context, state.config.history.context_turns, level);

    let answer = state.generator.generate(question, level, Some(&context)).await?;

    Ok(Json(ApiResponse::ok(GenerateData {
        response: answer.text,
        tokens_used: answer.tokens_used,
    })))
}

#[derive(Debug, Deserialize)]
pub struct SynthesizeRequest {
    #[serde(default)]
    pub text: String,
    pub voice: Option<String>,
}

/// POST /api/tts/synthesize
///
/// Returns `audio/mpeg` bytes. Failures carry the synthesis error's status
/// and a hint for the browser-speech fallback.
pub async fn synthesize(
    State(state): State<AppState>,
    Json(request): Json<SynthesizeRequest>,
) -> Response {
    let voice = match request.voice.as_deref().map(str::trim) {
        Some(model) if !model.is_empty() => VoiceConfig::new(model),
        _ => state.synthesizer.voice().clone(),
    };

    let result = state
        .synthesizer
        .synthesize_with_voice(&request.text, SynthesisTarget::Buffer, &voice)
        .await;

    match result {
        Ok(SynthesizedAudio::Buffer { data, content_type }) => {
            (StatusCode::OK, [(header::CONTENT_TYPE, content_type)], data).into_response()
        }
        Ok(SynthesizedAudio::File { .. }) => {
            ServerError::Internal("Synthesizer wrote a file for a buffer target".to_string())
                .into_response()
        }
        Err(e) => {
            let status =
                StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            crate::metrics::record_error("tts_synthesize", "synthesis");
            tracing::warn!(error = %e, status = status.as_u16(), "Web synthesis failed");
            (
                status,
                Json(serde_json::json!({
                    "success": false,
                    "error": e.to_string(),
                    "hint": "The frontend will automatically use browser TTS as fallback.",
                })),
            )
                .into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveConversationRequest {
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    /// Call length in seconds, informational only
    pub duration: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveConversationData {
    pub caller_id: String,
    pub saved_turns: usize,
}

/// POST /api/conversation/save
pub async fn save_conversation(
    State(state): State<AppState>,
    Json(request): Json<SaveConversationRequest>,
) -> ApiResult<SaveConversationData> {
    let phone = require_text(&request.phone_number, "Phone number")?;
    let caller = state.history.find_or_create_caller(phone).await?;

    let mut saved_turns = 0;
    for (question, answer) in pair_messages(&request.messages) {
        state
            .history
            .record_turn(NewTurn {
                caller_id: caller.id,
                phone_number: caller.phone_number.clone(),
                level: DEFAULT_LEVEL,
                question: question.to_string(),
                answer: answer.to_string(),
                audio_url: None,
                response_time_ms: 0,
            })
            .await?;
        saved_turns += 1;
    }

    tracing::info!(
        caller_id = %caller.id,
        saved_turns,
        duration_secs = request.duration.unwrap_or(0),
        "Conversation imported"
    );

    Ok(Json(ApiResponse::ok(SaveConversationData {
        caller_id: caller.id.to_string(),
        saved_turns,
    })))
}

fn require_text<'a>(value: &'a str, field: &str) -> Result<&'a str, ServerError> {
    let value = value.trim();
    if value.is_empty() {
        Err(ServerError::InvalidRequest(format!("{} is required", field)))
    } else {
        Ok(value)
    }
}

/// Map a web-client education level name to an academic level
pub fn level_from_education(name: &str) -> AcademicLevel {
    match name.trim() {
        "elementary" => AcademicLevel::Primary,
        "middle_school" | "high_school" => AcademicLevel::MiddleSchool,
        "undergraduate" => AcademicLevel::HigherSecondary,
        "graduate" => AcademicLevel::Engineering,
        "professional" => AcademicLevel::Medical,
        _ => DEFAULT_LEVEL,
    }
}

/// Consecutive user/assistant messages as question/answer pairs
fn pair_messages(messages: &[ChatMessage]) -> Vec<(&str, &str)> {
    messages
        .windows(2)
        .filter(|w| w[0].role == "user" && w[1].role == "assistant")
        .map(|w| (w[0].content.as_str(), w[1].content.as_str()))
        .filter(|(q, a)| !q.trim().is_empty() && !a.trim().is_empty())
        .collect()
}

/// Build a generation context from client-held history, keeping the newest `limit` pairs
pub fn context_from_messages(
    messages: &[ChatMessage],
    limit: usize,
    level: AcademicLevel,
) -> GenerationContext {
    let pairs = pair_messages(messages);
    let skip = pairs.len().saturating_sub(limit);
    let kept = &pairs[skip..];

    GenerationContext {
        recent_questions: kept.iter().map(|(q, _)| q.to_string()).collect(),
        recent_answers: kept.iter().map(|(_, a)| a.to_string()).collect(),
        preferred_level: Some(level),
        total_turns: pairs.len() as u64,
    }
}
