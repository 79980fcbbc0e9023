//! Router tests: JSON API and telephony webhooks through the full axum stack
//!
//! Providers are in-process fakes; history is the in-memory store.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use parking_lot::Mutex;
use tower::ServiceExt;

use voice_tutor_config::Settings;
use voice_tutor_core::{
    AudioSource, Error as CoreError, Result as CoreResult, SpeechToText, TextToSpeech,
    TranscriptResult, VoiceConfig,
};
use voice_tutor_llm::{FinishReason, GenerationResult, LlmBackend, LlmError, Message, Role};
use voice_tutor_persistence::{HistoryStore, InMemoryHistoryStore};
use voice_tutor_server::{create_router, AppState};

struct FakeStt {
    transcripts: Mutex<VecDeque<String>>,
    sources: Mutex<Vec<String>>,
}

#[async_trait]
impl SpeechToText for FakeStt {
    async fn transcribe(&self, source: &AudioSource) -> CoreResult<TranscriptResult> {
        self.sources.lock().push(source.describe());
        let text = self.transcripts.lock().pop_front().unwrap_or_default();
        Ok(TranscriptResult::new(text, 0.9, "en-IN"))
    }

    fn model_name(&self) -> &str {
        "fake-stt"
    }
}

struct FakeLlm {
    calls: Mutex<Vec<Vec<Message>>>,
}

#[async_trait]
impl LlmBackend for FakeLlm {
    async fn generate(&self, messages: &[Message]) -> Result<GenerationResult, LlmError> {
        self.calls.lock().push(messages.to_vec());
        Ok(GenerationResult {
            text: "Photosynthesis turns *sunlight* into food.".to_string(),
            tokens: 42,
            total_time_ms: 3,
            finish_reason: FinishReason::Stop,
        })
    }

    fn model_name(&self) -> &str {
        "fake-llm"
    }
}

struct FakeTts {
    fail_status: Option<u16>,
    voices: Mutex<Vec<String>>,
}

#[async_trait]
impl TextToSpeech for FakeTts {
    async fn synthesize(&self, _text: &str, voice: &VoiceConfig) -> CoreResult<Vec<u8>> {
        self.voices.lock().push(voice.model.clone());
        match self.fail_status {
            Some(status) => Err(CoreError::Provider {
                status,
                message: "provider refused".to_string(),
            }),
            None => Ok(b"ID3fake-mp3".to_vec()),
        }
    }

    fn model_name(&self) -> &str {
        "fake-tts"
    }
}

struct TestApp {
    router: Router,
    store: Arc<InMemoryHistoryStore>,
    stt: Arc<FakeStt>,
    llm: Arc<FakeLlm>,
    tts: Arc<FakeTts>,
    audio_dir: tempfile::TempDir,
}

fn app_with(transcripts: &[&str], tts_fail_status: Option<u16>) -> TestApp {
    let audio_dir = tempfile::tempdir().unwrap();
    let mut settings = Settings::default();
    settings.tts.audio_dir = audio_dir.path().to_path_buf();
    settings.server.public_base_url = "https://tutor.example.com".to_string();

    let store = Arc::new(InMemoryHistoryStore::new());
    let stt = Arc::new(FakeStt {
        transcripts: Mutex::new(transcripts.iter().map(|t| t.to_string()).collect()),
        sources: Mutex::new(Vec::new()),
    });
    let llm = Arc::new(FakeLlm {
        calls: Mutex::new(Vec::new()),
    });
    let tts = Arc::new(FakeTts {
        fail_status: tts_fail_status,
        voices: Mutex::new(Vec::new()),
    });

    let history: Arc<dyn HistoryStore> = store.clone();
    let state = AppState::new(settings, stt.clone(), llm.clone(), tts.clone(), history);

    TestApp {
        router: create_router(state),
        store,
        stt,
        llm,
        tts,
        audio_dir,
    }
}

fn app() -> TestApp {
    app_with(&[], None)
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

async fn get_json(router: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::get(uri).body(Body::empty()).unwrap();
    let (status, body) = send(router, request).await;
    (status, serde_json::from_slice(&body).unwrap())
}

async fn post_json(
    router: &Router,
    uri: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let (status, bytes) = post_json_raw(router, uri, body).await;
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn post_json_raw(router: &Router, uri: &str, body: serde_json::Value) -> (StatusCode, Vec<u8>) {
    let request = Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(router, request).await
}

async fn post_form(router: &Router, uri: &str, form: &[(&str, &str)]) -> (StatusCode, String) {
    let request = Request::post(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(serde_urlencoded::to_string(form).unwrap()))
        .unwrap();
    let (status, body) = send(router, request).await;
    (status, String::from_utf8(body).unwrap())
}

#[tokio::test]
async fn test_health_reports_backend() {
    let app = app();
    for uri in ["/health", "/api/health"] {
        let (status, body) = get_json(&app.router, uri).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["persistence"], "memory");
        assert!(body["timestamp"].is_string());
    }
}

#[tokio::test]
async fn test_categories_lists_catalog() {
    let app = app();
    let (status, body) = get_json(&app.router, "/api/categories").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let categories = body["categories"].as_array().unwrap();
    assert_eq!(categories.len(), 7);
    assert_eq!(categories[0]["id"], "1");
    assert_eq!(categories[2]["name"], "Class 11-12");
}

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let app = app();
    let (status, body) = get_json(&app.router, "/api/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Endpoint not found");
    assert_eq!(body["path"], "/api/nope");
}

#[tokio::test]
async fn test_voice_webhook_renders_level_menu() {
    let app = app();
    let request = Request::post("/api/twilio/voice")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("CallSid=CA1&From=%2B919876543210"))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/xml");

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let xml = String::from_utf8(body.to_vec()).unwrap();
    assert!(xml.contains("Welcome to Guru Call"));
    assert!(xml.contains(r#"action="/api/twilio/level-selected""#));
    assert!(xml.contains(r#"numDigits="1""#));
}

#[tokio::test]
async fn test_full_call_over_http() {
    let app = app_with(&["What is photosynthesis?"], None);
    let caller = "+919876543210";

    let (status, xml) = post_form(
        &app.router,
        "/api/twilio/level-selected",
        &[("CallSid", "CA42"), ("From", caller), ("Digits", "3")],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(xml.contains("You selected Class 11-12"));
    assert!(xml.contains("/api/twilio/record?level=3"));

    let (_, xml) = post_form(&app.router, "/api/twilio/record?level=3", &[("CallSid", "CA42")]).await;
    assert!(xml.contains(r#"<Record action="/api/twilio/process?level=3""#));

    let (status, xml) = post_form(
        &app.router,
        "/api/twilio/process?level=3",
        &[
            ("CallSid", "CA42"),
            ("From", caller),
            ("RecordingSid", "RE1"),
            ("RecordingUrl", "https://api.twilio.com/rec/RE1"),
            ("RecordingDuration", "6"),
        ],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(xml.contains("Here is your answer."));
    assert!(xml.contains("<Play>https://tutor.example.com/audio/CA42_RE1_response.mp3</Play>"));
    assert!(xml.contains("/api/twilio/continue?level=3"));
    assert_eq!(app.stt.sources.lock().as_slice(), ["url:https://api.twilio.com/rec/RE1"]);

    // Audio written for the turn is served under /audio, never cached
    assert!(app.audio_dir.path().join("CA42_RE1_response.mp3").exists());
    let request = Request::get("/audio/CA42_RE1_response.mp3").body(Body::empty()).unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");
    let audio = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&audio[..], b"ID3fake-mp3");

    // One turn recorded at the selected level
    let (status, body) = get_json(&app.router, "/api/history/%2B919876543210").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["history"][0]["question"], "What is photosynthesis?");
    assert_eq!(body["history"][0]["educationLevel"], "3");
    assert_eq!(body["history"][0]["answer"], "Photosynthesis turns sunlight into food.");

    let (_, xml) = post_form(&app.router, "/api/twilio/continue?level=3", &[("Digits", "2")]).await;
    assert!(xml.contains("Have a great day learning"));
    assert!(xml.contains("<Hangup/>"));

    let (status, _) = post_form(
        &app.router,
        "/api/twilio/status",
        &[("CallSid", "CA42"), ("CallStatus", "completed"), ("CallDuration", "93")],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_zero_length_recording_redirects() {
    let app = app();
    let (_, xml) = post_form(
        &app.router,
        "/api/twilio/process?level=2",
        &[
            ("CallSid", "CA7"),
            ("From", "+919876543210"),
            ("RecordingUrl", "https://api.twilio.com/rec/RE7"),
            ("RecordingDuration", "0"),
        ],
    )
    .await;
    assert!(xml.contains(r#"<Redirect method="POST">/api/twilio/record?level=2</Redirect>"#));
    assert!(app.stt.sources.lock().is_empty());
    assert_eq!(app.store.turn_count(), 0);
}

#[tokio::test]
async fn test_stats_unknown_then_known() {
    let app = app();
    let (status, body) = get_json(&app.router, "/api/stats/9876543210").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);

    let (status, body) = post_json(
        &app.router,
        "/api/conversation/save",
        serde_json::json!({
            "phoneNumber": "9876543210",
            "duration": 120,
            "messages": [
                {"role": "user", "content": "What is a noun?"},
                {"role": "assistant", "content": "A naming word."},
                {"role": "user", "content": "What is a verb?"},
                {"role": "assistant", "content": "An action word."}
            ]
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["savedTurns"], 2);

    let (status, body) = get_json(&app.router, "/api/stats/9876543210").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalConversations"], 2);
    assert_eq!(body["levelUsage"][0]["level"], "2");
    assert_eq!(body["levelUsage"][0]["count"], 2);
    assert_eq!(body["avgResponseTimeMs"], 0.0);
}

#[tokio::test]
async fn test_history_limit() {
    let app = app();
    let messages: Vec<serde_json::Value> = (0..4)
        .flat_map(|i| {
            [
                serde_json::json!({"role": "user", "content": format!("q{}", i)}),
                serde_json::json!({"role": "assistant", "content": format!("a{}", i)}),
            ]
        })
        .collect();
    post_json(
        &app.router,
        "/api/conversation/save",
        serde_json::json!({"phoneNumber": "+15551234567", "messages": messages}),
    )
    .await;

    let (_, body) = get_json(&app.router, "/api/history/%2B15551234567?limit=2").await;
    assert_eq!(body["count"], 2);
    assert_eq!(body["history"][0]["question"], "q3");

    let (_, body) = get_json(&app.router, "/api/history/%2B10000000000").await;
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn test_generate_uses_client_history() {
    let app = app();
    let (status, body) = post_json(
        &app.router,
        "/api/generate",
        serde_json::json!({
            "question": "And at night?",
            "educationLevel": "elementary",
            "context": [
                {"role": "user", "content": "How do plants eat?"},
                {"role": "assistant", "content": "They make food from light."}
            ]
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["response"], "Photosynthesis turns sunlight into food.");
    assert_eq!(body["tokensUsed"], 42);

    let calls = app.llm.calls.lock();
    let messages = &calls[0];
    assert_eq!(messages[0].role, Role::System);
    assert!(messages.iter().any(|m| m.content == "How do plants eat?"));
    assert_eq!(
        messages.last().map(|m| m.content.as_str()),
        Some("Student's Question: And at night?")
    );
}

#[tokio::test]
async fn test_generate_requires_question() {
    let app = app();
    let (status, body) = post_json(&app.router, "/api/gemini/generate", serde_json::json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(app.llm.calls.lock().is_empty());
}

#[tokio::test]
async fn test_test_ai_defaults_level() {
    let app = app();
    let (status, body) = post_json(
        &app.router,
        "/api/test-ai",
        serde_json::json!({"question": "What is gravity?"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["level"], "2");
    assert_eq!(body["tokensUsed"], 42);
}

#[tokio::test]
async fn test_transcribe_base64_audio() {
    let app = app_with(&["hello tutor"], None);
    // "RIFFdata" in base64
    let (status, body) = post_json(
        &app.router,
        "/api/stt/transcribe",
        serde_json::json!({"audio": "UklGRmRhdGE=", "mimeType": "audio/webm"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["transcription"], "hello tutor");
    assert_eq!(app.stt.sources.lock().as_slice(), ["bytes:audio/webm:8"]);

    let (status, _) = post_json(
        &app.router,
        "/api/stt/transcribe",
        serde_json::json!({"audio": "not base64!"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_synthesize_returns_mpeg() {
    let app = app();
    let request = Request::post("/api/tts/synthesize")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            serde_json::json!({"text": "Hello", "voice": "aura-2-zeus-en"}).to_string(),
        ))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/mpeg");
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"ID3fake-mp3");
    assert_eq!(app.tts.voices.lock().as_slice(), ["aura-2-zeus-en"]);
}

#[tokio::test]
async fn test_synthesize_failure_carries_status_and_hint() {
    let app = app_with(&[], Some(429));
    let (status, body) = post_json(&app.router, "/api/tts/synthesize", serde_json::json!({"text": "Hi"})).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["success"], false);
    assert!(body["hint"].as_str().unwrap().contains("browser TTS"));

    let (status, _) = post_json(&app.router, "/api/tts/synthesize", serde_json::json!({"text": "  "})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_tts_file_and_cleanup() {
    let app = app();
    let (status, body) = post_json(&app.router, "/api/test-tts", serde_json::json!({"text": "Hello"})).await;
    assert_eq!(status, StatusCode::OK);
    let url = body["audioUrl"].as_str().unwrap();
    assert!(url.starts_with("https://tutor.example.com/audio/"));
    assert!(url.ends_with(".mp3"));

    // Fresh files survive a 24 hour sweep
    let (status, body) = post_json(&app.router, "/api/cleanup", serde_json::json!({"maxAgeHours": 24})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deletedFiles"], 0);

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    let (_, body) = post_json(&app.router, "/api/cleanup", serde_json::json!({"maxAgeHours": 0})).await;
    assert_eq!(body["deletedFiles"], 1);
}

#[tokio::test]
async fn test_metrics_endpoint_without_recorder() {
    let app = app();
    let request = Request::get("/metrics").body(Body::empty()).unwrap();
    let (status, _) = send(&app.router, request).await;
    assert!(status == StatusCode::OK || status == StatusCode::SERVICE_UNAVAILABLE);
}
