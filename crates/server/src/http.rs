//! HTTP Endpoints
//!
//! Router assembly: JSON API, telephony webhooks, audio files, health and
//! metrics, behind tracing, timeout and CORS layers.

use std::time::{Duration, Instant};

use axum::{
    extract::{MatchedPath, Request, State},
    http::{header, HeaderValue, Method, StatusCode, Uri},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeader;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::metrics::{metrics_handler, record_request};
use crate::state::AppState;
use crate::telephony;

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let server = &state.config.server;
    let cors_layer = build_cors_layer(&server.cors_origins, server.cors_enabled);
    let timeout = Duration::from_secs(server.timeout_seconds);
    let telephony_prefix = normalize_prefix(&state.config.telephony.route_prefix);
    let audio_dir = state.synthesizer.audio_dir().to_path_buf();

    Router::new()
        .route("/", get(service_info))
        // Health check
        .route("/health", get(api::health))
        .route("/api/health", get(api::health))
        // Prometheus metrics
        .route("/metrics", get(metrics_handler))
        // Catalog and lookups
        .route("/api/categories", get(api::categories))
        .route("/api/voices", get(api::voices))
        .route("/api/history/:phone", get(api::history))
        .route("/api/stats/:phone", get(api::stats))
        // Development
        .route("/api/test-ai", post(api::test_ai))
        .route("/api/test-tts", post(api::test_tts))
        .route("/api/cleanup", post(api::cleanup))
        // Web demo
        .route("/api/stt/transcribe", post(api::transcribe))
        .route("/api/generate", post(api::generate))
        .route("/api/gemini/generate", post(api::generate))
        .route("/api/tts/synthesize", post(api::synthesize))
        .route("/api/conversation/save", post(api::save_conversation))
        // Telephony webhooks
        .nest(&telephony_prefix, telephony::routes())
        .route_layer(middleware::from_fn(track_requests))
        // Synthesized answers fetched by the telephony platform
        .nest_service(
            "/audio",
            SetResponseHeader::overriding(
                ServeDir::new(audio_dir),
                header::CACHE_CONTROL,
                HeaderValue::from_static("no-cache"),
            ),
        )
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(timeout))
        .layer(cors_layer)
        .with_state(state)
}

/// Build CORS layer from configured origins
///
/// - Disabled: permissive (development)
/// - No valid origins: localhost:3000 only
fn build_cors_layer(origins: &[String], enabled: bool) -> CorsLayer {
    if !enabled {
        tracing::warn!("CORS is disabled - allowing all origins (NOT FOR PRODUCTION)");
        return CorsLayer::permissive();
    }

    let parsed_origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            origin.parse::<HeaderValue>().ok().or_else(|| {
                tracing::warn!("Invalid CORS origin: {}", origin);
                None
            })
        })
        .collect();

    let parsed_origins = if parsed_origins.is_empty() {
        tracing::info!("No valid CORS origins configured, defaulting to localhost:3000");
        vec![HeaderValue::from_static("http://localhost:3000")]
    } else {
        tracing::info!("CORS configured with {} origins", parsed_origins.len());
        parsed_origins
    };

    CorsLayer::new()
        .allow_origin(parsed_origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}

/// Route prefix with a leading slash and no trailing one
fn normalize_prefix(prefix: &str) -> String {
    format!("/{}", prefix.trim().trim_matches('/'))
}

/// Per-route request count and latency
async fn track_requests(request: Request, next: Next) -> Response {
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let start = Instant::now();

    let response = next.run(request).await;
    record_request(&endpoint, response.status(), start.elapsed());
    response
}

/// GET /
async fn service_info(State(state): State<AppState>) -> Json<serde_json::Value> {
    let prefix = normalize_prefix(&state.config.telephony.route_prefix);
    Json(serde_json::json!({
        "service": "voice-tutor",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "endpoints": {
            "health": "/health",
            "metrics": "/metrics",
            "categories": "/api/categories",
            "history": "/api/history/:phone",
            "stats": "/api/stats/:phone",
            "voiceWebhook": format!("{}/voice", prefix),
            "statusWebhook": format!("{}/status", prefix),
        }
    }))
}

async fn not_found(uri: Uri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({
            "success": false,
            "error": "Endpoint not found",
            "path": uri.path(),
        })),
    )
}

/// Start the periodic sweep of stale synthesized audio
///
/// Returns `None` when the interval is configured as 0.
pub fn spawn_audio_cleanup(state: AppState) -> Option<JoinHandle<()>> {
    let interval_mins = state.config.tts.cleanup_interval_mins;
    if interval_mins == 0 {
        tracing::info!("Periodic audio cleanup disabled");
        return None;
    }

    let max_age = Duration::from_secs(state.config.tts.cleanup_max_age_hours * 3600);
    let period = Duration::from_secs(interval_mins * 60);

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        // First tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let deleted = state.synthesizer.cleanup_older_than(max_age).await;
            if deleted > 0 {
                tracing::info!(deleted, "Periodic audio cleanup");
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_prefix() {
        assert_eq!(normalize_prefix("/api/twilio"), "/api/twilio");
        assert_eq!(normalize_prefix("api/twilio/"), "/api/twilio");
        assert_eq!(normalize_prefix(" /voice "), "/voice");
    }

    #[test]
    fn test_cors_layer_builds_for_invalid_origins() {
        let _ = build_cors_layer(&["bad\norigin".to_string()], true);
        let _ = build_cors_layer(&[], true);
        let _ = build_cors_layer(&["https://tutor.example.com".to_string()], true);
        let _ = build_cors_layer(&[], false);
    }
}
