//! Prometheus metrics
//!
//! The recorder is installed once per process; `/metrics` renders whatever
//! the call flow and HTTP layer have recorded.

use std::time::Duration;

use axum::{http::StatusCode, response::IntoResponse};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Install the Prometheus recorder; later calls return the first handle
pub fn init_metrics() -> Option<PrometheusHandle> {
    HANDLE
        .get_or_try_init(|| PrometheusBuilder::new().install_recorder())
        .map(Clone::clone)
        .map_err(|e| tracing::warn!(error = %e, "Failed to install Prometheus recorder"))
        .ok()
}

/// GET /metrics
pub async fn metrics_handler() -> impl IntoResponse {
    match HANDLE.get() {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            "metrics recorder not installed".to_string(),
        ),
    }
}

/// Count one request and its latency under the matched route
pub fn record_request(endpoint: &str, status: StatusCode, elapsed: Duration) {
    metrics::counter!(
        "voice_tutor_http_requests_total",
        "endpoint" => endpoint.to_string(),
        "status" => status.as_u16().to_string()
    )
    .increment(1);
    metrics::histogram!(
        "voice_tutor_http_request_duration_seconds",
        "endpoint" => endpoint.to_string()
    )
    .record(elapsed.as_secs_f64());
}

/// Count one failed request by error kind
pub fn record_error(endpoint: &'static str, kind: &'static str) {
    metrics::counter!("voice_tutor_http_errors_total", "endpoint" => endpoint, "kind" => kind)
        .increment(1);
}
