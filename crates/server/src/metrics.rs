//! Prometheus metrics
//!
//! The pipeline records through the `metrics` facade; this module installs
//! the Prometheus recorder and serves its text exposition at `/metrics`.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::state::AppState;

/// Install the global recorder. Returns `None` if one is already installed.
pub fn init_metrics() -> Option<PrometheusHandle> {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            describe_metrics();
            Some(handle)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to install Prometheus recorder, metrics disabled");
            None
        }
    }
}

fn describe_metrics() {
    metrics::describe_histogram!(
        "voice_stage_latency_ms",
        metrics::Unit::Milliseconds,
        "Per-stage latency (stt, first token, first audio chunk, end to end)"
    );
    metrics::describe_histogram!(
        "voice_tts_lock_wait_ms",
        metrics::Unit::Milliseconds,
        "Time spent waiting for the shared synthesis engine"
    );
    metrics::describe_counter!("voice_llm_tokens_total", "Generated tokens");
    metrics::describe_counter!("voice_tts_chars_total", "Characters submitted for synthesis");
    metrics::describe_counter!(
        "voice_audio_milliseconds_total",
        metrics::Unit::Milliseconds,
        "User audio transcribed"
    );
    metrics::describe_counter!("voice_barge_in_total", "Replies cut short by the user");
    metrics::describe_counter!("voice_rejected_connections_total", "Connections refused at the limit");
    metrics::describe_gauge!("voice_active_sessions", "Connected voice sessions");
}

/// GET /metrics
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (StatusCode::NOT_FOUND, "metrics disabled".to_string()),
    }
}
