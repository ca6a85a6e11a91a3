//! HTTP Endpoints
//!
//! Health, readiness, metrics and session listing, plus the voice WebSocket
//! route at the configured path.

use axum::{
    extract::{Json, State},
    http::{HeaderValue, Method, StatusCode},
    routing::get,
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::metrics::metrics_handler;
use crate::state::AppState;
use crate::websocket::ws_handler;

const FALLBACK_ORIGIN: &str = "http://localhost:3000";

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let (ws_path, cors_layer) = {
        let config = state.get_config();
        (
            config.server.ws_path.clone(),
            build_cors_layer(&config.server.cors_origins, config.server.cors_enabled),
        )
    };

    Router::new()
        .route(&ws_path, get(ws_handler))
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics_handler))
        .route("/api/sessions", get(list_sessions))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
}

/// Build CORS layer from configured origins
///
/// - disabled: permissive (development only)
/// - no valid origins: localhost:3000
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

    let allowed = if parsed_origins.is_empty() {
        tracing::info!("No valid CORS origins configured, defaulting to {}", FALLBACK_ORIGIN);
        vec![HeaderValue::from_static(FALLBACK_ORIGIN)]
    } else {
        tracing::info!("CORS configured with {} origins", parsed_origins.len());
        parsed_origins
    };

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(Any)
}

/// GET /health
async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "sessions": state.sessions.count(),
    }))
}

/// GET /ready
///
/// Not ready once the connection limit is reached.
async fn readiness_check(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let active = state.sessions.active_connections();
    let limit = state.sessions.max_connections();
    let ready = state.sessions.has_capacity();

    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(serde_json::json!({
            "ready": ready,
            "checks": {
                "capacity": { "active": active, "limit": limit },
                "backends": {
                    "stt": state.services.stt.model_name(),
                    "llm": state.services.llm.model_name(),
                    "tts": state.services.tts.model_name(),
                },
            },
        })),
    )
}

/// GET /api/sessions
async fn list_sessions(State(state): State<AppState>) -> Json<serde_json::Value> {
    let sessions = state.sessions.list();
    Json(serde_json::json!({
        "count": sessions.len(),
        "sessions": sessions,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::build_services;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;
    use voice_duplex_config::{Settings, TtsBackendKind};

    fn state(max_connections: usize) -> AppState {
        let mut settings = Settings::default();
        settings.server.max_connections = max_connections;
        settings.tts.backend = TtsBackendKind::Silent;
        let services = build_services(&settings).unwrap();
        AppState::new(settings, services, None)
    }

    async fn get_json(router: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null))
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = get_json(create_router(state(4)), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["sessions"], 0);
    }

    #[tokio::test]
    async fn test_ready_until_capacity() {
        let state = state(1);
        let (status, body) = get_json(create_router(state.clone()), "/ready").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["checks"]["backends"]["tts"], "silent");

        let _slot = state.sessions.try_acquire().unwrap();
        let (status, body) = get_json(create_router(state.clone()), "/ready").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["ready"], false);
    }

    #[tokio::test]
    async fn test_sessions_listing_empty() {
        let (status, body) = get_json(create_router(state(4)), "/api/sessions").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 0);
        assert!(body["sessions"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_metrics_disabled_without_recorder() {
        let (status, _) = get_json(create_router(state(4)), "/metrics").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_cors_layer_tolerates_bad_origins() {
        let _ = build_cors_layer(&["not a header\n".to_string()], true);
        let _ = build_cors_layer(&[], false);
    }
}
