//! Duplex Voice Server
//!
//! Serves the streaming voice WebSocket plus health, readiness, metrics and
//! session listing over HTTP.

pub mod http;
pub mod metrics;
pub mod registry;
pub mod state;
pub mod websocket;

pub use http::create_router;
pub use metrics::init_metrics;
pub use registry::{ConnectionSlot, SessionInfo, SessionRegistry};
pub use state::{build_services, AppState};

use thiserror::Error;

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Connection limit reached ({0} sessions)")]
    AtCapacity(usize),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ServerError> for axum::http::StatusCode {
    fn from(err: ServerError) -> Self {
        match err {
            ServerError::AtCapacity(_) => axum::http::StatusCode::SERVICE_UNAVAILABLE,
            ServerError::Config(_) => axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::Internal(_) => axum::http::StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<voice_duplex_config::ConfigError> for ServerError {
    fn from(err: voice_duplex_config::ConfigError) -> Self {
        ServerError::Config(err.to_string())
    }
}

impl From<voice_duplex_core::Error> for ServerError {
    fn from(err: voice_duplex_core::Error) -> Self {
        match err {
            voice_duplex_core::Error::Config(msg) => ServerError::Config(msg),
            other => ServerError::Internal(other.to_string()),
        }
    }
}
