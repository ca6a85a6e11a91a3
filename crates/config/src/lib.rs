//! Configuration management for the duplex voice server
//!
//! Supports loading configuration from:
//! - YAML files (`config/default.yaml`, then `config/{env}.yaml`)
//! - Environment variables (VOICE_DUPLEX__ prefix, `__` between sections)
//! - Explicit files for tests and tooling

pub mod constants;
pub mod settings;

pub use settings::{
    load_settings, load_settings_from, LlmConfig, ObservabilityConfig, RuntimeEnvironment,
    SegmenterConfig, ServerConfig, SessionConfig, Settings, SttConfig, TtsBackendKind, TtsConfig,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

