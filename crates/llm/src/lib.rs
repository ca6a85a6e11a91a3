//! Streaming reply generation
//!
//! Features:
//! - OpenAI-compatible chat completions over server-sent events
//! - Conversational system instruction for spoken replies

pub mod backend;
pub mod prompt;

pub use backend::{OpenAIBackend, OpenAIConfig};
pub use prompt::{Message, PromptBuilder, Role};

use thiserror::Error;

/// LLM errors
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        LlmError::Network(err.to_string())
    }
}

impl From<LlmError> for voice_duplex_core::Error {
    fn from(err: LlmError) -> Self {
        voice_duplex_core::Error::Llm(err.to_string())
    }
}
