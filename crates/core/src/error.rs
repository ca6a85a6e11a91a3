//! Error types shared by every stage of the voice pipeline

use thiserror::Error;

/// Result alias used across the workspace
pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline error
#[derive(Error, Debug)]
pub enum Error {
    #[error("Transcription failed: {0}")]
    Stt(String),

    #[error("Generation failed: {0}")]
    Llm(String),

    #[error("Synthesis failed: {0}")]
    Tts(String),

    #[error("Audio error: {0}")]
    Audio(String),

    #[error("Timed out after {0}ms")]
    Timeout(u64),

    /// The peer is gone; further sends on this session are dropped.
    #[error("Connection closed")]
    ConnectionClosed,

    /// The turn this output belonged to was cancelled.
    #[error("Turn interrupted")]
    Interrupted,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether this error only signals that the client disconnected
    pub fn is_connection_closed(&self) -> bool {
        matches!(self, Error::ConnectionClosed)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Internal(format!("JSON error: {}", err))
    }
}

impl From<hound::Error> for Error {
    fn from(err: hound::Error) -> Self {
        Error::Audio(err.to_string())
    }
}
