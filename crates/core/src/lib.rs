//! Core traits and types for the duplex voice server
//!
//! This crate provides foundational types used across all other crates:
//! - Collaborator traits for pluggable backends (STT, LLM, TTS)
//! - PCM16 and WAV helpers
//! - The WebSocket wire protocol
//! - Error types

pub mod audio;
pub mod error;
pub mod protocol;
pub mod traits;

pub use error::{Error, Result};
pub use protocol::{ClientMessage, LatencyMetric, ServerMessage, UsageReport};
pub use traits::{LanguageModel, SpeechSegment, SpeechSynthesizer, SpeechToText, TokenStream};
