//! Collaborator traits
//!
//! The session orchestrator only sees these seams. Concrete backends live in
//! the `llm` and `pipeline` crates; tests supply their own mocks.

mod llm;
mod speech;

pub use llm::{LanguageModel, TokenStream};
pub use speech::{SpeechSegment, SpeechSynthesizer, SpeechToText};
