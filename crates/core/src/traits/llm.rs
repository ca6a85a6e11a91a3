//! Language model trait

use crate::Result;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

/// Stream of reply tokens. Dropping it cancels the underlying request.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Streaming dialogue generation
///
/// Implementations:
/// - `OpenAIBackend` - OpenAI-compatible chat completions over SSE
#[async_trait]
pub trait LanguageModel: Send + Sync + 'static {
    /// Start a reply to the user's transcribed utterance
    ///
    /// The system instruction and token limit belong to the implementation.
    async fn stream_reply(&self, prompt: &str) -> Result<TokenStream>;

    /// Get model name for logging
    fn model_name(&self) -> &str;
}
