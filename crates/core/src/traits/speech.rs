//! Speech processing traits

use crate::Result;
use async_trait::async_trait;

/// Speech-to-Text interface
///
/// Implementations:
/// - `HttpSttBackend` - OpenAI-compatible transcription endpoint
///
/// # Example
///
/// ```ignore
/// let stt: Arc<dyn SpeechToText> = Arc::new(HttpSttBackend::new(config)?);
/// let text = stt.transcribe(wav_bytes).await?;
/// ```
#[async_trait]
pub trait SpeechToText: Send + Sync + 'static {
    /// Transcribe one finalized utterance
    ///
    /// # Arguments
    /// * `wav` - Mono 16-bit 16kHz audio in a WAV container
    ///
    /// # Returns
    /// Transcribed text, possibly empty when nothing intelligible was said
    async fn transcribe(&self, wav: Vec<u8>) -> Result<String>;

    /// Get model name for logging
    fn model_name(&self) -> &str;
}

/// One chunk of synthesized audio, normalized to [-1.0, 1.0]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpeechSegment {
    pub samples: Vec<f32>,
}

impl SpeechSegment {
    pub fn new(samples: Vec<f32>) -> Self {
        Self { samples }
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Text-to-Speech engine
///
/// Synthesis is blocking and CPU or device bound, so calls run on the
/// blocking pool and take `&mut self`. Callers serialize access through a
/// single process-wide gate; an engine never sees two calls at once.
pub trait SpeechSynthesizer: Send + 'static {
    /// Synthesize one sentence into an ordered list of segments
    fn synthesize(&mut self, text: &str) -> Result<Vec<SpeechSegment>>;

    /// Output sample rate in Hz
    fn sample_rate(&self) -> u32;

    /// Get model name for logging
    fn model_name(&self) -> &str;
}
