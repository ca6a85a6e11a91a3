//! Full-duplex voice pipeline
//!
//! Per connection: inbound audio is segmented into utterances, each
//! utterance is transcribed, the reply streams back token by token and is
//! synthesized sentence by sentence. A barge-in or a new utterance cancels
//! the running reply within one token, sentence or audio frame.
//!
//! Components:
//! - [`segmenter`]: silence-timeout utterance segmentation
//! - [`sentence`]: token-to-sentence accumulation
//! - [`generation`]: one turn's streaming reply
//! - [`synthesis`]: sentence-to-audio dispatch
//! - [`tts`]: engines and the process-wide synthesis gate
//! - [`stt`]: transcription backends
//! - [`interrupt`]: per-turn cancellation
//! - [`telemetry`]: latency and usage reporting
//! - [`session`]: the per-connection orchestrator

pub mod generation;
pub mod interrupt;
pub mod segmenter;
pub mod sentence;
pub mod session;
pub mod sink;
pub mod stt;
pub mod synthesis;
pub mod telemetry;
pub mod tts;

pub use generation::{GenerationOutcome, GenerationPipeline};
pub use interrupt::{InterruptController, TurnPhase, TurnToken};
pub use segmenter::{Utterance, UtteranceBuffer, UtteranceSegmenter};
pub use sentence::{SentenceAccumulator, SentenceUnit};
pub use session::{SessionOptions, VoiceServices, VoiceSession};
pub use sink::{Outbound, SessionSink};
pub use stt::{HttpSttBackend, HttpSttConfig};
pub use synthesis::{SpeakOutcome, SynthesisDispatcher};
pub use telemetry::{TelemetryEmitter, TelemetryEvent, TelemetryKind};
pub use tts::{create_synthesizer, HttpTtsBackend, HttpTtsConfig, SilentSynthesizer, SynthesisGate};
