//! Speech synthesis
//!
//! Engines implement [`voice_duplex_core::SpeechSynthesizer`]. All calls go
//! through one process-wide [`SynthesisGate`].

pub mod gate;
pub mod http_backend;
pub mod silent;

pub use gate::SynthesisGate;
pub use http_backend::{HttpTtsBackend, HttpTtsConfig};
pub use silent::SilentSynthesizer;

use voice_duplex_config::{TtsBackendKind, TtsConfig};
use voice_duplex_core::{Result, SpeechSynthesizer};

/// Build the configured engine.
///
/// Must be called from inside a Tokio runtime.
pub fn create_synthesizer(config: &TtsConfig) -> Result<Box<dyn SpeechSynthesizer>> {
    match config.backend {
        TtsBackendKind::Http => {
            let backend = HttpTtsBackend::new(HttpTtsConfig::from_settings(config))?;
            Ok(Box::new(backend))
        }
        TtsBackendKind::Silent => {
            tracing::warn!("Using silent synthesizer; replies will carry no audible speech");
            Ok(Box::new(SilentSynthesizer::new(config.sample_rate)))
        }
    }
}
