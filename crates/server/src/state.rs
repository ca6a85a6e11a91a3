//! Application State
//!
//! Shared state across all handlers.

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;
use parking_lot::RwLock;

use voice_duplex_config::Settings;
use voice_duplex_llm::{OpenAIBackend, OpenAIConfig};
use voice_duplex_pipeline::{
    create_synthesizer, HttpSttBackend, HttpSttConfig, SynthesisGate, VoiceServices,
};

use crate::registry::SessionRegistry;
use crate::ServerError;

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RwLock<Settings>>,
    /// Backends shared by every session
    pub services: VoiceServices,
    pub sessions: Arc<SessionRegistry>,
    /// Present when the Prometheus recorder is installed
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(config: Settings, services: VoiceServices, metrics: Option<PrometheusHandle>) -> Self {
        let sessions = Arc::new(SessionRegistry::new(config.server.max_connections));
        Self {
            config: Arc::new(RwLock::new(config)),
            services,
            sessions,
            metrics,
        }
    }

    /// Get a read guard to the current configuration
    pub fn get_config(&self) -> parking_lot::RwLockReadGuard<'_, Settings> {
        self.config.read()
    }
}

/// Build the process-wide backends from configuration.
///
/// The synthesis engine is created once here; every session shares it
/// through the same [`SynthesisGate`].
pub fn build_services(config: &Settings) -> Result<VoiceServices, ServerError> {
    let stt = HttpSttBackend::new(HttpSttConfig::from_settings(&config.stt))?;

    let llm = OpenAIBackend::new(OpenAIConfig::from_settings(&config.llm))
        .map_err(|e| ServerError::Config(format!("LLM backend: {}", e)))?;

    let engine = create_synthesizer(&config.tts)?;
    let tts = SynthesisGate::new(engine);

    tracing::info!(
        stt = %config.stt.model,
        llm = %config.llm.model,
        tts = tts.model_name(),
        sample_rate = tts.sample_rate(),
        "Voice backends initialized"
    );

    Ok(VoiceServices {
        stt: Arc::new(stt),
        llm: Arc::new(llm),
        tts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use voice_duplex_config::TtsBackendKind;

    #[test]
    fn test_state_uses_configured_limit() {
        let mut settings = Settings::default();
        settings.server.max_connections = 3;
        settings.tts.backend = TtsBackendKind::Silent;

        let services = build_services(&settings).unwrap();
        let state = AppState::new(settings, services, None);
        assert_eq!(state.sessions.max_connections(), 3);
        assert_eq!(state.services.tts.model_name(), "silent");
    }
}
