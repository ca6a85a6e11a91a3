//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::constants::{audio, endpoints, models, timing, DEFAULT_SYSTEM_PROMPT};
use crate::ConfigError;

/// Runtime environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    /// Development mode - missing API keys are tolerated
    #[default]
    Development,
    /// Staging mode - stricter validation
    Staging,
    /// Production mode - all validations enforced
    Production,
}

impl RuntimeEnvironment {
    /// Check if this is a production environment
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    /// Check if strict validation should be applied
    pub fn is_strict(&self) -> bool {
        matches!(self, Self::Production | Self::Staging)
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: RuntimeEnvironment,

    /// HTTP and WebSocket listener
    #[serde(default)]
    pub server: ServerConfig,

    /// Utterance segmentation
    #[serde(default)]
    pub segmenter: SegmenterConfig,

    /// Per-connection session behaviour
    #[serde(default)]
    pub session: SessionConfig,

    /// Transcription backend
    #[serde(default)]
    pub stt: SttConfig,

    /// Generation backend
    #[serde(default)]
    pub llm: LlmConfig,

    /// Synthesis backend
    #[serde(default)]
    pub tts: TtsConfig,

    /// Logging and metrics
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Settings {
    /// Create default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_server()?;
        self.validate_segmenter()?;
        self.validate_session()?;
        self.validate_backends()?;
        Ok(())
    }

    fn validate_server(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.port".to_string(),
                message: "Port must be non-zero".to_string(),
            });
        }

        if !self.server.ws_path.starts_with('/') {
            return Err(ConfigError::InvalidValue {
                field: "server.ws_path".to_string(),
                message: format!("Must start with '/', got {}", self.server.ws_path),
            });
        }

        if self.server.max_connections == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.max_connections".to_string(),
                message: "Must allow at least one connection".to_string(),
            });
        }

        Ok(())
    }

    fn validate_segmenter(&self) -> Result<(), ConfigError> {
        let seg = &self.segmenter;

        if !(50..=10_000).contains(&seg.poll_timeout_ms) {
            return Err(ConfigError::InvalidValue {
                field: "segmenter.poll_timeout_ms".to_string(),
                message: format!("Must be between 50 and 10000, got {}", seg.poll_timeout_ms),
            });
        }

        if seg.min_utterance_bytes == 0 || seg.min_utterance_bytes % 2 != 0 {
            return Err(ConfigError::InvalidValue {
                field: "segmenter.min_utterance_bytes".to_string(),
                message: format!(
                    "Must be a positive whole number of PCM16 samples, got {}",
                    seg.min_utterance_bytes
                ),
            });
        }

        if seg.ingest_queue_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "segmenter.ingest_queue_capacity".to_string(),
                message: "Queue capacity must be non-zero".to_string(),
            });
        }

        Ok(())
    }

    fn validate_session(&self) -> Result<(), ConfigError> {
        if self.session.outbound_queue_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "session.outbound_queue_capacity".to_string(),
                message: "Queue capacity must be non-zero".to_string(),
            });
        }
        Ok(())
    }

    fn validate_backends(&self) -> Result<(), ConfigError> {
        if self.llm.max_tokens == 0 {
            return Err(ConfigError::InvalidValue {
                field: "llm.max_tokens".to_string(),
                message: "Must generate at least one token".to_string(),
            });
        }

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigError::InvalidValue {
                field: "llm.temperature".to_string(),
                message: format!("Must be between 0.0 and 2.0, got {}", self.llm.temperature),
            });
        }

        if !(self.tts.speed > 0.0 && self.tts.speed <= 4.0) {
            return Err(ConfigError::InvalidValue {
                field: "tts.speed".to_string(),
                message: format!("Must be in (0.0, 4.0], got {}", self.tts.speed),
            });
        }

        if !(8_000..=48_000).contains(&self.tts.sample_rate) {
            return Err(ConfigError::InvalidValue {
                field: "tts.sample_rate".to_string(),
                message: format!("Must be between 8000 and 48000, got {}", self.tts.sample_rate),
            });
        }

        if self.environment.is_strict() {
            if self.stt.api_key.is_empty() {
                return Err(ConfigError::MissingField("stt.api_key".to_string()));
            }
            if self.llm.api_key.is_empty() {
                return Err(ConfigError::MissingField("llm.api_key".to_string()));
            }
        } else if self.stt.api_key.is_empty() || self.llm.api_key.is_empty() {
            tracing::warn!(
                "No API key configured (set {}); hosted backends will reject requests",
                endpoints::API_KEY_ENV
            );
        }

        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// WebSocket path
    #[serde(default = "default_ws_path")]
    pub ws_path: String,

    /// Maximum concurrent voice sessions
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// Enable CORS
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// CORS allowed origins
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8000
}
fn default_ws_path() -> String {
    "/ws/stream".to_string()
}
fn default_max_connections() -> usize {
    100
}
fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            ws_path: default_ws_path(),
            max_connections: default_max_connections(),
            cors_enabled: true,
            cors_origins: Vec::new(),
        }
    }
}

/// Utterance segmentation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmenterConfig {
    /// Quiet period after which buffered audio is finalized
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,

    /// Minimum buffered bytes for an utterance to be transcribed
    #[serde(default = "default_min_utterance_bytes")]
    pub min_utterance_bytes: usize,

    /// Inbound audio chunks buffered before the socket reader waits
    #[serde(default = "default_ingest_queue_capacity")]
    pub ingest_queue_capacity: usize,
}

fn default_poll_timeout_ms() -> u64 {
    timing::POLL_TIMEOUT_MS
}
fn default_min_utterance_bytes() -> usize {
    audio::MIN_UTTERANCE_BYTES
}
fn default_ingest_queue_capacity() -> usize {
    256
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            poll_timeout_ms: default_poll_timeout_ms(),
            min_utterance_bytes: default_min_utterance_bytes(),
            ingest_queue_capacity: default_ingest_queue_capacity(),
        }
    }
}

/// Per-connection session behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Honour `{"type":"interrupt"}` from the client
    #[serde(default = "default_true")]
    pub barge_in_enabled: bool,

    /// Outbound messages and audio frames buffered per connection
    #[serde(default = "default_outbound_queue_capacity")]
    pub outbound_queue_capacity: usize,
}

fn default_outbound_queue_capacity() -> usize {
    512
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            barge_in_enabled: true,
            outbound_queue_capacity: default_outbound_queue_capacity(),
        }
    }
}

/// Transcription backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SttConfig {
    /// OpenAI-compatible API base
    #[serde(default = "default_api_base")]
    pub endpoint: String,

    #[serde(default = "default_api_key", skip_serializing)]
    pub api_key: String,

    #[serde(default = "default_stt_model")]
    pub model: String,

    /// Upper bound on one transcription call
    #[serde(default = "default_stt_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_api_base() -> String {
    endpoints::GROQ_API_BASE.to_string()
}
fn default_api_key() -> String {
    std::env::var(endpoints::API_KEY_ENV).unwrap_or_default()
}
fn default_stt_model() -> String {
    models::STT_MODEL.to_string()
}
fn default_stt_timeout_ms() -> u64 {
    timing::STT_TIMEOUT_MS
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            endpoint: default_api_base(),
            api_key: default_api_key(),
            model: default_stt_model(),
            timeout_ms: default_stt_timeout_ms(),
        }
    }
}

/// Generation backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// OpenAI-compatible API base
    #[serde(default = "default_api_base")]
    pub endpoint: String,

    #[serde(default = "default_api_key", skip_serializing)]
    pub api_key: String,

    #[serde(default = "default_llm_model")]
    pub model: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Instruction prepended to every request
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Connect and response-header deadline; the streamed reply itself is unbounded
    #[serde(default = "default_llm_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_llm_model() -> String {
    models::LLM_MODEL.to_string()
}
fn default_max_tokens() -> u32 {
    models::LLM_MAX_TOKENS
}
fn default_temperature() -> f32 {
    0.7
}
fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}
fn default_llm_timeout_ms() -> u64 {
    timing::LLM_TIMEOUT_MS
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: default_api_base(),
            api_key: default_api_key(),
            model: default_llm_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            system_prompt: default_system_prompt(),
            timeout_ms: default_llm_timeout_ms(),
        }
    }
}

/// Which synthesis engine to load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TtsBackendKind {
    /// Synthesis sidecar over HTTP
    #[default]
    Http,
    /// Silence of matching length, for development without a sidecar
    Silent,
}

/// Synthesis backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsConfig {
    #[serde(default)]
    pub backend: TtsBackendKind,

    #[serde(default = "default_tts_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_voice")]
    pub voice: String,

    #[serde(default = "default_speed")]
    pub speed: f32,

    /// Output sample rate in Hz
    #[serde(default = "default_tts_sample_rate")]
    pub sample_rate: u32,

    #[serde(default = "default_tts_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_tts_endpoint() -> String {
    endpoints::TTS_SIDECAR.to_string()
}
fn default_voice() -> String {
    models::TTS_VOICE.to_string()
}
fn default_speed() -> f32 {
    models::TTS_SPEED
}
fn default_tts_sample_rate() -> u32 {
    audio::OUTPUT_SAMPLE_RATE
}
fn default_tts_timeout_ms() -> u64 {
    timing::TTS_TIMEOUT_MS
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            backend: TtsBackendKind::default(),
            endpoint: default_tts_endpoint(),
            voice: default_voice(),
            speed: default_speed(),
            sample_rate: default_tts_sample_rate(),
            timeout_ms: default_tts_timeout_ms(),
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub log_json: bool,

    /// Install the Prometheus recorder and serve `/metrics`
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
            metrics_enabled: true,
        }
    }
}

/// Load settings from `config/default`, `config/{env}` and the environment
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    // Load default config
    builder = builder.add_source(File::with_name("config/default").required(false));

    // Load environment-specific config
    if let Some(env_name) = env {
        builder =
            builder.add_source(File::with_name(&format!("config/{}", env_name)).required(false));
    }

    // Load from environment variables
    builder = builder.add_source(
        Environment::with_prefix("VOICE_DUPLEX")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;

    Ok(settings)
}

/// Load settings from one explicit file, without environment overrides
pub fn load_settings_from(path: impl AsRef<Path>) -> Result<Settings, ConfigError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let config = Config::builder()
        .add_source(File::from(path).required(true))
        .build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.server.port, 8000);
        assert_eq!(settings.server.ws_path, "/ws/stream");
        assert_eq!(settings.segmenter.poll_timeout_ms, 800);
        assert_eq!(settings.segmenter.min_utterance_bytes, 16_000);
        assert_eq!(settings.llm.max_tokens, 150);
        assert_eq!(settings.tts.voice, "af_heart");
        assert_eq!(settings.tts.sample_rate, 24_000);
        assert!(settings.session.barge_in_enabled);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_segmenter_validation() {
        let mut settings = Settings::default();
        settings.segmenter.poll_timeout_ms = 10;
        assert!(settings.validate().is_err());

        settings.segmenter.poll_timeout_ms = 800;
        settings.segmenter.min_utterance_bytes = 15_999;
        assert!(settings.validate().is_err());

        settings.segmenter.min_utterance_bytes = 16_000;
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_tts_speed_validation() {
        let mut settings = Settings::default();
        settings.tts.speed = 0.0;
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "tts.speed"
        ));
    }

    #[test]
    fn test_strict_environment_requires_keys() {
        let mut settings = Settings::default();
        settings.environment = RuntimeEnvironment::Production;
        settings.stt.api_key.clear();
        assert!(matches!(settings.validate(), Err(ConfigError::MissingField(_))));

        settings.stt.api_key = "k".to_string();
        settings.llm.api_key = "k".to_string();
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_load_from_yaml_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "server:\n  port: 9100\nsegmenter:\n  poll_timeout_ms: 400\ntts:\n  backend: silent\n  voice: bf_emma"
        )
        .unwrap();

        let settings = load_settings_from(file.path()).unwrap();
        assert_eq!(settings.server.port, 9100);
        assert_eq!(settings.segmenter.poll_timeout_ms, 400);
        assert_eq!(settings.segmenter.min_utterance_bytes, 16_000);
        assert_eq!(settings.tts.backend, TtsBackendKind::Silent);
        assert_eq!(settings.tts.voice, "bf_emma");
    }

    #[test]
    fn test_load_missing_file() {
        let result = load_settings_from("/nonexistent/voice-duplex.yaml");
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "server:\n  port: 0").unwrap();
        assert!(load_settings_from(file.path()).is_err());
    }

    #[test]
    fn test_malformed_yaml_is_parse_error() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "server: [port: 9100\n  ws_path: {{").unwrap();
        let result = load_settings_from(file.path());
        assert!(matches!(result, Err(ConfigError::ParseError(_))), "{:?}", result);

        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "server:\n  port: not-a-number").unwrap();
        let result = load_settings_from(file.path());
        assert!(matches!(result, Err(ConfigError::ParseError(_))), "{:?}", result);
    }
}
