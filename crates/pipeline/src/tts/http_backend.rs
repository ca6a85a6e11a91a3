//! HTTP TTS Backend - Calls an external synthesis sidecar
//!
//! The sidecar hosts the neural voice and returns normalized float samples:
//!
//! ```text
//! POST {endpoint}/synthesize  {"text": "...", "voice": "af_heart", "speed": 1.1}
//! 200 {"sample_rate": 24000, "segments": [{"samples": [0.01, ...]}, ...]}
//! ```
//!
//! The engine trait is synchronous because it runs on the blocking pool; the
//! request itself is driven on the runtime through a captured handle.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::runtime::Handle;

use voice_duplex_config::TtsConfig;
use voice_duplex_core::{Error, Result, SpeechSegment, SpeechSynthesizer};

/// HTTP TTS Backend configuration
#[derive(Debug, Clone)]
pub struct HttpTtsConfig {
    /// Base URL of the synthesis service
    pub endpoint: String,
    pub voice: String,
    pub speed: f32,
    /// Expected output rate in Hz
    pub sample_rate: u32,
    pub timeout: Duration,
}

impl Default for HttpTtsConfig {
    fn default() -> Self {
        Self::from_settings(&TtsConfig::default())
    }
}

impl HttpTtsConfig {
    pub fn from_settings(settings: &TtsConfig) -> Self {
        Self {
            endpoint: settings.endpoint.clone(),
            voice: settings.voice.clone(),
            speed: settings.speed,
            sample_rate: settings.sample_rate,
            timeout: Duration::from_millis(settings.timeout_ms),
        }
    }
}

#[derive(Debug, Serialize)]
struct SynthesizeRequest<'a> {
    text: &'a str,
    voice: &'a str,
    speed: f32,
}

#[derive(Debug, Deserialize)]
struct SynthesizeResponse {
    #[serde(default)]
    sample_rate: Option<u32>,
    segments: Vec<SegmentPayload>,
}

#[derive(Debug, Deserialize)]
struct SegmentPayload {
    samples: Vec<f32>,
}

pub struct HttpTtsBackend {
    config: HttpTtsConfig,
    client: reqwest::Client,
    runtime: Handle,
}

impl HttpTtsBackend {
    /// Create a new HTTP TTS backend. Must be called inside a Tokio runtime.
    pub fn new(config: HttpTtsConfig) -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| Error::Config(format!("HTTP TTS backend needs a Tokio runtime: {}", e)))?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Tts(format!("Failed to create HTTP client: {}", e)))?;

        tracing::info!(
            endpoint = %config.endpoint,
            voice = %config.voice,
            "HTTP TTS backend configured"
        );

        Ok(Self {
            config,
            client,
            runtime,
        })
    }

    fn synthesize_url(&self) -> String {
        format!("{}/synthesize", self.config.endpoint.trim_end_matches('/'))
    }

    fn decode(&self, body: SynthesizeResponse) -> Vec<SpeechSegment> {
        if let Some(rate) = body.sample_rate {
            if rate != self.config.sample_rate {
                tracing::warn!(
                    expected = self.config.sample_rate,
                    actual = rate,
                    "TTS sidecar sample rate differs from configuration"
                );
            }
        }
        body.segments
            .into_iter()
            .filter(|s| !s.samples.is_empty())
            .map(|s| SpeechSegment::new(s.samples))
            .collect()
    }
}

impl SpeechSynthesizer for HttpTtsBackend {
    fn synthesize(&mut self, text: &str) -> Result<Vec<SpeechSegment>> {
        let start = Instant::now();
        let url = self.synthesize_url();
        let request = SynthesizeRequest {
            text,
            voice: &self.config.voice,
            speed: self.config.speed,
        };

        let body: SynthesizeResponse = self.runtime.block_on(async {
            let response = self
                .client
                .post(&url)
                .json(&request)
                .send()
                .await
                .map_err(|e| Error::Tts(format!("HTTP request failed: {}", e)))?;

            let status = response.status();
            if !status.is_success() {
                let error_text = response.text().await.unwrap_or_default();
                return Err(Error::Tts(format!("HTTP {}: {}", status, error_text)));
            }

            response
                .json::<SynthesizeResponse>()
                .await
                .map_err(|e| Error::Tts(format!("Invalid response: {}", e)))
        })?;

        let segments = self.decode(body);
        tracing::debug!(
            chars = text.chars().count(),
            segments = segments.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "HTTP TTS synthesis complete"
        );
        Ok(segments)
    }

    fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    fn model_name(&self) -> &str {
        &self.config.voice
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_request_shape_and_url() {
        let backend = HttpTtsBackend::new(HttpTtsConfig {
            endpoint: "http://127.0.0.1:8880/".to_string(),
            ..HttpTtsConfig::default()
        })
        .unwrap();
        assert_eq!(backend.synthesize_url(), "http://127.0.0.1:8880/synthesize");

        let request = SynthesizeRequest {
            text: "Okay.",
            voice: "af_heart",
            speed: 1.1,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["text"], "Okay.");
        assert_eq!(json["voice"], "af_heart");
    }

    #[tokio::test]
    async fn test_decode_drops_empty_segments() {
        let backend = HttpTtsBackend::new(HttpTtsConfig::default()).unwrap();
        let body: SynthesizeResponse = serde_json::from_str(
            r#"{"sample_rate": 24000, "segments": [{"samples": [0.5, -0.5]}, {"samples": []}]}"#,
        )
        .unwrap();
        let segments = backend.decode(body);
        assert_eq!(segments, vec![SpeechSegment::new(vec![0.5, -0.5])]);
    }

    #[test]
    fn test_requires_runtime() {
        assert!(matches!(
            HttpTtsBackend::new(HttpTtsConfig::default()),
            Err(Error::Config(_))
        ));
    }
}
