//! HTTP STT Backend - OpenAI-compatible transcription endpoint
//!
//! Sends each finalized utterance as a WAV upload to
//! `{endpoint}/audio/transcriptions` and asks for a plain-text response.
//! Groq, OpenAI and local whisper servers all speak this format.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use std::time::{Duration, Instant};

use voice_duplex_config::SttConfig;
use voice_duplex_core::{Error, Result, SpeechToText};

/// HTTP STT Backend configuration
#[derive(Debug, Clone)]
pub struct HttpSttConfig {
    /// API base, e.g. https://api.groq.com/openai/v1
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    /// Request timeout
    pub timeout: Duration,
}

impl Default for HttpSttConfig {
    fn default() -> Self {
        Self::from_settings(&SttConfig::default())
    }
}

impl HttpSttConfig {
    pub fn from_settings(settings: &SttConfig) -> Self {
        Self {
            endpoint: settings.endpoint.clone(),
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
            timeout: Duration::from_millis(settings.timeout_ms),
        }
    }
}

/// HTTP STT Backend
pub struct HttpSttBackend {
    config: HttpSttConfig,
    client: reqwest::Client,
}

impl HttpSttBackend {
    /// Create a new HTTP STT backend
    pub fn new(config: HttpSttConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Stt(format!("Failed to create HTTP client: {}", e)))?;

        tracing::info!(
            endpoint = %config.endpoint,
            model = %config.model,
            "HTTP STT backend configured"
        );

        Ok(Self { config, client })
    }

    fn transcription_url(&self) -> String {
        format!(
            "{}/audio/transcriptions",
            self.config.endpoint.trim_end_matches('/')
        )
    }

    fn build_form(&self, wav: Vec<u8>) -> Result<Form> {
        let file = Part::bytes(wav)
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| Error::Stt(format!("Invalid upload part: {}", e)))?;

        Ok(Form::new()
            .part("file", file)
            .text("model", self.config.model.clone())
            .text("response_format", "text"))
    }
}

#[async_trait]
impl SpeechToText for HttpSttBackend {
    async fn transcribe(&self, wav: Vec<u8>) -> Result<String> {
        let start = Instant::now();
        let bytes = wav.len();
        let form = self.build_form(wav)?;

        let mut request = self.client.post(self.transcription_url()).multipart(form);
        if !self.config.api_key.is_empty() {
            request = request.bearer_auth(&self.config.api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Stt(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Stt(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(Error::Stt(format!("HTTP {}: {}", status, body)));
        }

        let text = body.trim().to_string();
        tracing::debug!(
            bytes,
            chars = text.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "HTTP STT transcription complete"
        );
        Ok(text)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_trims_trailing_slash() {
        let backend = HttpSttBackend::new(HttpSttConfig {
            endpoint: "https://api.example.com/v1/".to_string(),
            api_key: String::new(),
            model: "whisper-large-v3-turbo".to_string(),
            timeout: Duration::from_secs(5),
        })
        .unwrap();
        assert_eq!(
            backend.transcription_url(),
            "https://api.example.com/v1/audio/transcriptions"
        );
        assert_eq!(backend.model_name(), "whisper-large-v3-turbo");
        assert!(backend.build_form(vec![0u8; 64]).is_ok());
    }
}
