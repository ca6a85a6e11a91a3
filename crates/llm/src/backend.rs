//! OpenAI-compatible streaming backend
//!
//! Works against any server exposing `/chat/completions` with
//! `stream: true` (OpenAI, Groq, vLLM, llama.cpp server).

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use voice_duplex_config::LlmConfig;
use voice_duplex_core::{Error, LanguageModel, Result, TokenStream};

use crate::prompt::{Message, PromptBuilder};
use crate::LlmError;

/// Configuration for OpenAI-compatible backends
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    /// API base, e.g. https://api.groq.com/openai/v1
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub system_prompt: String,
    /// Bounds connecting and waiting for response headers. The streamed
    /// body is read at the consumer's pace and is never cut off by it.
    pub timeout: Duration,
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self::from_settings(&LlmConfig::default())
    }
}

impl OpenAIConfig {
    pub fn from_settings(settings: &LlmConfig) -> Self {
        Self {
            endpoint: settings.endpoint.clone(),
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
            system_prompt: settings.system_prompt.clone(),
            timeout: Duration::from_millis(settings.timeout_ms),
        }
    }
}

/// OpenAI-compatible backend
pub struct OpenAIBackend {
    config: OpenAIConfig,
    prompt: PromptBuilder,
    client: Client,
}

impl OpenAIBackend {
    /// Create new OpenAI backend
    pub fn new(config: OpenAIConfig) -> std::result::Result<Self, LlmError> {
        let client = Client::builder()
            .connect_timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Configuration(e.to_string()))?;

        let prompt = PromptBuilder::new(config.system_prompt.clone());
        Ok(Self {
            config,
            prompt,
            client,
        })
    }

    /// Get the full API URL for chat completions
    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.config.endpoint.trim_end_matches('/'))
    }

    /// Build request headers
    fn build_headers(&self) -> reqwest::header::HeaderMap {
        use reqwest::header::HeaderValue;

        let mut headers = reqwest::header::HeaderMap::new();

        if !self.config.api_key.is_empty() {
            let auth_value = format!("Bearer {}", self.config.api_key);
            if let Ok(val) = HeaderValue::from_str(&auth_value) {
                headers.insert(reqwest::header::AUTHORIZATION, val);
            }
        }

        headers.insert(
            reqwest::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );

        headers
    }

    fn build_request(&self, prompt: &str) -> OpenAIChatRequest {
        OpenAIChatRequest {
            model: self.config.model.clone(),
            messages: self.prompt.build(prompt),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            stream: true,
        }
    }
}

#[async_trait]
impl LanguageModel for OpenAIBackend {
    async fn stream_reply(&self, prompt: &str) -> Result<TokenStream> {
        let request = self.build_request(prompt);

        let send = self
            .client
            .post(self.chat_url())
            .headers(self.build_headers())
            .json(&request)
            .send();
        let response = tokio::time::timeout(self.config.timeout, send)
            .await
            .map_err(|_| Error::Timeout(self.config.timeout.as_millis() as u64))?
            .map_err(LlmError::from)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(LlmError::Api(format!("HTTP {}: {}", status, error_text)).into());
        }

        let mut body = response.bytes_stream();
        let stream = async_stream::try_stream! {
            let mut decoder = SseDecoder::default();
            'read: while let Some(chunk) = body.next().await {
                let chunk = chunk.map_err(|e| Error::from(LlmError::Network(e.to_string())))?;
                for event in decoder.push(&chunk) {
                    match event {
                        SseEvent::Token(token) => yield token,
                        SseEvent::Done => break 'read,
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

/// One meaningful line of a chat-completion event stream
#[derive(Debug, Clone, PartialEq)]
enum SseEvent {
    Token(String),
    Done,
}

/// Splits a byte stream into complete SSE lines.
///
/// Bytes are buffered until a newline so multi-byte characters split across
/// network chunks decode intact.
#[derive(Debug, Default)]
struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(line_end) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=line_end).collect();
            let line = String::from_utf8_lossy(&line);
            if let Some(event) = parse_sse_line(line.trim()) {
                events.push(event);
            }
        }
        events
    }
}

fn parse_sse_line(line: &str) -> Option<SseEvent> {
    if line.is_empty() {
        return None;
    }

    let payload = line.strip_prefix("data:")?.trim_start();
    if payload == "[DONE]" {
        return Some(SseEvent::Done);
    }

    match serde_json::from_str::<OpenAIStreamChunk>(payload) {
        Ok(chunk) => chunk
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta)
            .and_then(|delta| delta.content)
            .filter(|content| !content.is_empty())
            .map(SseEvent::Token),
        Err(e) => {
            tracing::debug!(error = %e, "Skipping unparseable stream chunk");
            None
        }
    }
}

// OpenAI API types
#[derive(Debug, Serialize)]
struct OpenAIChatRequest {
    model: String,
    messages: Vec<Message>,
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct OpenAIStreamChunk {
    choices: Vec<OpenAIStreamChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAIStreamChoice {
    delta: Option<OpenAIDelta>,
}

#[derive(Debug, Deserialize)]
struct OpenAIDelta {
    content: Option<String>,
}
