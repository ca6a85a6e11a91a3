//! WebSocket wire protocol
//!
//! Text frames carry tagged JSON in both directions. Binary frames are raw
//! PCM16 audio and never go through these types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Final transcription of one utterance
    Transcript { text: String },
    /// One streamed token of the reply
    TextChunk { text: String },
    /// Stage latency, one key per message
    Latency { data: BTreeMap<String, u64> },
    /// Usage counters
    Telemetry { data: UsageReport },
}

impl ServerMessage {
    pub fn transcript(text: impl Into<String>) -> Self {
        ServerMessage::Transcript { text: text.into() }
    }

    pub fn text_chunk(text: impl Into<String>) -> Self {
        ServerMessage::TextChunk { text: text.into() }
    }

    /// Latency message with the elapsed time truncated to whole milliseconds
    pub fn latency(metric: LatencyMetric, elapsed: Duration) -> Self {
        let mut data = BTreeMap::new();
        data.insert(metric.key().to_string(), elapsed.as_millis() as u64);
        ServerMessage::Latency { data }
    }

    pub fn usage(report: UsageReport) -> Self {
        ServerMessage::Telemetry { data: report }
    }
}

/// Pipeline stage a latency observation belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LatencyMetric {
    /// Utterance finalized to transcript available
    SttMs,
    /// Generation request to first token
    LlmFirstTokenMs,
    /// Sentence handed to synthesis to first audio frame
    TtsFirstChunkMs,
    /// Start of user speech to first audio frame of the reply
    E2eMs,
}

impl LatencyMetric {
    pub fn key(&self) -> &'static str {
        match self {
            LatencyMetric::SttMs => "stt_ms",
            LatencyMetric::LlmFirstTokenMs => "llm_first_token_ms",
            LatencyMetric::TtsFirstChunkMs => "tts_first_chunk_ms",
            LatencyMetric::E2eMs => "e2e_ms",
        }
    }
}

/// Usage counters reported to the client.
///
/// Each report carries only the field that changed; the others are zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageReport {
    pub audio_secs_processed: f64,
    pub llm_tokens_generated: u64,
    pub tts_chars_generated: u64,
}

impl UsageReport {
    pub fn audio_secs(secs: f64) -> Self {
        Self {
            audio_secs_processed: secs,
            ..Default::default()
        }
    }

    pub fn llm_tokens(count: u64) -> Self {
        Self {
            llm_tokens_generated: count,
            ..Default::default()
        }
    }

    pub fn tts_chars(count: u64) -> Self {
        Self {
            tts_chars_generated: count,
            ..Default::default()
        }
    }
}

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Barge-in: stop the current reply
    Interrupt,
    #[serde(other)]
    Unknown,
}

impl ClientMessage {
    /// Parse a text frame. Malformed JSON yields `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_server_message_shapes() {
        let msg = serde_json::to_value(ServerMessage::transcript("hello")).unwrap();
        assert_eq!(msg, json!({"type": "transcript", "text": "hello"}));

        let msg = serde_json::to_value(ServerMessage::text_chunk(" there")).unwrap();
        assert_eq!(msg, json!({"type": "text_chunk", "text": " there"}));

        let msg = serde_json::to_value(ServerMessage::latency(
            LatencyMetric::LlmFirstTokenMs,
            Duration::from_micros(412_900),
        ))
        .unwrap();
        assert_eq!(msg, json!({"type": "latency", "data": {"llm_first_token_ms": 412}}));
    }

    #[test]
    fn test_telemetry_shape() {
        let msg = serde_json::to_value(ServerMessage::usage(UsageReport::tts_chars(12))).unwrap();
        assert_eq!(
            msg,
            json!({
                "type": "telemetry",
                "data": {
                    "audio_secs_processed": 0.0,
                    "llm_tokens_generated": 0,
                    "tts_chars_generated": 12
                }
            })
        );
    }

    #[test]
    fn test_client_message_parsing() {
        assert_eq!(
            ClientMessage::parse(r#"{"type":"interrupt"}"#),
            Some(ClientMessage::Interrupt)
        );
        assert_eq!(
            ClientMessage::parse(r#"{"type":"config","rate":16000}"#),
            Some(ClientMessage::Unknown)
        );
        assert_eq!(ClientMessage::parse("not json"), None);
        assert_eq!(ClientMessage::parse(r#"{"kind":"interrupt"}"#), None);
    }

    #[test]
    fn test_latency_keys() {
        assert_eq!(LatencyMetric::SttMs.key(), "stt_ms");
        assert_eq!(LatencyMetric::TtsFirstChunkMs.key(), "tts_first_chunk_ms");
        assert_eq!(LatencyMetric::E2eMs.key(), "e2e_ms");
    }
}
