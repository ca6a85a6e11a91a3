//! Centralized defaults for the voice server
//!
//! Audio framing, hosted endpoints and the conversational instruction live
//! here so that settings defaults and backends agree on the same values.

/// Inbound and outbound audio framing
pub mod audio {
    /// Client capture rate (Hz)
    pub const INPUT_SAMPLE_RATE: u32 = 16_000;

    /// Bytes per second of 16kHz mono PCM16
    pub const INPUT_BYTES_PER_SEC: usize = 32_000;

    /// Shortest utterance worth transcribing: 0.5s of input audio
    pub const MIN_UTTERANCE_BYTES: usize = 16_000;

    /// Default synthesis output rate (Hz)
    pub const OUTPUT_SAMPLE_RATE: u32 = 24_000;
}

/// Segmentation and session timing
pub mod timing {
    /// Silence after which buffered audio is treated as a finished utterance
    pub const POLL_TIMEOUT_MS: u64 = 800;

    /// Upper bound on one transcription call
    pub const STT_TIMEOUT_MS: u64 = 10_000;

    /// Upper bound on one generation request
    pub const LLM_TIMEOUT_MS: u64 = 30_000;

    /// Upper bound on one synthesis call
    pub const TTS_TIMEOUT_MS: u64 = 15_000;
}

/// Hosted service endpoints
pub mod endpoints {
    /// OpenAI-compatible API base used for both transcription and chat
    pub const GROQ_API_BASE: &str = "https://api.groq.com/openai/v1";

    /// Local synthesis sidecar
    pub const TTS_SIDECAR: &str = "http://127.0.0.1:8880";

    /// Environment variable holding the hosted API key
    pub const API_KEY_ENV: &str = "GROQ_API_KEY";
}

/// Model defaults
pub mod models {
    pub const STT_MODEL: &str = "whisper-large-v3-turbo";
    pub const LLM_MODEL: &str = "llama-3.3-70b-versatile";
    pub const LLM_MAX_TOKENS: u32 = 150;
    pub const TTS_VOICE: &str = "af_heart";
    pub const TTS_SPEED: f32 = 1.1;
}

/// Conversational instruction sent with every generation request
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a conversational human-like voice assistant. \
You MUST start your response with filler words according to the text, such as 'Well.', 'Okay.' \
'let me think'. Keep all subsequent sentences short but human like. \
Never write a sentence longer than 30 words. Speak all the filler words with humanness, \
take appropriate pauses like humans and basically converse naturally.";
