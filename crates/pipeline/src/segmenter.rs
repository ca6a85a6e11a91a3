//! Utterance segmentation
//!
//! Audio chunks are appended to the session buffer as they arrive. When no
//! chunk arrives within the poll timeout and the buffer holds at least the
//! minimum utterance length, the whole buffer is taken as one utterance.
//! Reading and clearing happen under the same lock, so no chunk is ever
//! dropped or transcribed twice.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use voice_duplex_core::audio::pcm16_duration_secs;

/// One finalized span of user audio
#[derive(Debug, Clone)]
pub struct Utterance {
    /// PCM16 mono 16kHz, in arrival order
    pub pcm: Vec<u8>,
    /// When the first byte of this span was buffered
    pub started_at: Instant,
    pub finalized_at: Instant,
}

impl Utterance {
    pub fn duration_secs(&self) -> f64 {
        pcm16_duration_secs(self.pcm.len())
    }
}

#[derive(Debug, Default)]
struct BufferState {
    bytes: Vec<u8>,
    started_at: Option<Instant>,
}

/// Shared accumulation buffer for a session
#[derive(Debug, Clone, Default)]
pub struct UtteranceBuffer {
    inner: Arc<Mutex<BufferState>>,
}

impl UtteranceBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, chunk: &[u8]) {
        if chunk.is_empty() {
            return;
        }
        let mut state = self.inner.lock();
        if state.started_at.is_none() {
            state.started_at = Some(Instant::now());
        }
        state.bytes.extend_from_slice(chunk);
    }

    /// Take the whole buffer if it holds at least `min_bytes`
    pub fn take_if_at_least(&self, min_bytes: usize) -> Option<Utterance> {
        let mut state = self.inner.lock();
        if state.bytes.is_empty() || state.bytes.len() < min_bytes {
            return None;
        }
        let now = Instant::now();
        let pcm = std::mem::take(&mut state.bytes);
        let started_at = state.started_at.take().unwrap_or(now);
        Some(Utterance {
            pcm,
            started_at,
            finalized_at: now,
        })
    }

    pub fn clear(&self) {
        let mut state = self.inner.lock();
        state.bytes.clear();
        state.started_at = None;
    }

    pub fn len(&self) -> usize {
        self.inner.lock().bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Turns an ingest queue into a sequence of utterances
#[derive(Debug, Clone)]
pub struct UtteranceSegmenter {
    buffer: UtteranceBuffer,
    poll_timeout: Duration,
    min_bytes: usize,
}

impl UtteranceSegmenter {
    pub fn new(buffer: UtteranceBuffer, poll_timeout: Duration, min_bytes: usize) -> Self {
        Self {
            buffer,
            poll_timeout,
            min_bytes,
        }
    }

    pub fn buffer(&self) -> &UtteranceBuffer {
        &self.buffer
    }

    /// Wait for the next utterance.
    ///
    /// Returns `None` once the queue is closed; audio still buffered at that
    /// point is discarded.
    pub async fn next_utterance(&self, rx: &mut mpsc::Receiver<Vec<u8>>) -> Option<Utterance> {
        loop {
            match tokio::time::timeout(self.poll_timeout, rx.recv()).await {
                Ok(Some(chunk)) => self.buffer.append(&chunk),
                Ok(None) => return None,
                Err(_) => {
                    if let Some(utterance) = self.buffer.take_if_at_least(self.min_bytes) {
                        return Some(utterance);
                    }
                }
            }
        }
    }
}
