//! Per-connection session orchestration
//!
//! A session owns the utterance buffer, the ingest task that segments and
//! transcribes audio, and the interrupt controller holding the at-most-one
//! live generation task. Collaborators are injected once per process as
//! [`VoiceServices`] and shared by every session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use voice_duplex_config::Settings;
use voice_duplex_core::audio::pcm16_to_wav;
use voice_duplex_core::{
    ClientMessage, Error, LanguageModel, LatencyMetric, Result, ServerMessage, SpeechToText,
    UsageReport,
};

use crate::generation::GenerationPipeline;
use crate::interrupt::{InterruptController, TurnPhase};
use crate::segmenter::{Utterance, UtteranceBuffer, UtteranceSegmenter};
use crate::sink::SessionSink;
use crate::synthesis::SynthesisDispatcher;
use crate::telemetry::TelemetryEmitter;
use crate::tts::SynthesisGate;

/// Process-wide collaborators
#[derive(Clone)]
pub struct VoiceServices {
    pub stt: Arc<dyn SpeechToText>,
    pub llm: Arc<dyn LanguageModel>,
    /// Shared by all sessions; serializes synthesis
    pub tts: SynthesisGate,
}

/// Per-session tunables
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub poll_timeout: Duration,
    pub min_utterance_bytes: usize,
    pub ingest_queue_capacity: usize,
    pub stt_timeout: Duration,
    pub barge_in_enabled: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

impl SessionOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            poll_timeout: Duration::from_millis(settings.segmenter.poll_timeout_ms),
            min_utterance_bytes: settings.segmenter.min_utterance_bytes,
            ingest_queue_capacity: settings.segmenter.ingest_queue_capacity,
            stt_timeout: Duration::from_millis(settings.stt.timeout_ms),
            barge_in_enabled: settings.session.barge_in_enabled,
        }
    }
}

pub struct VoiceSession {
    id: String,
    created_at: Instant,
    audio_tx: Mutex<Option<mpsc::Sender<Vec<u8>>>>,
    buffer: UtteranceBuffer,
    interrupts: Arc<InterruptController>,
    sink: SessionSink,
    running: Arc<AtomicBool>,
    barge_in_enabled: bool,
    ingest_task: Mutex<Option<JoinHandle<()>>>,
}

impl VoiceSession {
    /// Create the session and spawn its ingest task
    pub fn start(
        id: impl Into<String>,
        services: VoiceServices,
        options: SessionOptions,
        sink: SessionSink,
    ) -> Arc<Self> {
        let id = id.into();
        let (audio_tx, audio_rx) = mpsc::channel(options.ingest_queue_capacity.max(1));

        let buffer = UtteranceBuffer::new();
        let interrupts = Arc::new(InterruptController::new());
        let running = Arc::new(AtomicBool::new(true));

        let telemetry = TelemetryEmitter::new(id.as_str(), sink.clone());
        let dispatcher = SynthesisDispatcher::new(services.tts.clone(), sink.clone(), telemetry.clone());
        let generation =
            GenerationPipeline::new(services.llm.clone(), dispatcher, sink.clone(), telemetry.clone());

        let ingest = IngestLoop {
            session_id: id.clone(),
            segmenter: UtteranceSegmenter::new(
                buffer.clone(),
                options.poll_timeout,
                options.min_utterance_bytes,
            ),
            stt: services.stt.clone(),
            stt_timeout: options.stt_timeout,
            generation,
            interrupts: interrupts.clone(),
            sink: sink.clone(),
            telemetry,
            running: running.clone(),
        };
        let ingest_task = tokio::spawn(ingest.run(audio_rx));

        tracing::info!(
            session_id = %id,
            stt = services.stt.model_name(),
            llm = services.llm.model_name(),
            tts = services.tts.model_name(),
            "Voice session started"
        );

        Arc::new(Self {
            id,
            created_at: Instant::now(),
            audio_tx: Mutex::new(Some(audio_tx)),
            buffer,
            interrupts,
            sink,
            running,
            barge_in_enabled: options.barge_in_enabled,
            ingest_task: Mutex::new(Some(ingest_task)),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn phase(&self) -> TurnPhase {
        self.interrupts.phase()
    }

    /// Queue one inbound audio chunk
    pub async fn push_audio(&self, chunk: Vec<u8>) -> Result<()> {
        let tx = self.audio_tx.lock().clone();
        match tx {
            Some(tx) => tx.send(chunk).await.map_err(|_| Error::ConnectionClosed),
            None => Err(Error::ConnectionClosed),
        }
    }

    /// Handle one inbound text frame. Unknown or malformed messages are ignored.
    pub fn handle_control(&self, raw: &str) {
        match ClientMessage::parse(raw) {
            Some(ClientMessage::Interrupt) => {
                self.interrupt();
            }
            Some(ClientMessage::Unknown) => {
                tracing::debug!(session_id = %self.id, "Ignoring unknown control message");
            }
            None => {
                tracing::debug!(session_id = %self.id, "Ignoring malformed control message");
            }
        }
    }

    /// Barge-in: drop buffered audio and stop the current reply.
    ///
    /// Returns true if a reply was actually cut short.
    pub fn interrupt(&self) -> bool {
        if !self.barge_in_enabled {
            tracing::debug!(session_id = %self.id, "Barge-in disabled, ignoring interrupt");
            return false;
        }

        self.buffer.clear();
        let stopped = self.interrupts.interrupt();
        if stopped {
            tracing::info!(session_id = %self.id, "Interrupted by barge-in");
            metrics::counter!("voice_barge_in_total").increment(1);
        }
        stopped
    }

    /// Wait for the current generation task, if any, to finish
    pub async fn wait_for_turn(&self) {
        if let Some(task) = self.interrupts.take_task() {
            let _ = task.await;
        }
    }

    /// Tear down after disconnect. Idempotent.
    pub async fn close(&self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }

        self.audio_tx.lock().take();
        self.interrupts.shutdown();
        self.sink.close();
        self.buffer.clear();

        let ingest = self.ingest_task.lock().take();
        if let Some(task) = ingest {
            task.abort();
            let _ = task.await;
        }

        tracing::info!(
            session_id = %self.id,
            duration_secs = self.age().as_secs(),
            "Voice session closed"
        );
    }
}

impl Drop for VoiceSession {
    fn drop(&mut self) {
        self.interrupts.shutdown();
        if let Some(task) = self.ingest_task.get_mut().take() {
            task.abort();
        }
    }
}

/// Segmentation and transcription, one utterance at a time
struct IngestLoop {
    session_id: String,
    segmenter: UtteranceSegmenter,
    stt: Arc<dyn SpeechToText>,
    stt_timeout: Duration,
    generation: GenerationPipeline,
    interrupts: Arc<InterruptController>,
    sink: SessionSink,
    telemetry: TelemetryEmitter,
    running: Arc<AtomicBool>,
}

impl IngestLoop {
    async fn run(self, mut audio_rx: mpsc::Receiver<Vec<u8>>) {
        while let Some(utterance) = self.segmenter.next_utterance(&mut audio_rx).await {
            if !self.running.load(Ordering::Acquire) {
                break;
            }
            self.handle_utterance(utterance).await;
        }
        tracing::debug!(session_id = %self.session_id, "Ingest loop finished");
    }

    async fn handle_utterance(&self, utterance: Utterance) {
        let audio_secs = utterance.duration_secs();
        let wav = match pcm16_to_wav(&utterance.pcm) {
            Ok(wav) => wav,
            Err(e) => {
                tracing::warn!(session_id = %self.session_id, error = %e, "Failed to encode utterance");
                return;
            }
        };

        let text = match tokio::time::timeout(self.stt_timeout, self.stt.transcribe(wav)).await {
            Ok(Ok(text)) => text.trim().to_string(),
            Ok(Err(e)) => {
                tracing::warn!(session_id = %self.session_id, error = %e, "Transcription failed");
                return;
            }
            Err(_) => {
                tracing::warn!(
                    session_id = %self.session_id,
                    error = %Error::Timeout(self.stt_timeout.as_millis() as u64),
                    "Transcription failed"
                );
                return;
            }
        };
        let stt_elapsed = utterance.finalized_at.elapsed();

        if text.is_empty() {
            tracing::debug!(session_id = %self.session_id, audio_secs, "Empty transcription, ignoring");
            return;
        }
        if !self.running.load(Ordering::Acquire) || self.sink.is_closed() {
            return;
        }

        // new speech preempts whatever reply is still running; nothing from
        // the old turn may reach the client after this transcript
        let turn = {
            let _order = self.sink.ordered().await;
            let turn = self.interrupts.begin_turn(utterance.started_at);
            let _ = self.sink.send_json(ServerMessage::transcript(text.as_str())).await;
            turn
        };
        tracing::info!(
            session_id = %self.session_id,
            turn = turn.seq(),
            audio_secs,
            text = %text,
            "User utterance transcribed"
        );

        self.telemetry.latency(LatencyMetric::SttMs, stt_elapsed).await;
        self.telemetry.usage(UsageReport::audio_secs(audio_secs)).await;

        let generation = self.generation.clone();
        let interrupts = self.interrupts.clone();
        let task_turn = turn.clone();
        let task = tokio::spawn(async move {
            generation.run(task_turn.clone(), text).await;
            interrupts.finish(&task_turn);
        });
        self.interrupts.attach(&turn, task);
    }
}
