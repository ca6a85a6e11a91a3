//! Sentence-to-audio dispatch
//!
//! Synthesizes one sentence through the shared gate and streams its segments
//! to the client as PCM16 frames, checking the turn before every frame.

use std::time::Instant;

use voice_duplex_core::audio::samples_to_pcm16;
use voice_duplex_core::{LatencyMetric, UsageReport};

use crate::interrupt::TurnToken;
use crate::sentence::SentenceUnit;
use crate::sink::{Outbound, SessionSink};
use crate::telemetry::TelemetryEmitter;
use crate::tts::SynthesisGate;

/// What happened to one sentence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeakOutcome {
    /// All frames were sent
    Spoken { frames: usize },
    /// Blank text or the turn was already stopped; nothing was synthesized
    Skipped,
    /// The turn stopped partway; remaining frames were dropped
    Interrupted,
    /// The engine failed; this sentence produced no audio
    Failed,
}

#[derive(Debug, Clone)]
pub struct SynthesisDispatcher {
    gate: SynthesisGate,
    sink: SessionSink,
    telemetry: TelemetryEmitter,
}

impl SynthesisDispatcher {
    pub fn new(gate: SynthesisGate, sink: SessionSink, telemetry: TelemetryEmitter) -> Self {
        Self {
            gate,
            sink,
            telemetry,
        }
    }

    pub async fn speak(&self, turn: &TurnToken, unit: &SentenceUnit) -> SpeakOutcome {
        let text = unit.speakable();
        if text.is_empty() || turn.should_stop() {
            return SpeakOutcome::Skipped;
        }

        let submitted = Instant::now();
        let segments = match self.gate.synthesize(text).await {
            Ok(segments) => segments,
            Err(e) => {
                tracing::warn!(
                    turn = turn.seq(),
                    sentence = unit.index,
                    error = %e,
                    "Synthesis failed, skipping sentence"
                );
                return SpeakOutcome::Failed;
            }
        };

        let mut frames = 0;
        for segment in segments {
            if turn.should_stop() {
                tracing::debug!(turn = turn.seq(), sentence = unit.index, frames, "Audio cut by interrupt");
                return SpeakOutcome::Interrupted;
            }
            if segment.is_empty() {
                continue;
            }

            if frames == 0 {
                self.telemetry
                    .turn_latency(turn, LatencyMetric::TtsFirstChunkMs, submitted.elapsed())
                    .await;
                self.telemetry
                    .turn_usage(turn, UsageReport::tts_chars(text.chars().count() as u64))
                    .await;
                if turn.claim_first_audio() {
                    self.telemetry
                        .turn_latency(turn, LatencyMetric::E2eMs, turn.started_at().elapsed())
                        .await;
                }
            }

            let frame = Outbound::Audio(samples_to_pcm16(&segment.samples));
            if self.sink.send_for_turn(turn, frame).await.is_err() {
                return SpeakOutcome::Interrupted;
            }
            frames += 1;
        }

        SpeakOutcome::Spoken { frames }
    }
}
