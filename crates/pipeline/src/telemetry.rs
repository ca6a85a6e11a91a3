//! Latency and usage reporting
//!
//! Every event goes three ways: a JSON message to the client, the `metrics`
//! recorder, and a debug log line. Client delivery is best effort.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use voice_duplex_core::{LatencyMetric, ServerMessage, UsageReport};

use crate::interrupt::TurnToken;
use crate::sink::{Outbound, SessionSink};

/// What was observed
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryKind {
    Latency {
        metric: LatencyMetric,
        elapsed: Duration,
    },
    Usage(UsageReport),
}

/// A timestamped observation
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryEvent {
    pub at: SystemTime,
    pub kind: TelemetryKind,
}

impl TelemetryEvent {
    pub fn latency(metric: LatencyMetric, elapsed: Duration) -> Self {
        Self {
            at: SystemTime::now(),
            kind: TelemetryKind::Latency { metric, elapsed },
        }
    }

    pub fn usage(report: UsageReport) -> Self {
        Self {
            at: SystemTime::now(),
            kind: TelemetryKind::Usage(report),
        }
    }

    pub fn to_message(&self) -> ServerMessage {
        match &self.kind {
            TelemetryKind::Latency { metric, elapsed } => ServerMessage::latency(*metric, *elapsed),
            TelemetryKind::Usage(report) => ServerMessage::usage(*report),
        }
    }
}

/// Per-session telemetry emitter
#[derive(Debug, Clone)]
pub struct TelemetryEmitter {
    session_id: Arc<str>,
    sink: SessionSink,
}

impl TelemetryEmitter {
    pub fn new(session_id: impl Into<Arc<str>>, sink: SessionSink) -> Self {
        Self {
            session_id: session_id.into(),
            sink,
        }
    }

    pub async fn latency(&self, metric: LatencyMetric, elapsed: Duration) {
        self.emit(TelemetryEvent::latency(metric, elapsed)).await;
    }

    pub async fn usage(&self, report: UsageReport) {
        self.emit(TelemetryEvent::usage(report)).await;
    }

    pub async fn turn_latency(&self, turn: &TurnToken, metric: LatencyMetric, elapsed: Duration) {
        self.emit_for_turn(turn, TelemetryEvent::latency(metric, elapsed))
            .await;
    }

    pub async fn turn_usage(&self, turn: &TurnToken, report: UsageReport) {
        self.emit_for_turn(turn, TelemetryEvent::usage(report)).await;
    }

    /// Record and forward one event. Never fails.
    pub async fn emit(&self, event: TelemetryEvent) {
        self.observe(&event);
        // closed connections are expected here
        let _ = self.sink.send_json(event.to_message()).await;
    }

    /// Like [`emit`](Self::emit), but the client message is dropped once
    /// `turn` has been cancelled.
    pub async fn emit_for_turn(&self, turn: &TurnToken, event: TelemetryEvent) {
        self.observe(&event);
        let _ = self
            .sink
            .send_for_turn(turn, Outbound::Json(event.to_message()))
            .await;
    }

    fn observe(&self, event: &TelemetryEvent) {
        record(event);

        match &event.kind {
            TelemetryKind::Latency { metric, elapsed } => tracing::debug!(
                session_id = %self.session_id,
                stage = metric.key(),
                ms = elapsed.as_millis() as u64,
                "Stage latency"
            ),
            TelemetryKind::Usage(report) => tracing::debug!(
                session_id = %self.session_id,
                audio_secs = report.audio_secs_processed,
                llm_tokens = report.llm_tokens_generated,
                tts_chars = report.tts_chars_generated,
                "Usage"
            ),
        }
    }
}

fn record(event: &TelemetryEvent) {
    match &event.kind {
        TelemetryKind::Latency { metric, elapsed } => {
            metrics::histogram!("voice_stage_latency_ms", "stage" => metric.key())
                .record(elapsed.as_secs_f64() * 1000.0);
        }
        TelemetryKind::Usage(report) => {
            if report.audio_secs_processed > 0.0 {
                metrics::counter!("voice_audio_milliseconds_total")
                    .increment((report.audio_secs_processed * 1000.0) as u64);
            }
            if report.llm_tokens_generated > 0 {
                metrics::counter!("voice_llm_tokens_total").increment(report.llm_tokens_generated);
            }
            if report.tts_chars_generated > 0 {
                metrics::counter!("voice_tts_chars_total").increment(report.tts_chars_generated);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn test_latency_forwarded_to_client() {
        let (sink, mut rx) = SessionSink::channel(4);
        let telemetry = TelemetryEmitter::new("s1", sink);

        telemetry
            .latency(LatencyMetric::SttMs, Duration::from_millis(231))
            .await;

        match rx.recv().await {
            Some(Outbound::Json(ServerMessage::Latency { data })) => {
                assert_eq!(data.get("stt_ms"), Some(&231));
                assert_eq!(data.len(), 1);
            }
            other => panic!("unexpected outbound: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_emit_survives_closed_connection() {
        let (sink, rx) = SessionSink::channel(4);
        drop(rx);
        let telemetry = TelemetryEmitter::new("s1", sink.clone());

        telemetry.usage(UsageReport::llm_tokens(7)).await;
        telemetry.usage(UsageReport::tts_chars(3)).await;
        assert!(sink.is_closed());
    }

    #[tokio::test]
    async fn test_turn_scoped_event_dropped_after_interrupt() {
        let (sink, mut rx) = SessionSink::channel(4);
        let telemetry = TelemetryEmitter::new("s1", sink);
        let turn = TurnToken::detached(Instant::now());
        turn.interrupt();

        telemetry
            .turn_latency(&turn, LatencyMetric::E2eMs, Duration::from_millis(900))
            .await;
        assert!(rx.try_recv().is_err());
    }
}
