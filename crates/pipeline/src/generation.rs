//! Streaming reply generation for one turn
//!
//! Tokens are forwarded to the client as they arrive and accumulated into
//! sentences; each closed sentence is synthesized before the next token is
//! read, so audio always follows generation order.

use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use voice_duplex_core::{Error, LanguageModel, LatencyMetric, ServerMessage, UsageReport};

use crate::interrupt::TurnToken;
use crate::sentence::SentenceAccumulator;
use crate::sink::{Outbound, SessionSink};
use crate::synthesis::{SpeakOutcome, SynthesisDispatcher};
use crate::telemetry::TelemetryEmitter;

/// How a turn ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationOutcome {
    Completed,
    /// Barge-in, a newer utterance, or the client went away
    Interrupted,
    /// The generation backend failed
    Failed,
}

#[derive(Clone)]
pub struct GenerationPipeline {
    llm: Arc<dyn LanguageModel>,
    dispatcher: SynthesisDispatcher,
    sink: SessionSink,
    telemetry: TelemetryEmitter,
}

impl GenerationPipeline {
    pub fn new(
        llm: Arc<dyn LanguageModel>,
        dispatcher: SynthesisDispatcher,
        sink: SessionSink,
        telemetry: TelemetryEmitter,
    ) -> Self {
        Self {
            llm,
            dispatcher,
            sink,
            telemetry,
        }
    }

    /// Run one turn to completion or cancellation
    pub async fn run(&self, turn: TurnToken, prompt: String) -> GenerationOutcome {
        let outcome = tokio::select! {
            biased;
            _ = turn.cancelled() => GenerationOutcome::Interrupted,
            outcome = self.drive(&turn, &prompt) => outcome,
        };

        match outcome {
            GenerationOutcome::Interrupted => {
                tracing::debug!(turn = turn.seq(), "Turn interrupted by barge-in")
            }
            GenerationOutcome::Completed => tracing::debug!(turn = turn.seq(), "Turn complete"),
            GenerationOutcome::Failed => {}
        }
        outcome
    }

    async fn drive(&self, turn: &TurnToken, prompt: &str) -> GenerationOutcome {
        let requested_at = Instant::now();
        let mut stream = match self.llm.stream_reply(prompt).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(turn = turn.seq(), model = self.llm.model_name(), error = %e, "Generation request failed");
                return GenerationOutcome::Failed;
            }
        };

        let mut sentences = SentenceAccumulator::new();
        let mut tokens_since_flush: u64 = 0;
        let mut first_token_seen = false;

        while let Some(item) = stream.next().await {
            if turn.should_stop() || self.sink.is_closed() {
                return GenerationOutcome::Interrupted;
            }

            let token = match item {
                Ok(token) => token,
                Err(e) => {
                    tracing::warn!(turn = turn.seq(), error = %e, "Generation stream failed");
                    return GenerationOutcome::Failed;
                }
            };
            if token.is_empty() {
                continue;
            }

            tokens_since_flush += 1;
            if !first_token_seen {
                first_token_seen = true;
                self.telemetry
                    .turn_latency(turn, LatencyMetric::LlmFirstTokenMs, requested_at.elapsed())
                    .await;
            }

            let chunk = Outbound::Json(ServerMessage::text_chunk(token.as_str()));
            if let Err(Error::Interrupted) = self.sink.send_for_turn(turn, chunk).await {
                return GenerationOutcome::Interrupted;
            }

            if let Some(unit) = sentences.push(&token) {
                if self.dispatcher.speak(turn, &unit).await == SpeakOutcome::Interrupted {
                    return GenerationOutcome::Interrupted;
                }
                self.telemetry
                    .turn_usage(turn, UsageReport::llm_tokens(tokens_since_flush))
                    .await;
                tokens_since_flush = 0;
            }
        }

        if turn.should_stop() {
            return GenerationOutcome::Interrupted;
        }
        if let Some(unit) = sentences.flush() {
            if self.dispatcher.speak(turn, &unit).await == SpeakOutcome::Interrupted {
                return GenerationOutcome::Interrupted;
            }
        }
        if tokens_since_flush > 0 {
            self.telemetry
                .turn_usage(turn, UsageReport::llm_tokens(tokens_since_flush))
                .await;
        }

        GenerationOutcome::Completed
    }
}
