//! Barge-in and turn cancellation
//!
//! Every turn gets its own [`TurnToken`]. Starting a new turn or receiving an
//! interrupt cancels the current token; the generation task races its work
//! against that cancellation and also polls [`TurnToken::should_stop`] at
//! each token, sentence and audio frame. Because tokens are never reused,
//! a stale turn cannot observe a later turn's state.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Where the session is in its reply cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnPhase {
    /// No reply has started, or the session is shutting down
    Idle,
    /// A reply is streaming or being synthesized
    Generating,
    /// The last reply was cut short
    Interrupted,
    /// The last reply ran to completion
    Completed,
}

#[derive(Debug)]
struct TurnState {
    seq: u64,
    started_at: Instant,
    cancel: CancellationToken,
    interrupted: AtomicBool,
    first_audio_sent: AtomicBool,
}

/// Handle to one turn's cancellation state
#[derive(Debug, Clone)]
pub struct TurnToken {
    state: Arc<TurnState>,
    current_seq: Arc<AtomicU64>,
}

impl TurnToken {
    fn new(seq: u64, started_at: Instant, current_seq: Arc<AtomicU64>) -> Self {
        Self {
            state: Arc::new(TurnState {
                seq,
                started_at,
                cancel: CancellationToken::new(),
                interrupted: AtomicBool::new(false),
                first_audio_sent: AtomicBool::new(false),
            }),
            current_seq,
        }
    }

    /// A token that is not tracked by any controller
    pub fn detached(started_at: Instant) -> Self {
        Self::new(0, started_at, Arc::new(AtomicU64::new(0)))
    }

    pub fn seq(&self) -> u64 {
        self.state.seq
    }

    /// When the user's utterance for this turn started arriving
    pub fn started_at(&self) -> Instant {
        self.state.started_at
    }

    pub fn is_interrupted(&self) -> bool {
        self.state.interrupted.load(Ordering::Acquire)
    }

    /// A newer turn has started since this one
    pub fn is_superseded(&self) -> bool {
        self.current_seq.load(Ordering::Acquire) != self.state.seq
    }

    /// True once this turn must produce no further output
    pub fn should_stop(&self) -> bool {
        self.is_interrupted() || self.state.cancel.is_cancelled() || self.is_superseded()
    }

    /// Resolves when the turn is cancelled
    pub async fn cancelled(&self) {
        self.state.cancel.cancelled().await
    }

    /// Returns true exactly once per turn, for the first outbound audio frame
    pub fn claim_first_audio(&self) -> bool {
        !self.state.first_audio_sent.swap(true, Ordering::AcqRel)
    }

    pub fn interrupt(&self) {
        self.state.interrupted.store(true, Ordering::Release);
        self.state.cancel.cancel();
    }
}

#[derive(Debug)]
struct ControllerState {
    turn: Option<TurnToken>,
    task: Option<JoinHandle<()>>,
    phase: TurnPhase,
}

/// Owns the at-most-one live generation task of a session
#[derive(Debug)]
pub struct InterruptController {
    current_seq: Arc<AtomicU64>,
    state: Mutex<ControllerState>,
}

impl Default for InterruptController {
    fn default() -> Self {
        Self::new()
    }
}

impl InterruptController {
    pub fn new() -> Self {
        Self {
            current_seq: Arc::new(AtomicU64::new(0)),
            state: Mutex::new(ControllerState {
                turn: None,
                task: None,
                phase: TurnPhase::Idle,
            }),
        }
    }

    /// Cancel whatever is running and mint the token for a new turn
    pub fn begin_turn(&self, started_at: Instant) -> TurnToken {
        let mut state = self.state.lock();

        if let Some(previous) = state.turn.take() {
            if state.phase == TurnPhase::Generating {
                tracing::debug!(turn = previous.seq(), "New utterance preempts running turn");
            }
            previous.interrupt();
        }
        // the cancelled task exits at its next suspension point
        state.task = None;

        let seq = self.current_seq.fetch_add(1, Ordering::AcqRel) + 1;
        let token = TurnToken::new(seq, started_at, self.current_seq.clone());
        state.turn = Some(token.clone());
        state.phase = TurnPhase::Generating;
        token
    }

    /// Retain the task running `turn`, unless a newer turn already exists
    pub fn attach(&self, turn: &TurnToken, task: JoinHandle<()>) {
        let mut state = self.state.lock();
        match &state.turn {
            Some(current) if current.seq() == turn.seq() => state.task = Some(task),
            _ => task.abort(),
        }
    }

    /// Barge-in. Returns false when nothing was running.
    pub fn interrupt(&self) -> bool {
        let mut state = self.state.lock();
        if state.phase != TurnPhase::Generating {
            return false;
        }
        if let Some(turn) = &state.turn {
            turn.interrupt();
        }
        state.phase = TurnPhase::Interrupted;
        true
    }

    /// Mark `turn` finished. Ignored if a newer turn has started.
    pub fn finish(&self, turn: &TurnToken) {
        let mut state = self.state.lock();
        let is_current = matches!(&state.turn, Some(current) if current.seq() == turn.seq());
        if is_current && state.phase == TurnPhase::Generating {
            state.phase = if turn.should_stop() {
                TurnPhase::Interrupted
            } else {
                TurnPhase::Completed
            };
            state.task = None;
        }
    }

    pub fn phase(&self) -> TurnPhase {
        self.state.lock().phase
    }

    /// Take the handle of the running task, e.g. to await it
    pub fn take_task(&self) -> Option<JoinHandle<()>> {
        self.state.lock().task.take()
    }

    /// Cancel everything and return to idle
    pub fn shutdown(&self) {
        let mut state = self.state.lock();
        if let Some(turn) = state.turn.take() {
            turn.interrupt();
        }
        if let Some(task) = state.task.take() {
            task.abort();
        }
        state.phase = TurnPhase::Idle;
    }
}
