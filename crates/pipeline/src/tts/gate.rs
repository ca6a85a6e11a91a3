//! Process-wide synthesis lock
//!
//! The mutex owns the engine. A call takes the owned guard and moves it into
//! the blocking task, so the lock is held until the engine returns even if
//! the caller stops waiting. At most one synthesis runs at any instant,
//! across all sessions.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use voice_duplex_core::{Error, Result, SpeechSegment, SpeechSynthesizer};

#[derive(Clone)]
pub struct SynthesisGate {
    engine: Arc<Mutex<Box<dyn SpeechSynthesizer>>>,
    sample_rate: u32,
    model: Arc<str>,
}

impl std::fmt::Debug for SynthesisGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SynthesisGate")
            .field("model", &self.model)
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}

impl SynthesisGate {
    pub fn new(engine: Box<dyn SpeechSynthesizer>) -> Self {
        let sample_rate = engine.sample_rate();
        let model: Arc<str> = Arc::from(engine.model_name());
        Self {
            engine: Arc::new(Mutex::new(engine)),
            sample_rate,
            model,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }

    /// Synthesize one sentence, waiting for the engine if it is busy
    pub async fn synthesize(&self, text: &str) -> Result<Vec<SpeechSegment>> {
        let waited = Instant::now();
        let mut engine = self.engine.clone().lock_owned().await;
        let wait = waited.elapsed();
        if wait > Duration::from_millis(100) {
            tracing::debug!(wait_ms = wait.as_millis() as u64, "Waited for synthesis engine");
        }
        metrics::histogram!("voice_tts_lock_wait_ms").record(wait.as_secs_f64() * 1000.0);

        let text = text.to_string();
        tokio::task::spawn_blocking(move || engine.synthesize(&text))
            .await
            .map_err(|e| Error::Tts(format!("Synthesis task failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counters {
        in_flight: AtomicUsize,
        max_seen: AtomicUsize,
        calls: AtomicUsize,
    }

    struct SlowEngine {
        counters: Arc<Counters>,
        delay: Duration,
    }

    impl SpeechSynthesizer for SlowEngine {
        fn synthesize(&mut self, text: &str) -> Result<Vec<SpeechSegment>> {
            let now = self.counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.counters.max_seen.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            self.counters.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.counters.calls.fetch_add(1, Ordering::SeqCst);
            if text == "fail" {
                return Err(Error::Tts("boom".into()));
            }
            Ok(vec![SpeechSegment::new(vec![0.1; 4])])
        }

        fn sample_rate(&self) -> u32 {
            24_000
        }

        fn model_name(&self) -> &str {
            "slow"
        }
    }

    fn gate(delay: Duration) -> (SynthesisGate, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        let engine = SlowEngine {
            counters: counters.clone(),
            delay,
        };
        (SynthesisGate::new(Box::new(engine)), counters)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_calls_never_overlap() {
        let (gate, counters) = gate(Duration::from_millis(20));

        let tasks: Vec<_> = (0..6)
            .map(|i| {
                let gate = gate.clone();
                tokio::spawn(async move { gate.synthesize(&format!("sentence {}.", i)).await })
            })
            .collect();
        for task in tasks {
            assert!(task.await.unwrap().is_ok());
        }

        assert_eq!(counters.calls.load(Ordering::SeqCst), 6);
        assert_eq!(counters.max_seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_abandoned_call_still_holds_lock() {
        let (gate, counters) = gate(Duration::from_millis(150));

        // caller gives up long before the engine returns
        let abandoned = tokio::time::timeout(Duration::from_millis(10), gate.synthesize("first.")).await;
        assert!(abandoned.is_err());

        assert!(gate.synthesize("second.").await.is_ok());
        assert_eq!(counters.max_seen.load(Ordering::SeqCst), 1);
        assert_eq!(counters.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_engine_error_propagates() {
        let (gate, _) = gate(Duration::from_millis(1));
        assert!(matches!(gate.synthesize("fail").await, Err(Error::Tts(_))));
        assert_eq!(gate.sample_rate(), 24_000);
        assert_eq!(gate.model_name(), "slow");
    }
}
