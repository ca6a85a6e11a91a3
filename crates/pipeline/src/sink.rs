//! Outbound side of a session
//!
//! Text messages and audio frames share one ordered channel drained by the
//! transport's writer task, so a client always sees a sentence's text chunks
//! and its audio in generation order.
//!
//! Output that belongs to a turn goes through [`SessionSink::send_for_turn`],
//! which re-checks the turn under the session's ordering lock. Starting a new
//! turn takes the same lock (see [`SessionSink::ordered`]), so once the new
//! transcript is queued nothing from the superseded turn can follow it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex, MutexGuard};
use voice_duplex_core::{Error, Result, ServerMessage};

use crate::interrupt::TurnToken;

/// One item bound for the client
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// Serialized as a JSON text frame
    Json(ServerMessage),
    /// PCM16 audio, sent as one binary frame
    Audio(Vec<u8>),
}

/// Cloneable handle for sending to one client.
///
/// The first failed send marks the sink closed; every later send returns
/// [`Error::ConnectionClosed`] without touching the channel.
#[derive(Debug, Clone)]
pub struct SessionSink {
    tx: mpsc::Sender<Outbound>,
    closed: Arc<AtomicBool>,
    order: Arc<Mutex<()>>,
}

impl SessionSink {
    /// Create a sink and the receiver the transport drains
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                tx,
                closed: Arc::new(AtomicBool::new(false)),
                order: Arc::new(Mutex::new(())),
            },
            rx,
        )
    }

    pub async fn send_json(&self, message: ServerMessage) -> Result<()> {
        self.send(Outbound::Json(message)).await
    }

    /// Send on behalf of `turn`; dropped with [`Error::Interrupted`] once the
    /// turn must stop.
    pub async fn send_for_turn(&self, turn: &TurnToken, item: Outbound) -> Result<()> {
        let _order = self.order.lock().await;
        if turn.should_stop() {
            return Err(Error::Interrupted);
        }
        self.send(item).await
    }

    /// Hold off turn-scoped sends while a new turn is started
    pub async fn ordered(&self) -> MutexGuard<'_, ()> {
        self.order.lock().await
    }

    async fn send(&self, item: Outbound) -> Result<()> {
        if self.is_closed() {
            return Err(Error::ConnectionClosed);
        }
        if self.tx.send(item).await.is_err() {
            if !self.closed.swap(true, Ordering::AcqRel) {
                tracing::debug!("Outbound channel closed, dropping further sends");
            }
            return Err(Error::ConnectionClosed);
        }
        Ok(())
    }

    /// Stop accepting sends, e.g. once the peer has disconnected
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn test_sends_arrive_in_order() {
        let (sink, mut rx) = SessionSink::channel(8);
        sink.send_json(ServerMessage::text_chunk("Hi.")).await.unwrap();
        sink.send(Outbound::Audio(vec![1, 2])).await.unwrap();

        assert_eq!(
            rx.recv().await,
            Some(Outbound::Json(ServerMessage::text_chunk("Hi.")))
        );
        assert_eq!(rx.recv().await, Some(Outbound::Audio(vec![1, 2])));
    }

    #[tokio::test]
    async fn test_dropped_receiver_closes_sink() {
        let (sink, rx) = SessionSink::channel(8);
        drop(rx);

        let err = sink.send(Outbound::Audio(vec![0, 0])).await.unwrap_err();
        assert!(err.is_connection_closed());
        assert!(sink.is_closed());
        assert!(sink.send_json(ServerMessage::transcript("x")).await.is_err());
    }

    #[tokio::test]
    async fn test_explicit_close() {
        let (sink, mut rx) = SessionSink::channel(8);
        sink.close();
        assert!(sink.send(Outbound::Audio(vec![0, 0])).await.is_err());
        drop(sink);
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_stopped_turn_output_dropped() {
        let (sink, mut rx) = SessionSink::channel(8);
        let turn = TurnToken::detached(Instant::now());

        sink.send_for_turn(&turn, Outbound::Audio(vec![1, 1])).await.unwrap();
        turn.interrupt();
        let err = sink
            .send_for_turn(&turn, Outbound::Audio(vec![2, 2]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Interrupted));

        assert_eq!(rx.recv().await, Some(Outbound::Audio(vec![1, 1])));
        assert!(rx.try_recv().is_err());
    }
}
