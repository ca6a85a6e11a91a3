//! Live session registry
//!
//! Tracks connected voice sessions and enforces the connection limit. A
//! [`ConnectionSlot`] is reserved before the WebSocket upgrade and released
//! when the connection task drops it, so the limit holds even while a
//! session is still starting up.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

use voice_duplex_pipeline::{TurnPhase, VoiceSession};

struct Entry {
    session: Arc<VoiceSession>,
    connected_at: DateTime<Utc>,
}

/// Summary served by `GET /api/sessions`
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub connected_at: DateTime<Utc>,
    pub age_secs: u64,
    pub phase: TurnPhase,
}

pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Entry>>,
    active: Arc<AtomicUsize>,
    max_connections: usize,
}

/// One reserved connection; released on drop
#[derive(Debug)]
pub struct ConnectionSlot {
    active: Arc<AtomicUsize>,
}

impl Drop for ConnectionSlot {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::AcqRel);
    }
}

impl SessionRegistry {
    pub fn new(max_connections: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            active: Arc::new(AtomicUsize::new(0)),
            max_connections,
        }
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    /// Reserve a connection, or `None` at the limit
    pub fn try_acquire(&self) -> Option<ConnectionSlot> {
        let mut current = self.active.load(Ordering::Acquire);
        loop {
            if current >= self.max_connections {
                return None;
            }
            match self.active.compare_exchange(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    return Some(ConnectionSlot {
                        active: self.active.clone(),
                    })
                }
                Err(actual) => current = actual,
            }
        }
    }

    /// Connections currently holding a slot
    pub fn active_connections(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    pub fn has_capacity(&self) -> bool {
        self.active_connections() < self.max_connections
    }

    pub fn register(&self, session: Arc<VoiceSession>) {
        let id = session.id().to_string();
        self.sessions.write().insert(
            id,
            Entry {
                session,
                connected_at: Utc::now(),
            },
        );
        metrics::gauge!("voice_active_sessions").set(self.count() as f64);
    }

    pub fn unregister(&self, id: &str) -> Option<Arc<VoiceSession>> {
        let removed = self.sessions.write().remove(id).map(|entry| entry.session);
        metrics::gauge!("voice_active_sessions").set(self.count() as f64);
        removed
    }

    pub fn count(&self) -> usize {
        self.sessions.read().len()
    }

    /// Snapshot of live sessions, oldest first
    pub fn list(&self) -> Vec<SessionInfo> {
        let mut infos: Vec<SessionInfo> = self
            .sessions
            .read()
            .iter()
            .map(|(id, entry)| SessionInfo {
                session_id: id.clone(),
                connected_at: entry.connected_at,
                age_secs: entry.session.age().as_secs(),
                phase: entry.session.phase(),
            })
            .collect();
        infos.sort_by_key(|info| info.connected_at);
        infos
    }

    /// Close every session, e.g. on shutdown
    pub async fn close_all(&self) {
        let sessions: Vec<Arc<VoiceSession>> = self
            .sessions
            .write()
            .drain()
            .map(|(_, entry)| entry.session)
            .collect();

        if !sessions.is_empty() {
            tracing::info!(count = sessions.len(), "Closing remaining voice sessions");
        }
        for session in sessions {
            session.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::build_services;
    use voice_duplex_config::{Settings, TtsBackendKind};
    use voice_duplex_pipeline::{SessionOptions, SessionSink};

    fn services() -> voice_duplex_pipeline::VoiceServices {
        let mut settings = Settings::default();
        settings.tts.backend = TtsBackendKind::Silent;
        build_services(&settings).unwrap()
    }

    #[test]
    fn test_slots_enforce_limit() {
        let registry = SessionRegistry::new(2);

        let first = registry.try_acquire().unwrap();
        let _second = registry.try_acquire().unwrap();
        assert!(registry.try_acquire().is_none());
        assert!(!registry.has_capacity());

        drop(first);
        assert_eq!(registry.active_connections(), 1);
        assert!(registry.try_acquire().is_some());
    }

    #[tokio::test]
    async fn test_register_list_unregister() {
        let registry = SessionRegistry::new(4);
        let (sink, _rx) = SessionSink::channel(8);
        let session = VoiceSession::start("s-1", services(), SessionOptions::default(), sink);

        registry.register(session.clone());
        assert_eq!(registry.count(), 1);

        let listed = registry.list();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].session_id, "s-1");
        assert_eq!(listed[0].phase, TurnPhase::Idle);

        assert!(registry.unregister("s-1").is_some());
        assert!(registry.unregister("s-1").is_none());
        assert_eq!(registry.count(), 0);
        assert!(registry.list().is_empty());
        session.close().await;
    }

    #[tokio::test]
    async fn test_close_all_stops_sessions() {
        let registry = SessionRegistry::new(4);
        let (sink, _rx) = SessionSink::channel(8);
        let session = VoiceSession::start("s-2", services(), SessionOptions::default(), sink);
        registry.register(session.clone());

        registry.close_all().await;
        assert_eq!(registry.count(), 0);
        assert!(!session.is_running());
    }
}
