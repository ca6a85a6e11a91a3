//! WebSocket Handler
//!
//! One connection is one voice session. Binary frames carry PCM16 mono
//! 16kHz audio in; text frames carry control messages. Outbound JSON events
//! and PCM16 audio frames are drained from the session's queue by a writer
//! task, in the order the pipeline produced them.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use voice_duplex_pipeline::{Outbound, SessionOptions, SessionSink, VoiceSession};

use crate::registry::ConnectionSlot;
use crate::state::AppState;
use crate::ServerError;

/// GET {ws_path}
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> Result<Response, StatusCode> {
    let Some(slot) = state.sessions.try_acquire() else {
        let limit = state.sessions.max_connections();
        tracing::warn!(limit, "Rejecting voice connection at capacity");
        metrics::counter!("voice_rejected_connections_total").increment(1);
        return Err(ServerError::AtCapacity(limit).into());
    };

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, slot)))
}

async fn handle_socket(socket: WebSocket, state: AppState, slot: ConnectionSlot) {
    let session_id = uuid::Uuid::new_v4().to_string();
    let (options, outbound_capacity) = {
        let config = state.get_config();
        (
            SessionOptions::from_settings(&config),
            config.session.outbound_queue_capacity,
        )
    };

    let (sink, outbound_rx) = SessionSink::channel(outbound_capacity);
    let session = VoiceSession::start(session_id.clone(), state.services.clone(), options, sink);
    state.sessions.register(session.clone());

    let (sender, mut receiver) = socket.split();
    let writer = spawn_writer(session_id.clone(), sender, outbound_rx);

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Binary(data)) => {
                if session.push_audio(data).await.is_err() {
                    break;
                }
            }
            Ok(Message::Text(text)) => session.handle_control(&text),
            Ok(Message::Close(_)) => break,
            // ping/pong are answered by the transport
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(session_id = %session_id, error = %e, "WebSocket receive failed");
                break;
            }
        }
    }

    close_session(&state, &session).await;
    writer.abort();
    drop(slot);
}

fn spawn_writer(
    session_id: String,
    mut sender: futures::stream::SplitSink<WebSocket, Message>,
    mut outbound_rx: mpsc::Receiver<Outbound>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(item) = outbound_rx.recv().await {
            let message = match item {
                Outbound::Json(event) => match serde_json::to_string(&event) {
                    Ok(json) => Message::Text(json),
                    Err(e) => {
                        tracing::warn!(session_id = %session_id, error = %e, "Failed to encode event");
                        continue;
                    }
                },
                Outbound::Audio(pcm) => Message::Binary(pcm),
            };

            if let Err(e) = sender.send(message).await {
                tracing::debug!(session_id = %session_id, error = %e, "WebSocket send failed");
                break;
            }
        }
        // dropping the receiver marks the session sink closed
        drop(outbound_rx);
        let _ = sender.close().await;
    })
}

async fn close_session(state: &AppState, session: &Arc<VoiceSession>) {
    session.close().await;
    state.sessions.unregister(session.id());
    tracing::info!(
        session_id = %session.id(),
        active = state.sessions.count(),
        "WebSocket closed"
    );
}
