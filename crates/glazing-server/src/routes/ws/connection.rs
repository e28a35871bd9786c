//! WebSocket session lifecycle.
//!
//! ```text
//! Connecting ──accept──▶ Active ──disconnect / write failure / shutdown──▶ Draining ──▶ Closed
//!                          ▲  │
//!                          └──┘ each inbound message
//! ```

use axum::extract::ws::WebSocket;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use tokio::sync::mpsc;

use super::handlers::{DispatchContext, dispatch};
use super::protocol::ServerMessage;
use super::receiver::{Inbound, ReadEnd, spawn_reader};
use super::sender::{EventSender, OUTBOUND_BUFFER, spawn_writer};
use crate::keepalive::spawn_keepalive;
use crate::registry::{SessionEntry, SessionId};
use crate::state::AppState;

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Active,
    Draining,
    Closed,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionState::Connecting => "connecting",
            SessionState::Active => "active",
            SessionState::Draining => "draining",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Identity and state of one connection.
#[derive(Debug)]
pub struct Session {
    pub id: SessionId,
    pub routing_key: String,
    pub connected_at: DateTime<Utc>,
    state: SessionState,
}

impl Session {
    pub fn new(routing_key: impl Into<String>) -> Self {
        Self {
            id: SessionId::new(),
            routing_key: routing_key.into(),
            connected_at: Utc::now(),
            state: SessionState::Connecting,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn transition(&mut self, next: SessionState) {
        tracing::debug!(
            session_id = %self.id,
            routing_key = %self.routing_key,
            from = %self.state,
            state = %next,
            "Session state changed"
        );
        self.state = next;
    }
}

/// What ended the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DrainReason {
    ClientClosed,
    TransportError,
    /// Outbound writes failed.
    ConnectionUnusable,
    /// The session token fired (writer failure or server shutdown).
    Cancelled,
}

/// Run a session on an upgraded socket until it closes.
pub async fn handle_socket(socket: WebSocket, state: AppState, routing_key: String) {
    let mut session = Session::new(routing_key);
    let (ws_sink, ws_stream) = socket.split();

    let cancel = state.shutdown_token().child_token();
    let (events, rx) = EventSender::channel(session.id, OUTBOUND_BUFFER);
    let writer = spawn_writer(ws_sink, rx, cancel.clone());

    // ── Connecting → Active ────────────────────────────────────────────

    if let Some(store) = state.store()
        && let Err(e) = store.record_session(&session.id, &session.routing_key).await
    {
        tracing::warn!(session_id = %session.id, error = %e, "Failed to persist session");
    }

    state.registry().register(
        &session.routing_key,
        SessionEntry {
            session_id: session.id,
            connected_at: session.connected_at,
        },
    );

    tracing::info!(
        session_id = %session.id,
        routing_key = %session.routing_key,
        active_sessions = state.registry().session_count(),
        "WebSocket session connected"
    );

    let welcome = ServerMessage::system(
        Some(&session.id),
        format!(
            "Connected successfully with widget key: {}",
            session.routing_key
        ),
    );
    let welcomed = events.send(welcome).await.is_ok();

    let keepalive = spawn_keepalive(
        events.clone(),
        state.config().keepalive_interval,
        cancel.child_token(),
    );

    let reader_stop = cancel.child_token();
    let (reader, mut inbound) =
        spawn_reader(ws_stream, events.clone(), cancel.clone(), reader_stop.clone());

    session.transition(SessionState::Active);

    let ctx = DispatchContext {
        events,
        bridge: state.bridge(),
        system_prompt: state.config().system_prompt.clone(),
        cancel: cancel.clone(),
    };

    // ── Active ─────────────────────────────────────────────────────────

    let mut reason = if welcomed {
        receive_loop(&ctx, &mut inbound).await
    } else {
        DrainReason::ConnectionUnusable
    };

    // ── Draining → Closed ──────────────────────────────────────────────

    session.transition(SessionState::Draining);

    reader_stop.cancel();
    drop(inbound);
    match reader.await {
        Ok(ReadEnd::ClientClosed) if reason == DrainReason::Cancelled => {
            reason = DrainReason::ClientClosed;
        }
        Ok(ReadEnd::TransportError) if reason == DrainReason::Cancelled => {
            reason = DrainReason::TransportError;
        }
        Ok(_) => {}
        Err(e) => tracing::warn!(session_id = %session.id, error = %e, "Reader task panicked"),
    }
    tracing::debug!(session_id = %session.id, ?reason, "Session draining");

    keepalive.shutdown().await;

    let removed = state
        .registry()
        .unregister(&session.routing_key, &session.id);
    if !removed {
        tracing::warn!(session_id = %session.id, "Session was not registered at teardown");
    }

    if let Some(store) = state.store()
        && let Err(e) = store.remove_session(&session.id).await
    {
        tracing::warn!(session_id = %session.id, error = %e, "Failed to remove persisted session");
    }

    // Dropping the last sender lets the writer flush and close the socket
    drop(ctx);
    if let Err(e) = writer.await {
        tracing::warn!(session_id = %session.id, error = %e, "Writer task panicked");
    }
    cancel.cancel();

    session.transition(SessionState::Closed);
    tracing::info!(
        session_id = %session.id,
        routing_key = %session.routing_key,
        active_sessions = state.registry().session_count(),
        "WebSocket session closed"
    );
}

/// Dispatch payloads in arrival order until the session ends.
async fn receive_loop(
    ctx: &DispatchContext,
    inbound: &mut mpsc::Receiver<Inbound>,
) -> DrainReason {
    let session_id = *ctx.events.session_id();

    loop {
        let payload = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => return DrainReason::Cancelled,
            payload = inbound.recv() => payload,
        };

        let sent = match payload {
            Some(Inbound::Text(text)) => {
                tracing::debug!(session_id = %session_id, bytes = text.len(), "Message received");
                dispatch(ctx, &text).await
            }
            Some(Inbound::InvalidBinary) => {
                ctx.events
                    .send(ServerMessage::error(&session_id, "Binary data must be UTF-8"))
                    .await
            }
            // The reader cancels the session before it exits on a disconnect
            None => return DrainReason::ClientClosed,
        };

        if sent.is_err() {
            return DrainReason::ConnectionUnusable;
        }
    }
}
