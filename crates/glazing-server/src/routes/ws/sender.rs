//! Outbound half of a session: a channel of frames and the task that writes them.
//!
//! The writer task exclusively owns the socket's sink. Everything else that
//! wants to talk to the client holds a cloned [`EventSender`].

use axum::extract::ws::{Message, WebSocket};
use futures::SinkExt;
use futures::stream::SplitSink;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::protocol::ServerMessage;
use crate::registry::SessionId;

/// Frames buffered per session before senders wait.
pub const OUTBOUND_BUFFER: usize = 64;

/// Failure to queue an outbound frame.
#[derive(Debug, Error)]
pub enum SendError {
    /// The writer is gone; the connection is unusable.
    #[error("Connection closed")]
    Closed,

    #[error("Failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Cloneable handle for queueing frames to one client.
#[derive(Debug, Clone)]
pub struct EventSender {
    session_id: SessionId,
    tx: mpsc::Sender<Message>,
}

impl EventSender {
    /// Create a sender and the receiving end the writer drains.
    pub fn channel(session_id: SessionId, capacity: usize) -> (Self, mpsc::Receiver<Message>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { session_id, tx }, rx)
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Queue a protocol message.
    pub async fn send(&self, msg: ServerMessage) -> Result<(), SendError> {
        let json = serde_json::to_string(&msg)?;
        tracing::trace!(session_id = %self.session_id, kind = msg.kind(), "Queueing event");
        self.send_frame(Message::Text(json.into())).await
    }

    /// Queue a raw frame (transport pongs).
    pub async fn send_frame(&self, frame: Message) -> Result<(), SendError> {
        self.tx.send(frame).await.map_err(|_| SendError::Closed)
    }
}

/// Spawn the writer task for one session.
///
/// The task ends when every [`EventSender`] is dropped or `cancel` fires. If a
/// write fails it cancels `cancel` so the rest of the session shuts down.
pub fn spawn_writer(
    sink: SplitSink<WebSocket, Message>,
    rx: mpsc::Receiver<Message>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(write_loop(sink, rx, cancel))
}

async fn write_loop(
    mut sink: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Message>,
    cancel: CancellationToken,
) {
    loop {
        let frame = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            frame = rx.recv() => frame,
        };

        let Some(frame) = frame else {
            break;
        };

        if let Err(e) = sink.send(frame).await {
            tracing::debug!(error = %e, "WebSocket write failed");
            cancel.cancel();
            break;
        }
    }

    let _ = sink.close().await;
}
