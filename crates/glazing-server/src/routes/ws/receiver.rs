//! Inbound half of a session: the task that reads the socket.
//!
//! The reader keeps polling the socket while a response is streaming, so a
//! client that closes mid-response cancels the session right away instead of
//! after the response finishes.

use axum::extract::ws::{Message, WebSocket};
use futures::StreamExt;
use futures::stream::SplitStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::sender::EventSender;

/// Payloads buffered per session while a response is streaming.
pub const INBOUND_BUFFER: usize = 32;

/// A payload for the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A text frame, or a binary frame that is valid UTF-8.
    Text(String),
    /// A binary frame that is not UTF-8.
    InvalidBinary,
}

/// How the reader ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadEnd {
    /// Close frame or end of stream.
    ClientClosed,
    /// The transport reported an error.
    TransportError,
    /// Transport pongs could no longer be queued.
    WriterGone,
    /// `stop` fired.
    Stopped,
}

/// Spawn the reader task for one session.
///
/// Payloads go to the returned receiver in arrival order. When the client
/// goes away the reader cancels `session` so in-flight work stops. `stop`
/// ends the reader without touching `session`.
pub fn spawn_reader(
    stream: SplitStream<WebSocket>,
    events: EventSender,
    session: CancellationToken,
    stop: CancellationToken,
) -> (JoinHandle<ReadEnd>, mpsc::Receiver<Inbound>) {
    let (tx, rx) = mpsc::channel(INBOUND_BUFFER);
    let handle = tokio::spawn(read_loop(stream, events, tx, session, stop));
    (handle, rx)
}

async fn read_loop(
    mut stream: SplitStream<WebSocket>,
    events: EventSender,
    tx: mpsc::Sender<Inbound>,
    session: CancellationToken,
    stop: CancellationToken,
) -> ReadEnd {
    let session_id = *events.session_id();

    let end = loop {
        let msg = tokio::select! {
            biased;
            _ = stop.cancelled() => break ReadEnd::Stopped,
            msg = stream.next() => msg,
        };

        let inbound = match msg {
            Some(Ok(Message::Text(text))) => Inbound::Text(text.to_string()),
            Some(Ok(Message::Binary(data))) => match String::from_utf8(data.to_vec()) {
                Ok(text) => Inbound::Text(text),
                Err(_) => Inbound::InvalidBinary,
            },
            Some(Ok(Message::Ping(data))) => {
                let sent = tokio::select! {
                    biased;
                    _ = stop.cancelled() => break ReadEnd::Stopped,
                    sent = events.send_frame(Message::Pong(data)) => sent,
                };
                if sent.is_err() {
                    break ReadEnd::WriterGone;
                }
                continue;
            }
            Some(Ok(Message::Pong(_))) => continue,
            Some(Ok(Message::Close(_))) | None => break ReadEnd::ClientClosed,
            Some(Err(e)) => {
                tracing::warn!(session_id = %session_id, error = %e, "WebSocket receive error");
                break ReadEnd::TransportError;
            }
        };

        let queued = tokio::select! {
            biased;
            _ = stop.cancelled() => break ReadEnd::Stopped,
            queued = tx.send(inbound) => queued,
        };
        if queued.is_err() {
            break ReadEnd::Stopped;
        }
    };

    if matches!(end, ReadEnd::ClientClosed | ReadEnd::TransportError) {
        session.cancel();
    }
    tracing::debug!(session_id = %session_id, ?end, "Reader stopped");
    end
}
