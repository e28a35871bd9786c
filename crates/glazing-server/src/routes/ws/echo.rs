//! `/ws/test`: a bare echo endpoint for checking connectivity.
//!
//! No session id, no registry entry, no keepalive.

use axum::extract::ws::{Message, WebSocket};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};

use super::protocol::ServerMessage;

/// Handle a test-endpoint connection.
pub async fn handle_test_socket(socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();

    if send_message(&mut sender, ServerMessage::system(None, "Connected to test endpoint"))
        .await
        .is_err()
    {
        return;
    }

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                let reply = ServerMessage::echo(format!("You sent: {}", text.as_str()));
                if send_message(&mut sender, reply).await.is_err() {
                    break;
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                tracing::debug!(error = %e, "Test endpoint receive error");
                break;
            }
        }
    }

    tracing::debug!("Test endpoint connection closed");
}

/// Send a message over the WebSocket.
async fn send_message(
    sender: &mut SplitSink<WebSocket, Message>,
    msg: ServerMessage,
) -> Result<(), axum::Error> {
    let json = serde_json::to_string(&msg).map_err(axum::Error::new)?;
    sender
        .send(Message::Text(json.into()))
        .await
        .map_err(axum::Error::new)
}
