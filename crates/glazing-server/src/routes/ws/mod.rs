//! WebSocket endpoints.
//!
//! ## Module Structure
//!
//! - `protocol` - Message types (ClientMessage, ServerMessage)
//! - `connection` - Session lifecycle and receive loop
//! - `handlers` - Message dispatch and prompt streaming
//! - `receiver` - Reader task feeding inbound payloads
//! - `sender` - Outbound channel and writer task
//! - `echo` - The `/ws/test` echo endpoint

mod connection;
mod echo;
mod handlers;
mod protocol;
mod receiver;
mod sender;

use axum::{
    extract::{Path, State, ws::WebSocketUpgrade},
    response::Response,
};

use crate::state::AppState;

// Re-export public types
pub use connection::{Session, SessionState};
pub use handlers::{DispatchContext, dispatch};
pub use protocol::{ClientMessage, ServerMessage, THINKING};
pub use sender::{EventSender, OUTBOUND_BUFFER, SendError};

/// GET /ws/{routing_key} - WebSocket upgrade for a chat session.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(routing_key): Path<String>,
    State(state): State<AppState>,
) -> Response {
    let max_size = state.config().max_ws_message_size;
    ws.max_message_size(max_size)
        .on_upgrade(move |socket| connection::handle_socket(socket, state, routing_key))
}

/// GET /ws/test - WebSocket upgrade for the echo endpoint.
pub async fn ws_test_handler(ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(echo::handle_test_socket)
}
