//! WebSocket message handlers.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::protocol::{ClientMessage, ServerMessage, THINKING};
use super::sender::{EventSender, SendError};
use crate::bridge::{BridgeError, FragmentSink, SinkError, StreamingBridge};

/// Everything a session's dispatcher needs.
#[derive(Debug, Clone)]
pub struct DispatchContext {
    pub events: EventSender,
    pub bridge: StreamingBridge,
    pub system_prompt: Option<String>,
    pub cancel: CancellationToken,
}

/// Handle one inbound payload.
///
/// Processing failures are reported to the client as an `error` event and
/// swallowed. Only an unusable connection is returned as an error.
pub async fn dispatch(ctx: &DispatchContext, raw: &str) -> Result<(), SendError> {
    match ClientMessage::parse(raw) {
        ClientMessage::Ping => ctx.events.send(ServerMessage::pong(ctx.events.session_id())).await,
        ClientMessage::Prompt(prompt) => handle_prompt(ctx, &prompt).await,
    }
}

/// Stream an answer to `prompt` as status, tokens and a completion.
async fn handle_prompt(ctx: &DispatchContext, prompt: &str) -> Result<(), SendError> {
    let session_id = *ctx.events.session_id();

    ctx.events.send(ServerMessage::status(&session_id, THINKING)).await?;

    let mut sink = TokenSink { events: &ctx.events };
    let result = ctx
        .bridge
        .run(prompt, ctx.system_prompt.as_deref(), &mut sink, &ctx.cancel)
        .await;

    match result {
        Ok(output) => {
            let elapsed_ms = u64::try_from(output.elapsed.as_millis()).unwrap_or(u64::MAX);
            tracing::info!(
                session_id = %session_id,
                fragments = output.fragments,
                elapsed_ms,
                "Response streamed"
            );
            ctx.events
                .send(ServerMessage::completion(&session_id, output.text, elapsed_ms))
                .await
        }
        Err(BridgeError::Cancelled) => {
            tracing::debug!(session_id = %session_id, "Response cancelled, connection closing");
            Ok(())
        }
        Err(e) => {
            tracing::error!(session_id = %session_id, error = %e, "Error processing message");
            ctx.events
                .send(ServerMessage::error(
                    &session_id,
                    format!("Error processing your message: {}", e),
                ))
                .await
        }
    }
}

/// Forwards each fragment to the client as a `token` event.
struct TokenSink<'a> {
    events: &'a EventSender,
}

#[async_trait]
impl FragmentSink for TokenSink<'_> {
    async fn on_fragment(&mut self, fragment: &str) -> Result<(), SinkError> {
        self.events
            .send(ServerMessage::token(self.events.session_id(), fragment))
            .await
            .map_err(Into::into)
    }
}
