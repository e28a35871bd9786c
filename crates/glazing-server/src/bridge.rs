//! Streaming bridge: token source fragments in, per-fragment notifications out.
//!
//! The bridge is the only place where fragment order and accumulation are
//! guaranteed. It performs no retries; recovery belongs to the token source.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::StreamExt;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use glazing_llm::TokenSource;

/// Error returned by a [`FragmentSink`].
pub type SinkError = Box<dyn std::error::Error + Send + Sync>;

/// Receives each fragment as it is produced.
#[async_trait]
pub trait FragmentSink: Send {
    /// Called exactly once per fragment, in emission order.
    async fn on_fragment(&mut self, fragment: &str) -> Result<(), SinkError>;
}

/// Why a bridge run ended early.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The sink rejected a fragment.
    #[error("Failed to deliver fragment: {0}")]
    Sink(#[source] SinkError),

    /// The cancellation token fired.
    #[error("Streaming cancelled")]
    Cancelled,
}

/// Result of a completed bridge run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeOutput {
    /// All fragments concatenated in order.
    pub text: String,
    /// Time from start to the terminal fragment.
    pub elapsed: Duration,
    /// Number of fragments delivered.
    pub fragments: usize,
}

/// Adapts a [`TokenSource`] to a [`FragmentSink`].
#[derive(Debug, Clone)]
pub struct StreamingBridge {
    source: Arc<TokenSource>,
}

impl StreamingBridge {
    pub fn new(source: Arc<TokenSource>) -> Self {
        Self { source }
    }

    /// Stream one response into `sink`.
    ///
    /// `cancel` is checked between fragments.
    pub async fn run<S>(
        &self,
        prompt: &str,
        system: Option<&str>,
        sink: &mut S,
        cancel: &CancellationToken,
    ) -> Result<BridgeOutput, BridgeError>
    where
        S: FragmentSink + ?Sized,
    {
        let start = Instant::now();
        let mut stream = self.source.produce_fragments(prompt, system);
        let mut text = String::new();
        let mut fragments = 0usize;

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(BridgeError::Cancelled),
                next = stream.next() => next,
            };

            let Some(fragment) = next else {
                break;
            };

            sink.on_fragment(&fragment).await.map_err(BridgeError::Sink)?;
            text.push_str(&fragment);
            fragments += 1;
        }

        Ok(BridgeOutput {
            text,
            elapsed: start.elapsed(),
            fragments,
        })
    }
}
