//! Remote-backend generator with canned-response recovery.

use futures::StreamExt;

use crate::error::LlmError;
use crate::fallback::FallbackGenerator;
use crate::openai::{OpenAiClient, OpenAiConfig};
use crate::source::FragmentStream;

/// Streams fragments from an OpenAI-compatible backend.
///
/// The stream it returns never fails. If the backend cannot be reached, errors,
/// or produces nothing, the canned fallback sequence is streamed instead; if it
/// fails part-way, the fallback sequence is appended to what was already sent.
#[derive(Debug, Clone)]
pub struct BackendGenerator {
    client: OpenAiClient,
    fallback: FallbackGenerator,
}

impl BackendGenerator {
    pub fn new(client: OpenAiClient, fallback: FallbackGenerator) -> Self {
        Self { client, fallback }
    }

    /// Configuration of the underlying client.
    pub fn config(&self) -> &OpenAiConfig {
        self.client.config()
    }

    /// Stream a completion for `prompt`.
    pub fn stream(&self, prompt: &str, system: Option<&str>) -> FragmentStream {
        let client = self.client.clone();
        let fallback = self.fallback.clone();
        let prompt = prompt.to_string();
        let system = system.map(str::to_string);

        Box::pin(async_stream::stream! {
            let mut emitted = 0usize;

            let failure = match client.stream_chat(&prompt, system.as_deref()).await {
                Ok(mut deltas) => {
                    let mut failure = None;
                    while let Some(item) = deltas.next().await {
                        match item {
                            Ok(text) => {
                                emitted += 1;
                                yield text;
                            }
                            Err(e) => {
                                failure = Some(e);
                                break;
                            }
                        }
                    }
                    if failure.is_none() && emitted == 0 {
                        failure = Some(LlmError::Backend("Backend returned an empty stream".to_string()));
                    }
                    failure
                }
                Err(e) => Some(e),
            };

            if let Some(error) = failure {
                tracing::warn!(
                    backend = %client.config().name,
                    kind = error.kind(),
                    emitted,
                    error = %error,
                    "Backend stream failed, using fallback response"
                );
                let mut recovery = fallback.stream();
                while let Some(fragment) = recovery.next().await {
                    yield fragment;
                }
            }
        })
    }
}
