//! OpenAI-compatible chat-completions client.
//!
//! Talks to OpenAI's API or any compatible service (Groq, Ollama, local
//! proxies) and exposes the streamed response as a sequence of text deltas.

use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::{Client, Response, header};
use std::pin::Pin;
use std::time::Duration;

use crate::error::{LlmError, RateLimitInfo, Result};

/// Default OpenAI API base URL.
pub const DEFAULT_OPENAI_BASE: &str = "https://api.openai.com/v1";

/// Default model.
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Default timeout for requests.
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Text deltas from a streaming completion. An `Err` item ends the stream.
pub type DeltaStream = Pin<Box<dyn Stream<Item = Result<String>> + Send + 'static>>;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for the OpenAI-compatible client.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// API key for authentication.
    pub api_key: Option<String>,

    /// Base URL for the API.
    pub base_url: String,

    /// Model identifier.
    pub model: String,

    /// Sampling temperature.
    pub temperature: Option<f32>,

    /// Request timeout.
    pub timeout: Duration,

    /// Name for this backend instance (logs, health output).
    pub name: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_OPENAI_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            name: "openai".to_string(),
        }
    }
}

impl OpenAiConfig {
    /// Create a new config for OpenAI with the given key.
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..Default::default()
        }
    }

    /// Set or clear the API key.
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    /// Set a custom base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the backend name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Client
// ─────────────────────────────────────────────────────────────────────────────

/// OpenAI-compatible streaming client.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiClient {
    /// Create a new client with the given configuration.
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// The client's configuration.
    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }

    /// Build the chat completions endpoint URL.
    fn completions_url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    fn add_headers(&self, builder: reqwest::RequestBuilder, api_key: &str) -> reqwest::RequestBuilder {
        builder
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, format!("Bearer {}", api_key))
    }

    /// Build the request body for a single-turn prompt.
    fn to_request(&self, prompt: &str, system: Option<&str>) -> OpenAiChatRequest {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system.filter(|s| !s.trim().is_empty()) {
            messages.push(OpenAiMessage {
                role: "system",
                content: system.to_string(),
            });
        }
        messages.push(OpenAiMessage {
            role: "user",
            content: prompt.to_string(),
        });

        OpenAiChatRequest {
            model: self.config.model.clone(),
            messages,
            temperature: self.config.temperature,
            stream: true,
        }
    }

    /// Start a streaming completion.
    ///
    /// Fails before any network traffic if no API key is configured.
    pub async fn stream_chat(&self, prompt: &str, system: Option<&str>) -> Result<DeltaStream> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| LlmError::Config("API key not configured".to_string()))?;

        let request = self.to_request(prompt, system);

        tracing::debug!(
            backend = %self.config.name,
            model = %request.model,
            messages = request.messages.len(),
            "Sending streaming chat completion request"
        );

        let response = self
            .add_headers(self.client.post(self.completions_url()), api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::handle_error_response(response).await);
        }

        Ok(parse_sse_stream(response.bytes_stream()))
    }

    /// Map an error response to an [`LlmError`].
    async fn handle_error_response(response: Response) -> LlmError {
        let status = response.status();
        let retry_after = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await.unwrap_or_default();

        if let Ok(error) = serde_json::from_str::<OpenAiErrorResponse>(&body) {
            match status.as_u16() {
                401 | 403 => LlmError::Auth(format!("Authentication failed: {}", error.error.message)),
                429 => LlmError::RateLimit(RateLimitInfo::parse_openai(
                    &error.error.message,
                    retry_after.as_deref(),
                )),
                500..=599 => LlmError::Backend(format!("Server error: {}", error.error.message)),
                _ => LlmError::Backend(error.error.message),
            }
        } else {
            LlmError::Backend(format!("HTTP {}: {}", status, body))
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// OpenAI API Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, serde::Serialize)]
struct OpenAiChatRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

#[derive(Debug, serde::Serialize)]
struct OpenAiMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, serde::Deserialize)]
struct OpenAiErrorResponse {
    error: OpenAiError,
}

#[derive(Debug, serde::Deserialize)]
struct OpenAiError {
    message: String,
}

#[derive(Debug, serde::Deserialize)]
struct OpenAiStreamChunk {
    #[serde(default)]
    choices: Vec<OpenAiStreamChoice>,
}

#[derive(Debug, serde::Deserialize)]
struct OpenAiStreamChoice {
    delta: Option<OpenAiStreamDelta>,
}

#[derive(Debug, serde::Deserialize)]
struct OpenAiStreamDelta {
    content: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// SSE Streaming
// ─────────────────────────────────────────────────────────────────────────────

struct SseState {
    byte_stream: Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>,
    buffer: Vec<u8>,
    done: bool,
}

/// Parse an OpenAI server-sent-event body into text deltas.
///
/// Lines are split on raw bytes so that multi-byte characters spanning two
/// network chunks are decoded intact. Empty deltas (role announcements,
/// finish markers) are skipped. A data line that is not a valid chunk yields
/// an error and ends the stream.
fn parse_sse_stream(
    byte_stream: impl Stream<Item = reqwest::Result<Bytes>> + Send + 'static,
) -> DeltaStream {
    Box::pin(futures::stream::unfold(
        SseState {
            byte_stream: Box::pin(byte_stream),
            buffer: Vec::new(),
            done: false,
        },
        |mut state| async move {
            if state.done {
                return None;
            }

            loop {
                while let Some(line_end) = state.buffer.iter().position(|b| *b == b'\n') {
                    let line: Vec<u8> = state.buffer.drain(..=line_end).collect();
                    let line = String::from_utf8_lossy(&line);
                    let line = line.trim();

                    let Some(data) = line.strip_prefix("data:") else {
                        continue;
                    };
                    let data = data.trim_start();

                    if data == "[DONE]" {
                        state.done = true;
                        return None;
                    }

                    match serde_json::from_str::<OpenAiStreamChunk>(data) {
                        Ok(chunk) => {
                            let content = chunk
                                .choices
                                .into_iter()
                                .next()
                                .and_then(|c| c.delta)
                                .and_then(|d| d.content)
                                .filter(|c| !c.is_empty());
                            if let Some(content) = content {
                                return Some((Ok(content), state));
                            }
                        }
                        Err(e) => {
                            state.done = true;
                            return Some((
                                Err(LlmError::Serialization(format!(
                                    "Malformed stream chunk: {}",
                                    e
                                ))),
                                state,
                            ));
                        }
                    }
                }

                match state.byte_stream.next().await {
                    Some(Ok(bytes)) => state.buffer.extend_from_slice(&bytes),
                    Some(Err(e)) => {
                        state.done = true;
                        return Some((Err(LlmError::Network(e.to_string())), state));
                    }
                    None => return None,
                }
            }
        },
    ))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
