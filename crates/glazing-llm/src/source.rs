//! The token source: the one capability the session engine needs from an LLM.
//!
//! A [`TokenSource`] turns a prompt into a lazy, finite sequence of text
//! fragments. Each call to [`TokenSource::produce_fragments`] is independent;
//! dropping the returned stream stops production at the next yield point.

use std::path::PathBuf;
use std::pin::Pin;
use std::time::Duration;

use futures::Stream;

use crate::backend::BackendGenerator;
use crate::error::{LlmError, Result};
use crate::fallback::FallbackGenerator;
use crate::openai::{OpenAiClient, OpenAiConfig};

/// A stream of text fragments.
pub type FragmentStream = Pin<Box<dyn Stream<Item = String> + Send + 'static>>;

/// Everything needed to build a [`TokenSource`].
#[derive(Debug, Clone)]
pub struct TokenSourceConfig {
    /// Use the canned-response generator instead of a remote backend.
    pub use_fallback: bool,
    /// Remote backend settings (ignored when `use_fallback` is set).
    pub backend: OpenAiConfig,
    /// File holding the API key. Read once at construction.
    pub api_key_file: Option<PathBuf>,
    /// Lower bound of the fallback inter-fragment delay.
    pub fallback_min_delay: Duration,
    /// Upper bound of the fallback inter-fragment delay.
    pub fallback_max_delay: Duration,
}

impl Default for TokenSourceConfig {
    fn default() -> Self {
        Self {
            use_fallback: true,
            backend: OpenAiConfig::default(),
            api_key_file: None,
            fallback_min_delay: crate::fallback::DEFAULT_MIN_DELAY,
            fallback_max_delay: crate::fallback::DEFAULT_MAX_DELAY,
        }
    }
}

impl TokenSourceConfig {
    /// Config for the canned-response generator only.
    pub fn fallback() -> Self {
        Self::default()
    }

    /// Config for a remote backend.
    pub fn backend(backend: OpenAiConfig) -> Self {
        Self {
            use_fallback: false,
            backend,
            ..Default::default()
        }
    }

    /// Read the API key from a file instead of the backend config.
    pub fn with_api_key_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.api_key_file = Some(path.into());
        self
    }

    /// Set the fallback pacing range.
    pub fn with_fallback_delay(mut self, min: Duration, max: Duration) -> Self {
        self.fallback_min_delay = min;
        self.fallback_max_delay = max;
        self
    }
}

/// Produces text fragments for a prompt.
#[derive(Debug, Clone)]
pub enum TokenSource {
    /// Canned responses, never fails.
    Fallback(FallbackGenerator),
    /// Remote OpenAI-compatible backend that degrades to canned responses.
    Backend(BackendGenerator),
}

impl TokenSource {
    /// Build a token source from configuration.
    ///
    /// An explicitly configured key file that cannot be read, or that is
    /// empty, is a configuration error. Nothing touches the network here.
    pub fn from_config(config: &TokenSourceConfig) -> Result<Self> {
        let fallback =
            FallbackGenerator::with_delay_range(config.fallback_min_delay, config.fallback_max_delay);

        if config.use_fallback {
            return Ok(Self::Fallback(fallback));
        }

        let mut backend = config.backend.clone();
        if let Some(ref path) = config.api_key_file {
            backend.api_key = Some(read_key_file(path)?);
        }

        if backend.api_key.as_deref().is_none_or(str::is_empty) {
            tracing::warn!(
                backend = %backend.name,
                "No API key configured; every request will use fallback responses"
            );
        }

        let client = OpenAiClient::new(backend)?;
        Ok(Self::Backend(BackendGenerator::new(client, fallback)))
    }

    /// A fallback-only source with the given generator.
    pub fn fallback(generator: FallbackGenerator) -> Self {
        Self::Fallback(generator)
    }

    /// Produce the fragment sequence for one prompt.
    pub fn produce_fragments(&self, prompt: &str, system: Option<&str>) -> FragmentStream {
        match self {
            Self::Fallback(generator) => generator.stream(),
            Self::Backend(generator) => generator.stream(prompt, system),
        }
    }

    /// Short name of the active variant.
    pub fn name(&self) -> String {
        match self {
            Self::Fallback(_) => "fallback".to_string(),
            Self::Backend(generator) => {
                let config = generator.config();
                format!("{}:{}", config.name, config.model)
            }
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback(_))
    }
}

fn read_key_file(path: &std::path::Path) -> Result<String> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        LlmError::Config(format!("Failed to read API key file {}: {}", path.display(), e))
    })?;
    let key = contents.trim();
    if key.is_empty() {
        return Err(LlmError::Config(format!(
            "API key file {} is empty",
            path.display()
        )));
    }
    Ok(key.to_string())
}
