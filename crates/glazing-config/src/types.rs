//! Configuration types mapping to the TOML schema.
//!
//! Top-level config:
//! ```toml
//! [server]                 # bind address, CORS, keepalive
//! [llm]                    # token source selection and backend settings
//! [session]                # session metadata TTL
//! [session.redis]          # optional persistence store
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, Result};

/// Default model name for the remote backend.
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Default OpenAI-compatible API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Default instruction sent as the system message on every prompt.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant embedded in a website chat widget. \
Answer the visitor's questions clearly and concisely.";

/// Default session metadata TTL (24 hours).
pub const DEFAULT_SESSION_TTL_SECS: u64 = 86_400;

/// Default keepalive interval.
pub const DEFAULT_KEEPALIVE_INTERVAL_SECS: u64 = 30;

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so that partial configs (e.g., project-local
/// overrides) can be loaded and merged. Use the accessor methods to read a
/// section with defaults applied.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GlazingConfig {
    /// Server configuration.
    pub server: Option<ServerConfig>,

    /// Token source configuration.
    pub llm: Option<LlmConfig>,

    /// Session metadata configuration.
    pub session: Option<SessionConfig>,
}

impl GlazingConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    pub fn merge(&mut self, other: GlazingConfig) {
        if other.server.is_some() {
            self.server = other.server;
        }

        if other.llm.is_some() {
            self.llm = other.llm;
        }

        if other.session.is_some() {
            self.session = other.session;
        }
    }

    /// Server section with defaults applied.
    pub fn server(&self) -> ServerConfig {
        self.server.clone().unwrap_or_default()
    }

    /// LLM section with defaults applied.
    pub fn llm(&self) -> LlmConfig {
        self.llm.clone().unwrap_or_default()
    }

    /// Session section with defaults applied.
    pub fn session(&self) -> SessionConfig {
        self.session.clone().unwrap_or_default()
    }

    /// A copy of this config with secrets replaced, safe to print.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if let Some(ref mut llm) = copy.llm
            && llm.api_key.is_some()
        {
            llm.api_key = Some("<redacted>".to_string());
        }
        copy
    }

    /// Apply environment variable overrides.
    ///
    /// `lookup` abstracts `std::env::var` so that callers (and tests) can
    /// supply their own environment. The API key is not handled here, see
    /// [`crate::secrets::resolve_api_key`]. Recognised variables:
    ///
    /// | variable             | field                          |
    /// |----------------------|--------------------------------|
    /// | `USE_FAKE_LLM`       | `llm.use_fake`                 |
    /// | `OPENAI_BASE_URL`    | `llm.base_url`                 |
    /// | `MODEL_NAME`         | `llm.model`                    |
    /// | `TEMPERATURE`        | `llm.temperature`              |
    /// | `SYSTEM_PROMPT`      | `llm.system_prompt`            |
    /// | `SYSTEM_PROMPT_FILE` | `llm.system_prompt_file`       |
    /// | `USE_REDIS`          | `session.redis.enabled`        |
    /// | `REDIS_HOST`         | `session.redis.host`           |
    /// | `REDIS_PORT`         | `session.redis.port`           |
    /// | `GLAZING_BIND`       | `server.bind`                  |
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.is_empty());

        if let Some(bind) = get("GLAZING_BIND") {
            let mut server = self.server();
            server.bind = parse_env("GLAZING_BIND", &bind)?;
            self.server = Some(server);
        }

        let mut llm = self.llm();
        let mut llm_touched = false;
        if let Some(v) = get("USE_FAKE_LLM") {
            llm.use_fake = parse_bool_env("USE_FAKE_LLM", &v)?;
            llm_touched = true;
        }
        if let Some(v) = get("OPENAI_BASE_URL") {
            llm.base_url = v;
            llm_touched = true;
        }
        if let Some(v) = get("MODEL_NAME") {
            llm.model = v;
            llm_touched = true;
        }
        if let Some(v) = get("TEMPERATURE") {
            llm.temperature = parse_env("TEMPERATURE", &v)?;
            llm_touched = true;
        }
        if let Some(v) = get("SYSTEM_PROMPT") {
            llm.system_prompt = Some(v);
            llm_touched = true;
        }
        if let Some(v) = get("SYSTEM_PROMPT_FILE") {
            llm.system_prompt_file = Some(PathBuf::from(v));
            llm_touched = true;
        }
        if llm_touched {
            self.llm = Some(llm);
        }

        let mut session = self.session();
        let mut session_touched = false;
        if let Some(v) = get("USE_REDIS") {
            session.redis.enabled = parse_bool_env("USE_REDIS", &v)?;
            session_touched = true;
        }
        if let Some(v) = get("REDIS_HOST") {
            session.redis.host = v;
            session_touched = true;
        }
        if let Some(v) = get("REDIS_PORT") {
            session.redis.port = parse_env("REDIS_PORT", &v)?;
            session_touched = true;
        }
        if session_touched {
            self.session = Some(session);
        }

        Ok(())
    }

    /// Check invariants that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        let llm = self.llm();
        if !(0.0..=2.0).contains(&llm.temperature) {
            return Err(ConfigError::Invalid {
                field: "llm.temperature".to_string(),
                reason: format!("{} is outside 0.0..=2.0", llm.temperature),
            });
        }
        if llm.fallback_min_delay_ms > llm.fallback_max_delay_ms {
            return Err(ConfigError::Invalid {
                field: "llm.fallback_min_delay_ms".to_string(),
                reason: "must not exceed fallback_max_delay_ms".to_string(),
            });
        }
        if self.server().keepalive_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "server.keepalive_interval_secs".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

fn parse_env<T>(name: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidEnv {
        name: name.to_string(),
        value: value.to_string(),
        reason: e.to_string(),
    })
}

/// Parse a boolean env value the way the widget deployment scripts set them.
fn parse_bool_env(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidEnv {
            name: name.to_string(),
            value: value.to_string(),
            reason: "expected true or false".to_string(),
        }),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Server Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind: SocketAddr,
    /// CORS allowed origins (empty = any origin).
    pub cors_origins: Vec<String>,
    /// Seconds between keepalive pings on each session.
    pub keepalive_interval_secs: u64,
    /// Maximum inbound WebSocket message size in bytes.
    pub max_ws_message_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8000)),
            cors_origins: Vec::new(),
            keepalive_interval_secs: DEFAULT_KEEPALIVE_INTERVAL_SECS,
            max_ws_message_size: 1024 * 1024,
        }
    }
}

impl ServerConfig {
    /// Keepalive interval as a duration.
    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_secs(self.keepalive_interval_secs)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// LLM Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Token source configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Use the canned fallback generator instead of the remote backend.
    pub use_fake: bool,
    /// Model identifier sent to the backend.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// OpenAI-compatible API base URL.
    pub base_url: String,
    /// API key (prefer the env var; warns if set here).
    pub api_key: Option<String>,
    /// File holding the API key. An unreadable file is a start-up error.
    pub api_key_file: Option<PathBuf>,
    /// Inline system instruction.
    pub system_prompt: Option<String>,
    /// File holding the system instruction, read once at start-up.
    pub system_prompt_file: Option<PathBuf>,
    /// Backend request timeout in seconds.
    pub timeout_secs: u64,
    /// Lower bound of the fallback generator's inter-fragment delay.
    pub fallback_min_delay_ms: u64,
    /// Upper bound of the fallback generator's inter-fragment delay.
    pub fallback_max_delay_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            use_fake: true,
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            api_key_file: None,
            system_prompt: None,
            system_prompt_file: None,
            timeout_secs: 300,
            fallback_min_delay_ms: 100,
            fallback_max_delay_ms: 300,
        }
    }
}

impl LlmConfig {
    /// Returns true if an API key is stored directly in the config file.
    pub fn has_plaintext_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Resolve the system instruction.
    ///
    /// The file wins over the inline value; with neither set the built-in
    /// default is used.
    pub fn load_system_prompt(&self) -> Result<String> {
        if let Some(ref path) = self.system_prompt_file {
            return read_trimmed(path);
        }
        Ok(self
            .system_prompt
            .clone()
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()))
    }

    /// Backend request timeout as a duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn read_trimmed(path: &Path) -> Result<String> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(contents.trim().to_string())
}

// ─────────────────────────────────────────────────────────────────────────────
// Session Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Session metadata configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// TTL for persisted session records.
    pub ttl_secs: u64,
    /// Redis persistence store.
    pub redis: RedisConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: DEFAULT_SESSION_TTL_SECS,
            redis: RedisConfig::default(),
        }
    }
}

/// Redis connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub db: u8,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: "redis".to_string(),
            port: 6379,
            db: 0,
        }
    }
}

impl RedisConfig {
    /// Connection URL in the form the `redis` crate expects.
    pub fn url(&self) -> String {
        format!("redis://{}:{}/{}", self.host, self.port, self.db)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
