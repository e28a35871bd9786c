//! Server configuration.

use std::net::SocketAddr;
use std::time::Duration;

use crate::keepalive::MIN_KEEPALIVE_INTERVAL;

/// Default interval between keepalive pings (30 seconds).
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// Default max message size for WebSocket (1 MB).
pub const DEFAULT_MAX_WS_MESSAGE_SIZE: usize = 1024 * 1024;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server to.
    pub bind_address: SocketAddr,

    /// CORS allowed origins (empty = any origin).
    pub cors_origins: Vec<String>,

    /// Interval between keepalive pings on each session.
    pub keepalive_interval: Duration,

    /// Maximum WebSocket message size in bytes.
    pub max_ws_message_size: usize,

    /// System instruction sent with every prompt.
    pub system_prompt: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 8000)),
            cors_origins: Vec::new(),
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
            max_ws_message_size: DEFAULT_MAX_WS_MESSAGE_SIZE,
            system_prompt: None,
        }
    }
}

impl ServerConfig {
    /// Create a server config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the bind address.
    pub fn with_bind_address(mut self, addr: SocketAddr) -> Self {
        self.bind_address = addr;
        self
    }

    /// Set CORS allowed origins.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = origins;
        self
    }

    /// Set the keepalive ping interval, raised to at least
    /// [`MIN_KEEPALIVE_INTERVAL`].
    pub fn with_keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = interval.max(MIN_KEEPALIVE_INTERVAL);
        self
    }

    /// Set the maximum WebSocket message size.
    pub fn with_max_ws_message_size(mut self, size: usize) -> Self {
        self.max_ws_message_size = size;
        self
    }

    /// Set the system instruction. Blank instructions are treated as absent.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        let prompt = prompt.into();
        self.system_prompt = (!prompt.trim().is_empty()).then_some(prompt);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::new();
        assert_eq!(config.bind_address.port(), 8000);
        assert_eq!(config.keepalive_interval, Duration::from_secs(30));
        assert!(config.cors_origins.is_empty());
        assert!(config.system_prompt.is_none());
    }

    #[test]
    fn test_blank_system_prompt_is_absent() {
        let config = ServerConfig::new().with_system_prompt("  \n");
        assert!(config.system_prompt.is_none());

        let config = ServerConfig::new().with_system_prompt("Be brief.");
        assert_eq!(config.system_prompt.as_deref(), Some("Be brief."));
    }

    #[test]
    fn test_zero_keepalive_interval_is_raised() {
        let config = ServerConfig::new().with_keepalive_interval(Duration::ZERO);
        assert_eq!(config.keepalive_interval, MIN_KEEPALIVE_INTERVAL);
    }
}
