//! Application state shared across handlers.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use glazing_llm::TokenSource;

use crate::bridge::StreamingBridge;
use crate::config::ServerConfig;
use crate::registry::ConnectionRegistry;
use crate::session_store::SessionStore;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,

    /// Produces response fragments.
    pub token_source: Arc<TokenSource>,

    /// Live sessions by routing key.
    pub registry: Arc<ConnectionRegistry>,

    /// Session persistence (None when Redis is disabled or unreachable).
    pub store: Option<SessionStore>,

    /// Root token; every session token is a child of it.
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Create a new application state.
    pub fn new(token_source: TokenSource, config: ServerConfig) -> Self {
        Self {
            config: Arc::new(config),
            token_source: Arc::new(token_source),
            registry: Arc::new(ConnectionRegistry::new()),
            store: None,
            shutdown: CancellationToken::new(),
        }
    }

    /// Create application state with session persistence.
    pub fn with_store(mut self, store: SessionStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn token_source(&self) -> &TokenSource {
        &self.token_source
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn store(&self) -> Option<&SessionStore> {
        self.store.as_ref()
    }

    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// A bridge over this state's token source.
    pub fn bridge(&self) -> StreamingBridge {
        StreamingBridge::new(Arc::clone(&self.token_source))
    }
}
