//! WebSocket streaming chat server for Glazing.
//!
//! Each client connects to `/ws/{routing_key}` and sends prompts as text
//! frames; the answer streams back as `status`, `token` and `completion`
//! events produced by a [`glazing_llm::TokenSource`].
//!
//! # Features
//!
//! - One session per connection, tracked in a shared [`ConnectionRegistry`]
//! - Per-session keepalive pings
//! - Optional Redis persistence of session metadata
//! - `/ws/test` echo endpoint and `/healthz` health check
//! - Graceful shutdown on Ctrl-C
//!
//! # Example
//!
//! ```ignore
//! use glazing_llm::{TokenSource, TokenSourceConfig};
//! use glazing_server::{AppState, Server, ServerConfig};
//!
//! let source = TokenSource::from_config(&TokenSourceConfig::fallback())?;
//! let config = ServerConfig::new().with_bind_address("127.0.0.1:8000".parse()?);
//!
//! let server = Server::from_state(AppState::new(source, config));
//! server.run().await?;
//! ```

pub mod bridge;
pub mod config;
pub mod error;
pub mod keepalive;
pub mod registry;
pub mod routes;
pub mod session_store;
pub mod state;

pub use bridge::{BridgeError, BridgeOutput, FragmentSink, StreamingBridge};
pub use config::ServerConfig;
pub use error::{Result, ServerError};
pub use registry::{ConnectionRegistry, SessionEntry, SessionId};
pub use routes::{ClientMessage, HealthResponse, ServerMessage};
pub use session_store::{SessionStore, StoreError};
pub use state::AppState;

use std::future::Future;
use std::net::SocketAddr;

use axum::Router;
use axum::http::HeaderValue;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// The Glazing HTTP/WebSocket server.
pub struct Server {
    /// Application state.
    state: AppState,
}

impl Server {
    /// Create a server from a pre-built application state.
    pub fn from_state(state: AppState) -> Self {
        Self { state }
    }

    /// Build the router with all routes and middleware.
    pub fn router(&self) -> Router {
        use axum::routing::get;

        Router::new()
            .merge(routes::health_routes())
            // Static path wins over the routing-key capture
            .route("/ws/test", get(routes::ws_test_handler))
            .route("/ws/{routing_key}", get(routes::ws_handler))
            .layer(self.cors_layer())
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    fn cors_layer(&self) -> CorsLayer {
        let origins = &self.state.config.cors_origins;
        if origins.is_empty() {
            return CorsLayer::permissive();
        }

        let allowed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| match origin.parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods(Any)
            .allow_headers(Any)
    }

    /// Token cancelled when the server shuts down.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.state.shutdown.clone()
    }

    /// Run the server until Ctrl-C.
    pub async fn run(self) -> Result<()> {
        let addr = self.state.config.bind_address;
        self.run_on(addr).await
    }

    /// Run the server on a specific address (useful for testing).
    pub async fn run_on(self, addr: SocketAddr) -> Result<()> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        self.serve(listener, shutdown_signal()).await
    }

    /// Serve on an already bound listener until `signal` resolves.
    ///
    /// When the signal fires, the root cancellation token is cancelled so
    /// every open session drains and closes.
    pub async fn serve<F>(self, listener: TcpListener, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        let shutdown = self.state.shutdown.clone();
        let router = self.router();

        info!(
            %addr,
            llm = %self.state.token_source().name(),
            redis = self.state.store().is_some(),
            "Starting server"
        );

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                tokio::select! {
                    _ = signal => {}
                    _ = shutdown.cancelled() => {}
                }
                info!("Shutting down, closing sessions");
                shutdown.cancel();
            })
            .await?;

        info!("Server stopped");
        Ok(())
    }

    /// Get the configured bind address.
    pub fn bind_address(&self) -> SocketAddr {
        self.state.config.bind_address
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use glazing_llm::{FallbackGenerator, TokenSource};
    use tower::ServiceExt;

    fn test_server(config: ServerConfig) -> Server {
        Server::from_state(AppState::new(
            TokenSource::fallback(FallbackGenerator::instant()),
            config,
        ))
    }

    #[tokio::test]
    async fn test_server_health_endpoint() {
        let app = test_server(ServerConfig::new()).router();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/healthz")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_ws_route_requires_upgrade() {
        let app = test_server(ServerConfig::new()).router();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/ws/widget-1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn test_cors_allows_configured_origin() {
        let config = ServerConfig::new().with_cors_origins(vec!["https://example.com".to_string()]);
        let app = test_server(config).router();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/healthz")
                    .header("origin", "https://example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            response.headers().get("access-control-allow-origin").unwrap(),
            "https://example.com"
        );
    }

    #[test]
    fn test_server_config_builder() {
        let config = ServerConfig::new()
            .with_bind_address("127.0.0.1:9000".parse().unwrap())
            .with_keepalive_interval(std::time::Duration::from_secs(5))
            .with_max_ws_message_size(4096);

        let server = test_server(config);
        assert_eq!(server.bind_address().port(), 9000);
    }

    #[tokio::test]
    async fn test_serve_stops_on_signal() {
        let server = test_server(ServerConfig::new());
        let token = server.shutdown_token();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(server.serve(listener, async move {
            let _ = rx.await;
        }));

        tx.send(()).unwrap();
        handle.await.unwrap().unwrap();
        assert!(token.is_cancelled());
    }
}
