//! Common test utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Result;
use futures::{SinkExt, StreamExt};
use reqwest::Client;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use glazing_llm::{FallbackGenerator, TokenSource};
use glazing_server::{AppState, Server, ServerConfig};

/// How long to wait for any single frame.
pub const TIMEOUT: Duration = Duration::from_secs(5);

pub type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// A test server that runs in the background.
pub struct TestServer {
    /// The server's address.
    pub addr: SocketAddr,
    /// HTTP client configured for this server.
    pub client: Client,
    /// Shared state, for inspecting the registry.
    pub state: AppState,
    /// Cancels the server.
    pub shutdown: CancellationToken,
    /// Handle to the server task.
    handle: JoinHandle<()>,
}

impl TestServer {
    /// Start a test server with an instant fallback token source.
    pub async fn start() -> Result<Self> {
        Self::start_with(
            TokenSource::fallback(FallbackGenerator::instant()),
            ServerConfig::new(),
        )
        .await
    }

    /// Start a test server with a custom token source and config.
    pub async fn start_with(source: TokenSource, config: ServerConfig) -> Result<Self> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let state = AppState::new(source, config.with_bind_address(addr));
        let shutdown = state.shutdown_token().clone();

        // Start server in background
        let server = Server::from_state(state.clone());
        let signal = shutdown.clone();
        let handle = tokio::spawn(async move {
            let _ = server
                .serve(listener, async move { signal.cancelled().await })
                .await;
        });

        // Wait for server to be ready
        let client = Client::new();
        wait_for_server(&client, addr).await?;

        Ok(Self {
            addr,
            client,
            state,
            shutdown,
            handle,
        })
    }

    /// Get the base URL for the server.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// WebSocket URL for a path.
    pub fn ws_url(&self, path: &str) -> String {
        format!("ws://{}{}", self.addr, path)
    }

    /// Open a chat session and consume the welcome message.
    pub async fn connect(&self, routing_key: &str) -> Result<(WsStream, Value)> {
        let (mut ws, _) = connect_async(self.ws_url(&format!("/ws/{}", routing_key))).await?;
        let welcome = read_json(&mut ws).await?;
        Ok((ws, welcome))
    }

    /// Fetch the health document.
    pub async fn health(&self) -> Result<Value> {
        let resp = self
            .client
            .get(format!("{}/healthz", self.base_url()))
            .send()
            .await?;
        anyhow::ensure!(resp.status().is_success(), "health returned {}", resp.status());
        Ok(resp.json().await?)
    }

    /// Stop the server and wait for it to exit.
    pub async fn stop(self) -> Result<()> {
        self.shutdown.cancel();
        timeout(TIMEOUT, self.handle).await??;
        Ok(())
    }

    /// Poll until `check` holds or the timeout elapses.
    pub async fn wait_until(&self, check: impl Fn(&AppState) -> bool) -> bool {
        let deadline = tokio::time::Instant::now() + TIMEOUT;
        while tokio::time::Instant::now() < deadline {
            if check(&self.state) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        check(&self.state)
    }
}

/// Read the next text frame as JSON, skipping control frames.
pub async fn read_json(ws: &mut WsStream) -> Result<Value> {
    loop {
        let msg = timeout(TIMEOUT, ws.next())
            .await
            .map_err(|_| anyhow::anyhow!("timeout waiting for message"))?
            .ok_or_else(|| anyhow::anyhow!("stream closed"))??;
        if let Message::Text(text) = msg {
            return Ok(serde_json::from_str(&text)?);
        }
    }
}

/// Read events until the one that ends a prompt (`completion` or `error`).
pub async fn read_response(ws: &mut WsStream) -> Result<Vec<Value>> {
    let mut events = Vec::new();
    loop {
        let event = read_json(ws).await?;
        // Keepalive pings can interleave with a response
        if event["type"] == "ping" {
            continue;
        }
        let done = event["type"] == "completion" || event["type"] == "error";
        events.push(event);
        if done {
            return Ok(events);
        }
    }
}

/// Send a text frame.
pub async fn send_text(ws: &mut WsStream, text: &str) -> Result<()> {
    ws.send(Message::text(text.to_string())).await?;
    Ok(())
}

/// Wait for the server to become ready.
async fn wait_for_server(client: &Client, addr: SocketAddr) -> Result<()> {
    let url = format!("http://{}/healthz", addr);

    let result = timeout(Duration::from_secs(5), async {
        loop {
            match client.get(&url).send().await {
                Ok(resp) if resp.status().is_success() => return,
                _ => tokio::time::sleep(Duration::from_millis(50)).await,
            }
        }
    })
    .await;

    match result {
        Ok(()) => Ok(()),
        Err(_) => anyhow::bail!("Timeout waiting for server to start"),
    }
}
