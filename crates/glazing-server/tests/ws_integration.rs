//! End-to-end WebSocket tests against a running server.

mod common;

use std::time::Duration;

use anyhow::Result;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use common::{TIMEOUT, TestServer, read_json, read_response, send_text};
use glazing_llm::{
    FALLBACK_RESPONSES, FallbackGenerator, OpenAiConfig, TokenSource, TokenSourceConfig,
};
use glazing_server::{ServerConfig, SessionId};

fn session_id(event: &Value) -> SessionId {
    serde_json::from_value(event["session_id"].clone()).expect("session_id is a uuid")
}

/// Check the status → tokens → completion shape and return the completion text.
fn assert_streamed(events: &[Value]) -> String {
    assert_eq!(events[0]["type"], "status");
    assert_eq!(events[0]["message"], "thinking");

    let completion = events.last().unwrap();
    assert_eq!(completion["type"], "completion", "events: {events:?}");
    assert!(completion["elapsed_ms"].is_u64());

    let tokens: String = events[1..events.len() - 1]
        .iter()
        .map(|e| {
            assert_eq!(e["type"], "token");
            e["token"].as_str().unwrap()
        })
        .collect();
    assert_eq!(tokens, completion["message"].as_str().unwrap());
    tokens
}

// ─────────────────────────────────────────────────────────────────────────────
// Session lifecycle
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_welcome_message() -> Result<()> {
    let server = TestServer::start().await?;
    let (_ws, welcome) = server.connect("widget-1").await?;

    assert_eq!(welcome["type"], "system");
    assert_eq!(
        welcome["message"],
        "Connected successfully with widget key: widget-1"
    );
    assert!(welcome["timestamp"].is_string());
    session_id(&welcome);

    Ok(())
}

#[tokio::test]
async fn test_registry_tracks_connect_and_disconnect() -> Result<()> {
    let server = TestServer::start().await?;

    let (mut first, welcome) = server.connect("widget-1").await?;
    let first_id = session_id(&welcome);
    assert!(server.state.registry().contains("widget-1", &first_id));

    let (second, welcome) = server.connect("widget-1").await?;
    let second_id = session_id(&welcome);
    assert_eq!(
        server.state.registry().sessions("widget-1"),
        vec![first_id, second_id]
    );

    // Closing the second session leaves the first registered
    drop(second);
    assert!(
        server
            .wait_until(|s| !s.registry().contains("widget-1", &second_id))
            .await
    );
    assert!(server.state.registry().contains("widget-1", &first_id));

    first.close(None).await?;
    assert!(server.wait_until(|s| s.registry().session_count() == 0).await);
    assert_eq!(server.state.registry().routing_key_count(), 0);

    Ok(())
}

#[tokio::test]
async fn test_shutdown_closes_sessions() -> Result<()> {
    let server = TestServer::start().await?;
    let (mut ws, _) = server.connect("widget-1").await?;

    let state = server.state.clone();
    server.stop().await?;

    // The client sees the socket close
    let closed = timeout(TIMEOUT, async {
        while let Some(msg) = ws.next().await {
            match msg {
                Ok(Message::Close(_)) | Err(_) => return,
                Ok(_) => continue,
            }
        }
    })
    .await;
    assert!(closed.is_ok());

    let deadline = tokio::time::Instant::now() + TIMEOUT;
    while state.registry().session_count() > 0 && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(state.registry().session_count(), 0);

    Ok(())
}

#[tokio::test]
async fn test_close_mid_response_drains_promptly() -> Result<()> {
    // Every response has at least nine words, so it takes seconds to finish
    let source = TokenSource::fallback(FallbackGenerator::with_delay_range(
        Duration::from_millis(600),
        Duration::from_millis(600),
    ));
    let server = TestServer::start_with(source, ServerConfig::new()).await?;
    let (mut ws, welcome) = server.connect("widget-1").await?;
    let id = session_id(&welcome);

    send_text(&mut ws, "hello").await?;
    assert_eq!(read_json(&mut ws).await?["type"], "status");

    // Close frame sent, TCP left open
    ws.close(None).await?;

    let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
    while server.state.registry().contains("widget-1", &id)
        && tokio::time::Instant::now() < deadline
    {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(!server.state.registry().contains("widget-1", &id));

    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Message dispatch
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_ping_yields_only_pong() -> Result<()> {
    let server = TestServer::start().await?;
    let (mut ws, welcome) = server.connect("widget-1").await?;

    send_text(&mut ws, r#"{"type":"ping"}"#).await?;
    let pong = read_json(&mut ws).await?;
    assert_eq!(pong["type"], "pong");
    assert_eq!(pong["session_id"], welcome["session_id"]);

    // The next event belongs to the next message, so nothing followed the pong
    send_text(&mut ws, "hello").await?;
    let next = read_json(&mut ws).await?;
    assert_eq!(next["type"], "status");

    Ok(())
}

#[tokio::test]
async fn test_plain_text_prompt_streams_response() -> Result<()> {
    let server = TestServer::start().await?;
    let (mut ws, welcome) = server.connect("widget-1").await?;

    send_text(&mut ws, "hello").await?;
    let events = read_response(&mut ws).await?;

    let text = assert_streamed(&events);
    assert!(FALLBACK_RESPONSES.contains(&text.trim_end()));
    assert!(events.iter().all(|e| e["session_id"] == welcome["session_id"]));

    Ok(())
}

#[tokio::test]
async fn test_json_prompt_streams_response() -> Result<()> {
    let server = TestServer::start().await?;
    let (mut ws, _) = server.connect("widget-1").await?;

    send_text(&mut ws, r#"{"type":"text","message":"hello"}"#).await?;
    assert_streamed(&read_response(&mut ws).await?);

    // Messages on one session are answered in order
    send_text(&mut ws, "again").await?;
    assert_streamed(&read_response(&mut ws).await?);

    Ok(())
}

#[tokio::test]
async fn test_invalid_binary_frame_reports_error() -> Result<()> {
    let server = TestServer::start().await?;
    let (mut ws, _) = server.connect("widget-1").await?;

    ws.send(Message::binary(vec![0xff, 0xfe, 0xfd])).await?;
    let error = read_json(&mut ws).await?;
    assert_eq!(error["type"], "error");

    // The session survives
    send_text(&mut ws, r#"{"type":"ping"}"#).await?;
    assert_eq!(read_json(&mut ws).await?["type"], "pong");

    Ok(())
}

#[tokio::test]
async fn test_backend_failure_falls_back_without_error() -> Result<()> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let dead_addr = listener.local_addr()?;
    drop(listener);

    let config = TokenSourceConfig::backend(
        OpenAiConfig::openai("sk-test").with_base_url(format!("http://{}/v1", dead_addr)),
    )
    .with_fallback_delay(Duration::ZERO, Duration::ZERO);
    let source = TokenSource::from_config(&config)?;

    let server = TestServer::start_with(source, ServerConfig::new()).await?;
    let (mut ws, _) = server.connect("widget-1").await?;

    send_text(&mut ws, "hello").await?;
    let events = read_response(&mut ws).await?;

    assert!(events.iter().all(|e| e["type"] != "error"));
    let text = assert_streamed(&events);
    assert!(!text.is_empty());
    assert!(FALLBACK_RESPONSES.contains(&text.trim_end()));

    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Keepalive
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_keepalive_pings() -> Result<()> {
    let config = ServerConfig::new().with_keepalive_interval(Duration::from_millis(100));
    let server = TestServer::start_with(
        TokenSource::fallback(FallbackGenerator::instant()),
        config,
    )
    .await?;
    let (mut ws, welcome) = server.connect("widget-1").await?;

    let ping = timeout(Duration::from_secs(1), read_json(&mut ws)).await??;
    assert_eq!(ping["type"], "ping");
    assert_eq!(ping["session_id"], welcome["session_id"]);

    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Test endpoint and health
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_echo_endpoint() -> Result<()> {
    let server = TestServer::start().await?;
    let (mut ws, _) = connect_async(server.ws_url("/ws/test")).await?;

    let welcome = read_json(&mut ws).await?;
    assert_eq!(welcome["type"], "system");
    assert_eq!(welcome["message"], "Connected to test endpoint");
    assert!(welcome.get("session_id").is_none());

    send_text(&mut ws, "marco").await?;
    let echo = read_json(&mut ws).await?;
    assert_eq!(echo["type"], "echo");
    assert_eq!(echo["message"], "You sent: marco");

    // The echo endpoint never registers a session
    assert_eq!(server.state.registry().session_count(), 0);

    Ok(())
}

#[tokio::test]
async fn test_health_reports_sessions() -> Result<()> {
    let server = TestServer::start().await?;

    let health = server.health().await?;
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["service"], "glazing-ai-api");
    assert_eq!(health["redis"], "disabled");
    assert_eq!(health["llm"], "fallback");
    assert_eq!(health["active_sessions"], 0);

    let (_ws, _) = server.connect("widget-1").await?;
    let health = server.health().await?;
    assert_eq!(health["active_sessions"], 1);

    Ok(())
}
