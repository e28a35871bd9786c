//! WebSocket protocol types for client-server communication.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::registry::SessionId;

/// Status message sent before a response starts streaming.
pub const THINKING: &str = "thinking";

/// A decoded inbound payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// Application-level ping.
    Ping,
    /// Text to answer.
    Prompt(String),
}

/// Structured form of an inbound payload.
#[derive(Debug, Deserialize)]
struct InboundEnvelope {
    #[serde(rename = "type", default)]
    kind: Option<serde_json::Value>,
    #[serde(default)]
    message: Option<serde_json::Value>,
}

impl ClientMessage {
    /// Classify a raw text payload.
    ///
    /// Anything that is not a JSON object is a plain-text prompt. A JSON
    /// object with `"type": "ping"` is a ping; otherwise its string `message`
    /// field is the prompt, falling back to the raw payload.
    pub fn parse(raw: &str) -> Self {
        let Ok(envelope) = serde_json::from_str::<InboundEnvelope>(raw) else {
            return Self::Prompt(raw.to_string());
        };

        if envelope.kind.as_ref().and_then(|k| k.as_str()) == Some("ping") {
            return Self::Ping;
        }

        match envelope.message {
            Some(serde_json::Value::String(message)) => Self::Prompt(message),
            _ => Self::Prompt(raw.to_string()),
        }
    }
}

/// Messages from server to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Connection-level notice (welcome).
    System {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
        message: String,
        timestamp: String,
    },
    /// Reply to an application ping.
    Pong {
        session_id: String,
        timestamp: String,
    },
    /// Processing status.
    Status {
        session_id: String,
        message: String,
        timestamp: String,
    },
    /// One streamed fragment.
    Token {
        session_id: String,
        token: String,
        timestamp: String,
    },
    /// The full response, after the last token.
    Completion {
        session_id: String,
        message: String,
        elapsed_ms: u64,
        timestamp: String,
    },
    /// A message could not be processed.
    Error {
        session_id: String,
        message: String,
        timestamp: String,
    },
    /// Keepalive ping.
    Ping {
        session_id: String,
        timestamp: String,
    },
    /// Test endpoint echo.
    Echo { message: String, timestamp: String },
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

impl ServerMessage {
    /// Create a system message.
    pub fn system(session_id: Option<&SessionId>, message: impl Into<String>) -> Self {
        Self::System {
            session_id: session_id.map(|id| id.to_string()),
            message: message.into(),
            timestamp: now(),
        }
    }

    /// Create a pong message.
    pub fn pong(session_id: &SessionId) -> Self {
        Self::Pong {
            session_id: session_id.to_string(),
            timestamp: now(),
        }
    }

    /// Create a status message.
    pub fn status(session_id: &SessionId, message: impl Into<String>) -> Self {
        Self::Status {
            session_id: session_id.to_string(),
            message: message.into(),
            timestamp: now(),
        }
    }

    /// Create a token message.
    pub fn token(session_id: &SessionId, token: impl Into<String>) -> Self {
        Self::Token {
            session_id: session_id.to_string(),
            token: token.into(),
            timestamp: now(),
        }
    }

    /// Create a completion message.
    pub fn completion(session_id: &SessionId, message: impl Into<String>, elapsed_ms: u64) -> Self {
        Self::Completion {
            session_id: session_id.to_string(),
            message: message.into(),
            elapsed_ms,
            timestamp: now(),
        }
    }

    /// Create an error message.
    pub fn error(session_id: &SessionId, message: impl Into<String>) -> Self {
        Self::Error {
            session_id: session_id.to_string(),
            message: message.into(),
            timestamp: now(),
        }
    }

    /// Create a keepalive ping.
    pub fn ping(session_id: &SessionId) -> Self {
        Self::Ping {
            session_id: session_id.to_string(),
            timestamp: now(),
        }
    }

    /// Create an echo message.
    pub fn echo(message: impl Into<String>) -> Self {
        Self::Echo {
            message: message.into(),
            timestamp: now(),
        }
    }

    /// Wire name of this message's type.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::System { .. } => "system",
            Self::Pong { .. } => "pong",
            Self::Status { .. } => "status",
            Self::Token { .. } => "token",
            Self::Completion { .. } => "completion",
            Self::Error { .. } => "error",
            Self::Ping { .. } => "ping",
            Self::Echo { .. } => "echo",
        }
    }
}
