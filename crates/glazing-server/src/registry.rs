//! Process-wide registry of live WebSocket sessions.
//!
//! Sessions are grouped by routing key (the widget id from the connection
//! path) and kept in connect order. The lock is never held across an await.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a connected session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Create a new random session ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One live session as seen by the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEntry {
    pub session_id: SessionId,
    pub connected_at: DateTime<Utc>,
}

impl SessionEntry {
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            connected_at: Utc::now(),
        }
    }
}

/// Maps routing keys to their live sessions.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    inner: Mutex<HashMap<String, Vec<SessionEntry>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a session under `routing_key`.
    ///
    /// Registering a session that is already present is a no-op.
    pub fn register(&self, routing_key: &str, entry: SessionEntry) {
        let mut inner = self.inner.lock();
        let sessions = inner.entry(routing_key.to_string()).or_default();
        if sessions.iter().any(|e| e.session_id == entry.session_id) {
            return;
        }
        tracing::debug!(
            routing_key,
            session_id = %entry.session_id,
            peers = sessions.len(),
            "Session registered"
        );
        sessions.push(entry);
    }

    /// Remove a session. Returns `true` if it was present.
    ///
    /// Empty routing keys are dropped immediately.
    pub fn unregister(&self, routing_key: &str, session_id: &SessionId) -> bool {
        let mut inner = self.inner.lock();
        let Some(sessions) = inner.get_mut(routing_key) else {
            return false;
        };

        let before = sessions.len();
        sessions.retain(|e| e.session_id != *session_id);
        let removed = sessions.len() != before;

        if sessions.is_empty() {
            inner.remove(routing_key);
        }
        if removed {
            tracing::debug!(routing_key, session_id = %session_id, "Session unregistered");
        }
        removed
    }

    /// Session ids under `routing_key`, in connect order.
    pub fn sessions(&self, routing_key: &str) -> Vec<SessionId> {
        self.inner
            .lock()
            .get(routing_key)
            .map(|sessions| sessions.iter().map(|e| e.session_id).collect())
            .unwrap_or_default()
    }

    pub fn contains(&self, routing_key: &str, session_id: &SessionId) -> bool {
        self.inner
            .lock()
            .get(routing_key)
            .is_some_and(|sessions| sessions.iter().any(|e| e.session_id == *session_id))
    }

    /// Number of routing keys with at least one live session.
    pub fn routing_key_count(&self) -> usize {
        self.inner.lock().len()
    }

    /// Total number of live sessions.
    pub fn session_count(&self) -> usize {
        self.inner.lock().values().map(Vec::len).sum()
    }
}
