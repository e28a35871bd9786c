//! Optional Redis persistence of session metadata.
//!
//! Each live session is written to `session:{id}` with a TTL when it connects
//! and deleted when it closes. Nothing reads these records back; they exist
//! for operators and other services. Failures never affect the protocol.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use redis::RedisResult;
use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::registry::SessionId;

/// Default record lifetime (24 hours).
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(86_400);

/// Default bound on any single Redis round trip.
pub const DEFAULT_OP_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("redis did not answer within {0:?}")]
    Timeout(Duration),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// The stored form of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub routing_key: String,
    pub created_at: DateTime<Utc>,
}

/// Redis key for a session record.
pub fn session_key(session_id: &SessionId) -> String {
    format!("session:{}", session_id)
}

/// Redis-backed session store.
///
/// Holds one multiplexed, self-reconnecting connection shared by every
/// session. Each call is bounded by the store's operation timeout.
#[derive(Clone)]
pub struct SessionStore {
    conn: ConnectionManager,
    ttl: Duration,
    op_timeout: Duration,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("ttl", &self.ttl)
            .field("op_timeout", &self.op_timeout)
            .finish_non_exhaustive()
    }
}

impl SessionStore {
    /// Connect to `url` and verify the server answers.
    pub async fn connect(url: &str, ttl: Duration) -> Result<Self, StoreError> {
        Self::connect_with_timeout(url, ttl, DEFAULT_OP_TIMEOUT).await
    }

    /// Connect with a custom per-operation timeout.
    pub async fn connect_with_timeout(
        url: &str,
        ttl: Duration,
        op_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let conn = bounded(op_timeout, ConnectionManager::new(client)).await?;

        let store = Self {
            conn,
            ttl,
            op_timeout,
        };
        store.ping().await?;
        Ok(store)
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        bounded(
            self.op_timeout,
            redis::cmd("PING").query_async::<_, String>(&mut conn),
        )
        .await?;
        Ok(())
    }

    /// Write the record for a newly connected session.
    pub async fn record_session(
        &self,
        session_id: &SessionId,
        routing_key: &str,
    ) -> Result<(), StoreError> {
        let record = SessionRecord {
            routing_key: routing_key.to_string(),
            created_at: Utc::now(),
        };
        let payload = serde_json::to_string(&record)?;

        let mut conn = self.conn.clone();
        bounded(
            self.op_timeout,
            redis::cmd("SETEX")
                .arg(session_key(session_id))
                .arg(self.ttl.as_secs().max(1))
                .arg(payload)
                .query_async::<_, ()>(&mut conn),
        )
        .await?;

        tracing::debug!(session_id = %session_id, routing_key, "Session persisted");
        Ok(())
    }

    /// Delete a session's record.
    pub async fn remove_session(&self, session_id: &SessionId) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        bounded(
            self.op_timeout,
            redis::cmd("DEL")
                .arg(session_key(session_id))
                .query_async::<_, ()>(&mut conn),
        )
        .await?;
        Ok(())
    }
}

async fn bounded<T, F>(limit: Duration, fut: F) -> Result<T, StoreError>
where
    F: Future<Output = RedisResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(StoreError::Timeout(limit)),
    }
}
