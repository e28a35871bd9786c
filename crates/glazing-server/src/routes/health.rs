//! Health check endpoints.

use axum::{Json, Router, extract::State, routing::get};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

/// Service name reported by the health check.
pub const SERVICE_NAME: &str = "glazing-ai-api";

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
    /// Service name.
    pub service: String,
    /// `disabled`, `healthy`, or `unhealthy: <reason>`.
    pub redis: String,
    /// Active token source.
    pub llm: String,
    /// Sessions currently registered.
    pub active_sessions: usize,
    /// RFC 3339 time of the check.
    pub timestamp: String,
}

/// Health check.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let redis = match state.store() {
        None => "disabled".to_string(),
        Some(store) => match store.ping().await {
            Ok(()) => "healthy".to_string(),
            Err(e) => format!("unhealthy: {}", e),
        },
    };

    Json(HealthResponse {
        status: "healthy".to_string(),
        service: SERVICE_NAME.to_string(),
        redis,
        llm: state.token_source().name(),
        active_sessions: state.registry().session_count(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// Create health check routes.
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/healthz", get(health))
        .route("/health", get(health))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::registry::{SessionEntry, SessionId};
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use glazing_llm::{FallbackGenerator, TokenSource};
    use tower::ServiceExt;

    fn test_state() -> AppState {
        AppState::new(
            TokenSource::fallback(FallbackGenerator::instant()),
            ServerConfig::new(),
        )
    }

    async fn get_health(state: AppState, uri: &str) -> HealthResponse {
        let app = health_routes().with_state(state);

        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let health = get_health(test_state(), "/healthz").await;

        assert_eq!(health.status, "healthy");
        assert_eq!(health.service, "glazing-ai-api");
        assert_eq!(health.redis, "disabled");
        assert_eq!(health.llm, "fallback");
        assert_eq!(health.active_sessions, 0);
        assert!(chrono::DateTime::parse_from_rfc3339(&health.timestamp).is_ok());
    }

    #[tokio::test]
    async fn test_health_alias_counts_sessions() {
        let state = test_state();
        state
            .registry()
            .register("widget-1", SessionEntry::new(SessionId::new()));

        let health = get_health(state, "/health").await;
        assert_eq!(health.active_sessions, 1);
    }
}
