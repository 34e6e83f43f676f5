//! Health check endpoints.
//!
//! These endpoints are used by load balancers and orchestrators to decide whether an
//! instance should receive traffic.

use crate::state::AppState;
use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

/// Readiness report.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Readiness {
    /// `ready` or `unavailable`.
    pub status: String,
    /// Why the instance is not ready, if it is not.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Simple health check endpoint (for basic liveness).
///
/// Returns 200 OK to indicate the process is running. Does NOT check the store.
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

/// Readiness check backed by a store ping.
///
/// # Status Codes
///
/// - 200 OK: the counter store answered
/// - 503 Service Unavailable: the counter store could not be reached
///
/// # Endpoint
///
/// ```text
/// GET /ready
/// ```
pub async fn readiness_check(State(state): State<AppState>) -> (StatusCode, Json<Readiness>) {
    match state.allocator.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(Readiness {
                status: "ready".to_string(),
                reason: None,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(Readiness {
                    status: "unavailable".to_string(),
                    reason: Some(e.to_string()),
                }),
            )
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use seqalloc_runtime::SequenceAllocator;
    use seqalloc_testing::InMemoryCounterStore;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_simple_health_check() {
        let (status, body) = health_check().await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn test_readiness_follows_store() {
        let store = InMemoryCounterStore::new();
        let state = AppState::new(SequenceAllocator::new(Arc::new(store.clone())));

        let (status, Json(report)) = readiness_check(State(state.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report.status, "ready");

        store.set_unavailable(true);
        let (status, Json(report)) = readiness_check(State(state)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(report.status, "unavailable");
        assert!(report.reason.is_some());
    }
}
