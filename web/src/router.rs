//! Router configuration.

use crate::error::AppError;
use crate::handlers::{
    allocate_admin_id, allocate_booking_id, allocate_driver_id, allocate_passenger_id,
    health_check, readiness_check, render_metrics,
};
use crate::middleware::request_id_layer;
use crate::state::AppState;
use axum::{
    extract::OriginalUri,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Build the complete Axum router.
///
/// - `POST /api/ids/{booking,driver,admin,passenger}`
/// - `GET /health`, `GET /ready`
/// - `GET /metrics`
pub fn build_router(state: AppState) -> Router {
    let id_routes = Router::new()
        .route("/booking", post(allocate_booking_id))
        .route("/driver", post(allocate_driver_id))
        .route("/admin", post(allocate_admin_id))
        .route("/passenger", post(allocate_passenger_id));

    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(render_metrics))
        .nest("/api/ids", id_routes)
        .fallback(not_found)
        .layer(request_id_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[allow(clippy::unused_async)]
async fn not_found(OriginalUri(uri): OriginalUri) -> AppError {
    AppError::not_found(uri.path())
}
