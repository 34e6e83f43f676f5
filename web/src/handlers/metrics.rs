//! Prometheus scrape endpoint.

use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{OriginalUri, State},
    http::header,
    response::IntoResponse,
};

/// Render every recorded metric in Prometheus text format.
///
/// # Endpoint
///
/// ```text
/// GET /metrics
/// ```
///
/// # Errors
///
/// Returns 404 when metrics are disabled.
#[allow(clippy::unused_async)]
pub async fn render_metrics(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
) -> Result<impl IntoResponse, AppError> {
    let handle = state.metrics.as_ref().ok_or_else(|| AppError::not_found(uri.path()))?;

    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        handle.render(),
    ))
}
