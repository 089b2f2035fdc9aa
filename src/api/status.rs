//! Status and metrics endpoints

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    Json,
};

use crate::error::ApiError;
use crate::server::state::AppState;
use crate::services::rotation::StatusReport;

/// Full per-service credential report
///
/// GET /status
pub async fn status_report(State(state): State<AppState>) -> Json<StatusReport> {
    Json(state.manager.status_report())
}

/// Prometheus text exposition of the rotation counters
///
/// GET /metrics
pub async fn metrics(State(state): State<AppState>) -> Result<Response, ApiError> {
    let body = state
        .manager
        .metrics()
        .render()
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("Failed to encode metrics: {}", e)))?;

    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response())
}
