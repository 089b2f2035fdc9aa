//! Health check endpoints
//!
//! Health checks for monitoring and container orchestration.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::server::state::AppState;
use crate::services::rotation::HealthStatus;

/// Response for the main health check endpoint
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub environment: String,
    pub uptime_seconds: u64,
}

/// Response for the liveness check
#[derive(Serialize)]
pub struct LivenessResponse {
    pub alive: bool,
}

/// Overall status: healthy while any credential of any service is usable
///
/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let report = state.manager.status_report();
    Json(HealthResponse {
        status: report.health_status,
        version: state.settings.app_version.clone(),
        environment: state.settings.environment.to_string(),
        uptime_seconds: state.uptime_seconds(),
    })
}

/// GET /liveness
pub async fn liveness() -> Json<LivenessResponse> {
    Json(LivenessResponse { alive: true })
}
