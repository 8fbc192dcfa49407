//! Health and status handlers.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use courtline_models::StatusReport;

use crate::state::AppState;

/// Health response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    /// Live streams
    pub streams: usize,
}

/// Liveness probe.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        streams: state.pipeline.registry().len().await,
    })
}

/// Catalog size, live streams, queue depth and worker counters.
pub async fn status(State(state): State<AppState>) -> Json<StatusReport> {
    Json(state.pipeline.status().await)
}
