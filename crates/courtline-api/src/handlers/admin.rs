//! Admin handlers for inspecting and evicting live streams.

use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use courtline_models::{StreamKey, Verdict};
use courtline_worker::StreamInfo;

use crate::auth::AdminUser;
use crate::error::ApiResult;
use crate::state::AppState;

/// One live stream in the admin listing.
#[derive(Debug, Serialize)]
pub struct StreamSummary {
    pub court_id: String,
    pub cam_id: String,
    pub fps: u32,
    pub registered_at: DateTime<Utc>,
    pub positions: usize,
    pub verdict: Verdict,
    pub replay_frames: usize,
    pub zones_configured: bool,
}

impl From<StreamInfo> for StreamSummary {
    fn from(info: StreamInfo) -> Self {
        Self {
            court_id: info.key.court_id,
            cam_id: info.key.cam_id,
            fps: info.fps,
            registered_at: info.registered_at,
            positions: info.positions,
            verdict: info.verdict,
            replay_frames: info.replay_frames,
            zones_configured: info.zones_configured,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StreamListResponse {
    pub streams: Vec<StreamSummary>,
    pub total: usize,
}

/// List every live stream.
pub async fn list_streams(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Json<StreamListResponse> {
    let streams: Vec<StreamSummary> = state
        .pipeline
        .streams()
        .await
        .into_iter()
        .map(StreamSummary::from)
        .collect();
    let total = streams.len();

    Json(StreamListResponse { streams, total })
}

#[derive(Debug, Serialize)]
pub struct UnregisterResponse {
    pub ok: bool,
    pub court_id: String,
    pub cam_id: String,
}

/// Force-unregister a live stream. Queued frames for it are discarded.
pub async fn unregister_stream(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path((court_id, cam_id)): Path<(String, String)>,
) -> ApiResult<Json<UnregisterResponse>> {
    let key = StreamKey::new(court_id, cam_id);
    state.pipeline.unregister_stream(&key).await?;
    info!(stream = %key, "Stream unregistered by admin");

    Ok(Json(UnregisterResponse {
        ok: true,
        court_id: key.court_id,
        cam_id: key.cam_id,
    }))
}
