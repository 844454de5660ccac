//! Watermark API handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use odin_jobs_core::WatermarkRecord;
use std::sync::Arc;
use tracing::error;

use super::handlers::ErrorResponse;
use crate::state::AppState;

/// GET /watermarks/{project}/{freqmode}: the sentinel when nothing is stored.
pub async fn get_watermark(
    State(state): State<Arc<AppState>>,
    Path((project, freqmode)): Path<(String, u32)>,
) -> Result<Json<WatermarkRecord>, impl IntoResponse> {
    state.store().get(&project, freqmode).map(Json).map_err(|e| {
        error!(%project, freqmode, error = %e, "Failed to read watermark");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorResponse::new(e.to_string()),
        )
    })
}

/// GET /watermarks: every stored watermark.
pub async fn list_watermarks(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<WatermarkRecord>>, impl IntoResponse> {
    state.store().list().map(Json).map_err(|e| {
        error!(error = %e, "Failed to list watermarks");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorResponse::new(e.to_string()),
        )
    })
}
