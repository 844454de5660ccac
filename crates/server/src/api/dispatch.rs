//! Dispatch API handler.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use odin_jobs_core::RunReport;
use std::sync::Arc;
use tracing::{info, warn};

use super::handlers::ErrorResponse;
use crate::state::AppState;

/// POST /dispatch: one crawl-and-dispatch run over every configured pair.
///
/// Per-pair failures are part of the 200 report. Only a missing dispatch
/// setup (503), a run already in progress (409) or an unreadable latest
/// date (502) fail the request.
pub async fn run_dispatch(
    State(state): State<Arc<AppState>>,
) -> Result<Json<RunReport>, impl IntoResponse> {
    let Some(runner) = state.runner() else {
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            ErrorResponse::new("Dispatch is not configured"),
        ));
    };

    let Some(_guard) = state.try_begin_dispatch() else {
        warn!("Dispatch requested while a run is in progress");
        return Err((
            StatusCode::CONFLICT,
            ErrorResponse::new("A dispatch run is already in progress"),
        ));
    };

    info!("Dispatch run requested");
    match runner.run_all().await {
        Ok(report) => Ok(Json(report)),
        Err(e) => Err((
            StatusCode::BAD_GATEWAY,
            ErrorResponse::new(format!("Could not read latest available date: {}", e)),
        )),
    }
}
