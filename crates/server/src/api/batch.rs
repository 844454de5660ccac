//! Batch routing API handler.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use odin_jobs_core::BatchJob;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::error;

use super::handlers::ErrorResponse;
use crate::state::AppState;

/// Request body for batch routing
#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    /// Raw entries; each is validated on its own
    pub input: Vec<Value>,
}

/// POST /batch: group entries by routing tag.
///
/// Entries that fail validation or have no category are dropped; the
/// response only lists routed jobs.
pub async fn route_batch(
    State(state): State<Arc<AppState>>,
    Json(body): Json<BatchRequest>,
) -> Result<Json<BTreeMap<String, Vec<BatchJob>>>, impl IntoResponse> {
    match state.batch().route(&body.input) {
        Ok(outcome) => Ok(Json(outcome.groups)),
        Err(e) => {
            error!(error = %e, "Failed to build batch targets");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse::new(format!("Failed to build batch targets: {}", e)),
            ))
        }
    }
}
