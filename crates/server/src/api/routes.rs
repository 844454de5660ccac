use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::{batch, dispatch, handlers, middleware::metrics_middleware, watermarks};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // API routes
    let api_routes = Router::new()
        // Health, config and metrics
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        .route("/metrics", get(handlers::get_metrics))
        // Batch routing
        .route("/batch", post(batch::route_batch))
        // Dispatch
        .route("/dispatch", post(dispatch::run_dispatch))
        // Watermarks
        .route("/watermarks", get(watermarks::list_watermarks))
        .route(
            "/watermarks/{project}/{freqmode}",
            get(watermarks::get_watermark),
        )
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
}
