//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Dispatching (jobs enqueued, run outcomes)
//! - Odin API requests
//! - Batch routing (routed and dropped entries)

use once_cell::sync::Lazy;
use prometheus::{IntCounter, IntCounterVec, Opts};

// =============================================================================
// Dispatch Metrics
// =============================================================================

/// Jobs accepted by the queue, by freqmode.
pub static JOBS_ENQUEUED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("odin_jobs_enqueued_total", "Total jobs accepted by the queue"),
        &["freqmode"],
    )
    .unwrap()
});

/// Dispatch runs per (project, freqmode) by outcome.
pub static DISPATCH_RUNS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "odin_jobs_dispatch_runs_total",
            "Total dispatch runs per project and freqmode",
        ),
        &["result"], // "dispatched", "empty", "failed", "upstream_error"
    )
    .unwrap()
});

/// Whole runs abandoned before any pair was processed.
pub static DISPATCH_ABORTS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "odin_jobs_dispatch_aborts_total",
        "Total dispatch runs aborted because the latest available date could not be read",
    )
    .unwrap()
});

// =============================================================================
// Upstream Metrics
// =============================================================================

/// Odin API requests by endpoint and result.
pub static UPSTREAM_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("odin_jobs_upstream_requests_total", "Total Odin API requests"),
        &["endpoint", "result"], // endpoint: "period_info", "day_log", "latest_ecmf"
    )
    .unwrap()
});

// =============================================================================
// Batch Metrics
// =============================================================================

/// Batch entries by routing result.
pub static BATCH_ENTRIES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("odin_jobs_batch_entries_total", "Total batch entries seen"),
        &["result"], // "routed", "invalid", "unmapped"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Record an upstream request outcome.
pub fn record_upstream(endpoint: &str, success: bool) {
    UPSTREAM_REQUESTS
        .with_label_values(&[endpoint, if success { "success" } else { "error" }])
        .inc();
}

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(JOBS_ENQUEUED.clone()),
        Box::new(DISPATCH_RUNS.clone()),
        Box::new(DISPATCH_ABORTS.clone()),
        Box::new(UPSTREAM_REQUESTS.clone()),
        Box::new(BATCH_ENTRIES.clone()),
    ]
}
