//! Crawl-and-dispatch of level2 jobs.
//!
//! The `Dispatcher` enqueues one job per scan and advances the watermark only
//! when every send succeeded. The `DispatchRunner` drives it over every
//! configured (project, freqmode) pair and isolates failures per pair.
//!
//! Runs for the same (project, freqmode) must not overlap. The watermark
//! write is conditional on the value the run started from, so an overlapping
//! run fails with a conflict instead of silently moving the watermark.

mod dispatcher;
mod runner;

pub use dispatcher::{DispatchTarget, Dispatcher};
pub use runner::{DispatchRunner, PairOutcome, PairReport, RunReport};

use thiserror::Error;

use crate::odin::UpstreamError;
use crate::queue::QueueError;
use crate::token::TokenError;
use crate::watermark::WatermarkError;

/// Errors that abort the enqueue loop for one (project, freqmode).
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The target token could not be built.
    #[error("Could not encode job for scan {scan_id}: {source}")]
    Encode {
        scan_id: i64,
        #[source]
        source: TokenError,
    },

    /// The queue answered with something other than success.
    #[error("Queue {queue} rejected job for scan {scan_id} with status {status}")]
    Rejected {
        queue: String,
        scan_id: i64,
        status: u16,
    },

    /// The send did not complete.
    #[error("Could not send job for scan {scan_id} to {queue}: {source}")]
    Transport {
        queue: String,
        scan_id: i64,
        #[source]
        source: QueueError,
    },

    /// Jobs were sent but the watermark could not be stored.
    #[error("Watermark update failed: {0}")]
    Watermark(#[from] WatermarkError),
}

/// Errors that end the run for one (project, freqmode).
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Watermark(#[from] WatermarkError),
}
