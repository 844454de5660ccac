//! Odin REST API access.
//!
//! This module provides an `OdinApi` trait over the three endpoints the
//! dispatcher reads (period index, day logs, latest availability), an HTTP
//! implementation, and the crawler that turns a date range into scans.

mod client;
mod crawler;
mod types;

pub use client::HttpOdinApi;
pub use crawler::{collect_scans, crawl_days, fetch_scans};
pub use types::{parse_timestamp, PeriodDay, PeriodInfo, Scan};

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

/// Errors that can occur when talking to the Odin API.
#[derive(Debug, Clone, Error)]
pub enum UpstreamError {
    /// Request did not complete in time.
    #[error("Request to {url} timed out")]
    Timeout { url: String },

    /// Transport-level failure.
    #[error("HTTP request to {url} failed: {message}")]
    Http { url: String, message: String },

    /// Endpoint answered with a non-success status.
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// Response body could not be decoded.
    #[error("Failed to parse response from {url}: {message}")]
    Parse { url: String, message: String },

    /// Period index reported an end date that would not move the cursor.
    #[error("Period index did not advance past {cursor}")]
    NoProgress { cursor: NaiveDate },
}

/// Read-only view of the Odin API used by the crawler and dispatcher.
#[async_trait]
pub trait OdinApi: Send + Sync {
    /// Days with scans in a window of `length_days` starting at `start`.
    async fn period_info(
        &self,
        start: NaiveDate,
        length_days: u32,
    ) -> Result<PeriodInfo, UpstreamError>;

    /// Scans recorded in the day log at `location`, in endpoint order.
    async fn day_log(&self, location: &str) -> Result<Vec<Scan>, UpstreamError>;

    /// Last date with available model data; the crawl upper bound.
    async fn latest_ecmf_date(&self) -> Result<NaiveDate, UpstreamError>;
}
