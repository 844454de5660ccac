//! Watermark storage trait and types.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Scan id of the watermark returned for keys that were never written.
pub const SENTINEL_SCAN_ID: i64 = -1;

/// Timestamp of the sentinel watermark (2022-12-29T00:00:00Z).
pub fn sentinel_timestamp() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2022, 12, 29, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

/// Last successfully dispatched scan for a (project, freqmode).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatermarkRecord {
    pub project: String,
    pub freqmode: u32,
    pub scan_id: i64,
    pub timestamp: DateTime<Utc>,
}

impl WatermarkRecord {
    pub fn new(
        project: impl Into<String>,
        freqmode: u32,
        scan_id: i64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            project: project.into(),
            freqmode,
            scan_id,
            timestamp,
        }
    }

    /// The record reported when nothing has been stored for the key.
    pub fn sentinel(project: impl Into<String>, freqmode: u32) -> Self {
        Self::new(project, freqmode, SENTINEL_SCAN_ID, sentinel_timestamp())
    }

    pub fn is_sentinel(&self) -> bool {
        self.scan_id == SENTINEL_SCAN_ID && self.timestamp == sentinel_timestamp()
    }
}

/// Error type for watermark operations.
#[derive(Debug, Error)]
pub enum WatermarkError {
    #[error("Database error: {0}")]
    Database(String),

    /// A stored row could not be decoded.
    #[error("Corrupt watermark for {project}/{freqmode}: {message}")]
    Corrupt {
        project: String,
        freqmode: u32,
        message: String,
    },

    /// The stored record no longer matches the value the writer started from.
    #[error("Watermark for {project}/{freqmode} changed concurrently")]
    Conflict { project: String, freqmode: u32 },
}

/// Trait for watermark storage backends.
///
/// Each (project, freqmode) is an independent unit of state; nothing is
/// transactional across keys.
pub trait WatermarkStore: Send + Sync {
    /// Get the watermark for a key, or the sentinel when none is stored.
    fn get(&self, project: &str, freqmode: u32) -> Result<WatermarkRecord, WatermarkError>;

    /// Unconditionally overwrite the record for its key.
    fn put(&self, record: &WatermarkRecord) -> Result<(), WatermarkError>;

    /// Overwrite the record only if the stored value still equals `expected`.
    ///
    /// A sentinel `expected` means "no record stored yet".
    fn compare_and_put(
        &self,
        expected: &WatermarkRecord,
        record: &WatermarkRecord,
    ) -> Result<(), WatermarkError>;

    /// All stored records, ordered by project then freqmode.
    fn list(&self) -> Result<Vec<WatermarkRecord>, WatermarkError>;
}
