//! Persistent resume points for incremental dispatching.
//!
//! One record is kept per (project, freqmode). A missing record reads as the
//! sentinel watermark, so a fresh deployment starts crawling from the
//! sentinel date.

mod sqlite_store;
mod store;

pub use sqlite_store::SqliteWatermarkStore;
pub use store::{
    sentinel_timestamp, WatermarkError, WatermarkRecord, WatermarkStore, SENTINEL_SCAN_ID,
};
