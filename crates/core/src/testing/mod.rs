//! Testing utilities and mock implementations.
//!
//! Mocks for the Odin API and the job queue, so crawls and dispatch runs can
//! be exercised without a network.
//!
//! # Example
//!
//! ```rust,ignore
//! use odin_jobs_core::testing::{fixtures, MockJobQueue, MockOdinApi};
//!
//! let api = MockOdinApi::new();
//! api.add_day(fixtures::day(24, date));
//! api.set_scans(&fixtures::day_url(24, date), vec![fixtures::scan(1, date, 3)]);
//!
//! let queue = MockJobQueue::new();
//! queue.reject_nth(1, 500);
//! ```

mod mock_job_queue;
mod mock_odin_api;

pub use mock_job_queue::{MockJobQueue, SentJob};
pub use mock_odin_api::MockOdinApi;

/// Test fixtures and helper functions.
pub mod fixtures {
    use chrono::{DateTime, NaiveDate, Utc};

    use crate::odin::{PeriodDay, Scan};
    use crate::token::JobAddressEncoder;

    /// API root used by fixture URLs and the fixture encoder.
    pub const API_ROOT: &str = "https://odin.test";

    /// Base64 of the bytes 0..32, an AES-256 key.
    pub const SECRET: &str = "AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8=";

    /// Day-log location for a freqmode and date.
    pub fn day_url(freqmode: u32, date: NaiveDate) -> String {
        format!(
            "{}/v5/level1/{}/{}/",
            API_ROOT,
            freqmode,
            date.format("%Y-%m-%d")
        )
    }

    pub fn day(freqmode: u32, date: NaiveDate) -> PeriodDay {
        PeriodDay {
            url: day_url(freqmode, date),
            freqmode,
            date,
        }
    }

    /// `date` at `hour`:00 UTC.
    pub fn at(date: NaiveDate, hour: u32) -> DateTime<Utc> {
        date.and_hms_opt(hour, 0, 0)
            .expect("valid fixture hour")
            .and_utc()
    }

    pub fn scan(scan_id: i64, date: NaiveDate, hour: u32) -> Scan {
        Scan::new(scan_id, at(date, hour))
    }

    pub fn encoder() -> JobAddressEncoder {
        JobAddressEncoder::new(SECRET, API_ROOT).expect("valid fixture secret")
    }
}
