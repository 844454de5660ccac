//! Mock Odin API for testing.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Days, NaiveDate};

use crate::odin::{OdinApi, PeriodDay, PeriodInfo, Scan, UpstreamError};

#[derive(Debug, Default)]
struct State {
    days: Vec<PeriodDay>,
    scans: HashMap<String, Vec<Scan>>,
    latest_date: Option<NaiveDate>,
    fail_latest_date: bool,
    failing_periods: HashSet<NaiveDate>,
    failing_day_logs: HashSet<String>,
    period_requests: Vec<(NaiveDate, u32)>,
    day_log_requests: Vec<String>,
}

/// Mock implementation of the OdinApi trait.
///
/// A period request for `(start, length)` returns every added day with a
/// date in `start ..= start + length - 1` and reports that last date as the
/// period end. Day logs without configured scans are empty.
#[derive(Debug, Clone, Default)]
pub struct MockOdinApi {
    state: Arc<Mutex<State>>,
}

impl MockOdinApi {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("mock state poisoned")
    }

    /// Add a day to the period index. A day with the same location
    /// replaces the earlier entry.
    pub fn add_day(&self, day: PeriodDay) {
        let mut state = self.state();
        state.days.retain(|existing| existing.url != day.url);
        state.days.push(day);
    }

    /// Set the scans returned for a day-log location.
    pub fn set_scans(&self, location: &str, scans: Vec<Scan>) {
        self.state().scans.insert(location.to_string(), scans);
    }

    pub fn set_latest_date(&self, date: NaiveDate) {
        self.state().latest_date = Some(date);
    }

    /// Make the latest-date endpoint answer 500.
    pub fn fail_latest_date(&self) {
        self.state().fail_latest_date = true;
    }

    /// Make the period page starting at `start` answer 500.
    pub fn fail_period_at(&self, start: NaiveDate) {
        self.state().failing_periods.insert(start);
    }

    /// Make a day-log location answer 500.
    pub fn fail_day_log(&self, location: &str) {
        self.state().failing_day_logs.insert(location.to_string());
    }

    /// Every period request as `(start, length)`, in order.
    pub fn period_requests(&self) -> Vec<(NaiveDate, u32)> {
        self.state().period_requests.clone()
    }

    pub fn day_log_requests(&self) -> Vec<String> {
        self.state().day_log_requests.clone()
    }
}

fn server_error(url: String) -> UpstreamError {
    UpstreamError::Status { url, status: 500 }
}

#[async_trait]
impl OdinApi for MockOdinApi {
    async fn period_info(
        &self,
        start: NaiveDate,
        length_days: u32,
    ) -> Result<PeriodInfo, UpstreamError> {
        let mut state = self.state();
        state.period_requests.push((start, length_days));

        if state.failing_periods.contains(&start) {
            return Err(server_error(format!("mock://period_info/{start}")));
        }

        let period_end = start
            .checked_add_days(Days::new(u64::from(length_days.max(1) - 1)))
            .unwrap_or(NaiveDate::MAX);
        let days = state
            .days
            .iter()
            .filter(|d| d.date >= start && d.date <= period_end)
            .cloned()
            .collect();

        Ok(PeriodInfo { days, period_end })
    }

    async fn day_log(&self, location: &str) -> Result<Vec<Scan>, UpstreamError> {
        let mut state = self.state();
        state.day_log_requests.push(location.to_string());

        if state.failing_day_logs.contains(location) {
            return Err(server_error(location.to_string()));
        }
        Ok(state.scans.get(location).cloned().unwrap_or_default())
    }

    async fn latest_ecmf_date(&self) -> Result<NaiveDate, UpstreamError> {
        let state = self.state();
        let url = "mock://config_data/latest_ecmf_file".to_string();
        if state.fail_latest_date {
            return Err(server_error(url));
        }
        state
            .latest_date
            .ok_or(UpstreamError::Status { url, status: 404 })
    }
}
