//! Period crawling and day-log fetching.

use std::collections::VecDeque;

use chrono::NaiveDate;
use futures::stream::{self, Stream, TryStreamExt};
use tracing::debug;

use super::{OdinApi, Scan, UpstreamError};

struct CrawlState {
    cursor: NaiveDate,
    pending: VecDeque<String>,
}

/// Lazily list day-log locations for `freqmode` between `start` and `end`.
///
/// The period index is paged `step_days` at a time. Each page is filtered to
/// the freqmode and to dates strictly before `end`, sorted by location, and
/// yielded before the next page is requested. The cursor then moves to the
/// day after the page's reported end. Any failed page ends the stream with
/// an error; a stream cannot be resumed, crawl again from a new start.
pub fn crawl_days<'a>(
    api: &'a dyn OdinApi,
    freqmode: u32,
    start: NaiveDate,
    end: NaiveDate,
    step_days: u32,
) -> impl Stream<Item = Result<String, UpstreamError>> + Send + 'a {
    let state = CrawlState {
        cursor: start,
        pending: VecDeque::new(),
    };

    stream::try_unfold(state, move |state| {
        next_location(api, freqmode, end, step_days, state)
    })
}

async fn next_location(
    api: &dyn OdinApi,
    freqmode: u32,
    end: NaiveDate,
    step_days: u32,
    mut state: CrawlState,
) -> Result<Option<(String, CrawlState)>, UpstreamError> {
    loop {
        if let Some(location) = state.pending.pop_front() {
            return Ok(Some((location, state)));
        }
        if state.cursor >= end {
            return Ok(None);
        }

        let page = api.period_info(state.cursor, step_days).await?;

        let mut locations: Vec<String> = page
            .days
            .into_iter()
            .filter(|day| day.freqmode == freqmode && day.date < end)
            .map(|day| day.url)
            .collect();
        locations.sort();
        locations.dedup();

        debug!(
            freqmode,
            cursor = %state.cursor,
            period_end = %page.period_end,
            days = locations.len(),
            "Crawled period page"
        );
        state.pending.extend(locations);

        state.cursor = page
            .period_end
            .succ_opt()
            .filter(|next| *next > state.cursor)
            .ok_or(UpstreamError::NoProgress {
                cursor: state.cursor,
            })?;
    }
}

/// Scans in one day log, unordered as returned by the endpoint.
pub async fn fetch_scans(api: &dyn OdinApi, location: &str) -> Result<Vec<Scan>, UpstreamError> {
    api.day_log(location).await
}

/// Crawl a date range and fetch every matching day log.
///
/// Upstream errors abort the whole collection; nothing is retried.
pub async fn collect_scans(
    api: &dyn OdinApi,
    freqmode: u32,
    start: NaiveDate,
    end: NaiveDate,
    step_days: u32,
) -> Result<Vec<Scan>, UpstreamError> {
    let mut days = std::pin::pin!(crawl_days(api, freqmode, start, end, step_days));
    let mut scans = Vec::new();
    let mut day_count = 0usize;

    while let Some(location) = days.try_next().await? {
        scans.extend(fetch_scans(api, &location).await?);
        day_count += 1;
    }

    debug!(freqmode, days = day_count, scans = scans.len(), "Collected scans");
    Ok(scans)
}
