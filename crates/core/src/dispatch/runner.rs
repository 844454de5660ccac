//! One dispatch invocation over every configured (project, freqmode).

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::ProjectConfig;
use crate::metrics;
use crate::odin::{collect_scans, OdinApi, Scan, UpstreamError};
use crate::watermark::{WatermarkRecord, WatermarkStore};

use super::{DispatchTarget, Dispatcher, RunError};

/// What happened to one (project, freqmode) in a run.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PairOutcome {
    /// Jobs were enqueued and the watermark advanced.
    Dispatched {
        jobs: usize,
        watermark: WatermarkRecord,
    },
    /// No new scans since the watermark.
    UpToDate { watermark: WatermarkRecord },
    /// Crawling or fetching failed before anything was sent.
    UpstreamError { error: String },
    /// Sending or the watermark write failed.
    Failed { error: String },
}

impl PairOutcome {
    fn label(&self) -> &'static str {
        match self {
            PairOutcome::Dispatched { .. } => "dispatched",
            PairOutcome::UpToDate { .. } => "empty",
            PairOutcome::UpstreamError { .. } => "upstream_error",
            PairOutcome::Failed { .. } => "failed",
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            PairOutcome::UpstreamError { .. } | PairOutcome::Failed { .. }
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PairReport {
    pub project: String,
    pub freqmode: u32,
    pub queue: String,
    #[serde(flatten)]
    pub outcome: PairOutcome,
}

/// Result of one `run_all` invocation.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Exclusive upper bound of the crawl.
    pub latest_date: NaiveDate,
    pub pairs: Vec<PairReport>,
}

impl RunReport {
    pub fn failures(&self) -> usize {
        self.pairs.iter().filter(|p| p.outcome.is_failure()).count()
    }

    pub fn jobs(&self) -> usize {
        self.pairs
            .iter()
            .map(|p| match &p.outcome {
                PairOutcome::Dispatched { jobs, .. } => *jobs,
                _ => 0,
            })
            .sum()
    }
}

/// Drives the dispatcher over every configured project.
pub struct DispatchRunner {
    api: Arc<dyn OdinApi>,
    store: Arc<dyn WatermarkStore>,
    dispatcher: Dispatcher,
    projects: Vec<ProjectConfig>,
    step_days: u32,
}

impl DispatchRunner {
    pub fn new(
        api: Arc<dyn OdinApi>,
        store: Arc<dyn WatermarkStore>,
        dispatcher: Dispatcher,
        projects: Vec<ProjectConfig>,
        step_days: u32,
    ) -> Self {
        Self {
            api,
            store,
            dispatcher,
            projects,
            step_days,
        }
    }

    pub fn targets(&self) -> Vec<DispatchTarget> {
        self.projects
            .iter()
            .flat_map(|project| {
                project
                    .targets()
                    .into_iter()
                    .map(|(freqmode, queue)| DispatchTarget::new(&project.name, freqmode, queue))
            })
            .collect()
    }

    /// Dispatch every configured pair up to the latest available date.
    ///
    /// Only a failure reading the latest date fails the whole run; every
    /// other error is reported for its pair and the run moves on.
    pub async fn run_all(&self) -> Result<RunReport, UpstreamError> {
        let latest_date = self.api.latest_ecmf_date().await.inspect_err(|e| {
            metrics::DISPATCH_ABORTS.inc();
            warn!(error = %e, "Could not read latest available date");
        })?;

        info!(%latest_date, "Starting dispatch run");

        let mut pairs = Vec::new();
        for target in self.targets() {
            let outcome = match self.run_pair(&target, latest_date).await {
                Ok(outcome) => outcome,
                Err(RunError::Upstream(e)) => {
                    warn!(project = %target.project, freqmode = target.freqmode, error = %e, "Crawl failed");
                    PairOutcome::UpstreamError {
                        error: e.to_string(),
                    }
                }
                Err(e) => {
                    warn!(project = %target.project, freqmode = target.freqmode, error = %e, "Dispatch failed");
                    PairOutcome::Failed {
                        error: e.to_string(),
                    }
                }
            };
            metrics::DISPATCH_RUNS
                .with_label_values(&[outcome.label()])
                .inc();

            pairs.push(PairReport {
                project: target.project,
                freqmode: target.freqmode,
                queue: target.queue,
                outcome,
            });
        }

        let report = RunReport { latest_date, pairs };
        info!(
            pairs = report.pairs.len(),
            jobs = report.jobs(),
            failures = report.failures(),
            "Dispatch run finished"
        );
        Ok(report)
    }

    /// Crawl and dispatch one pair with `end` as the exclusive upper bound.
    pub async fn run_pair(
        &self,
        target: &DispatchTarget,
        end: NaiveDate,
    ) -> Result<PairOutcome, RunError> {
        let prior = self.store.get(&target.project, target.freqmode)?;
        let start = prior.timestamp.date_naive();

        let scans: Vec<Scan> = collect_scans(
            self.api.as_ref(),
            target.freqmode,
            start,
            end,
            self.step_days,
        )
        .await?
        .into_iter()
        .filter(|scan| !is_watermark_scan(scan, &prior))
        .collect();

        if scans.is_empty() {
            return Ok(PairOutcome::UpToDate { watermark: prior });
        }

        let watermark = self.dispatcher.run(target, &prior, &scans).await?;
        Ok(PairOutcome::Dispatched {
            jobs: scans.len(),
            watermark,
        })
    }
}

/// The crawl restarts at the watermark's day and that whole day is sent
/// again, late arrivals included. Only the watermark scan itself is skipped.
fn is_watermark_scan(scan: &Scan, watermark: &WatermarkRecord) -> bool {
    scan.scan_id == watermark.scan_id && scan.timestamp == watermark.timestamp
}
