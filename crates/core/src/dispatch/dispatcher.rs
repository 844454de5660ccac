//! Enqueueing of scans and watermark advancement.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::metrics;
use crate::odin::Scan;
use crate::queue::{JobMessage, JobQueue};
use crate::token::JobAddressEncoder;
use crate::watermark::{WatermarkRecord, WatermarkStore};

use super::DispatchError;

/// Where one (project, freqmode) sends its jobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchTarget {
    pub project: String,
    pub freqmode: u32,
    pub queue: String,
}

impl DispatchTarget {
    pub fn new(project: impl Into<String>, freqmode: u32, queue: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            freqmode,
            queue: queue.into(),
        }
    }
}

/// Turns scans into queued jobs.
pub struct Dispatcher {
    queue: Arc<dyn JobQueue>,
    store: Arc<dyn WatermarkStore>,
    encoder: JobAddressEncoder,
}

impl Dispatcher {
    pub fn new(
        queue: Arc<dyn JobQueue>,
        store: Arc<dyn WatermarkStore>,
        encoder: JobAddressEncoder,
    ) -> Self {
        Self {
            queue,
            store,
            encoder,
        }
    }

    /// Build the queue message for one scan.
    pub fn make_job(
        &self,
        scan_id: i64,
        freqmode: u32,
        project: &str,
    ) -> Result<JobMessage, DispatchError> {
        let target_address = self
            .encoder
            .encode_target(scan_id, freqmode, project)
            .map_err(|source| DispatchError::Encode { scan_id, source })?;

        Ok(JobMessage {
            source_address: format!(
                "{}/v4/l1_log/{}/{}/",
                self.encoder.api_root(),
                freqmode,
                scan_id
            ),
            target_address,
        })
    }

    /// Enqueue every scan and, if all sends succeed, store the latest one as
    /// the new watermark.
    ///
    /// An empty `scans` returns `prior` untouched. The first failed send
    /// aborts the loop and leaves the watermark as it was; jobs already sent
    /// stay queued and are sent again by the next run.
    pub async fn run(
        &self,
        target: &DispatchTarget,
        prior: &WatermarkRecord,
        scans: &[Scan],
    ) -> Result<WatermarkRecord, DispatchError> {
        let Some(first) = scans.first() else {
            debug!(project = %target.project, freqmode = target.freqmode, "No scans to dispatch");
            return Ok(prior.clone());
        };

        let freqmode_label = target.freqmode.to_string();
        let mut latest = first;
        for scan in scans {
            if scan.timestamp > latest.timestamp {
                latest = scan;
            }

            let message = self.make_job(scan.scan_id, target.freqmode, &target.project)?;
            let ack = self
                .queue
                .send(&target.queue, &message)
                .await
                .map_err(|source| DispatchError::Transport {
                    queue: target.queue.clone(),
                    scan_id: scan.scan_id,
                    source,
                })?;

            if !ack.is_success() {
                return Err(DispatchError::Rejected {
                    queue: target.queue.clone(),
                    scan_id: scan.scan_id,
                    status: ack.status,
                });
            }
            metrics::JOBS_ENQUEUED
                .with_label_values(&[freqmode_label.as_str()])
                .inc();
        }

        let record = WatermarkRecord::new(
            target.project.clone(),
            target.freqmode,
            latest.scan_id,
            latest.timestamp,
        );

        if !prior.is_sentinel() && record.timestamp < prior.timestamp {
            warn!(
                project = %target.project,
                freqmode = target.freqmode,
                prior = %prior.timestamp,
                latest = %record.timestamp,
                "Dispatched scans are older than the watermark, keeping it"
            );
            return Ok(prior.clone());
        }

        self.store.compare_and_put(prior, &record)?;

        info!(
            project = %target.project,
            freqmode = target.freqmode,
            queue = %target.queue,
            jobs = scans.len(),
            scan_id = record.scan_id,
            timestamp = %record.timestamp,
            "Dispatched jobs and advanced watermark"
        );
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixtures, MockJobQueue};
    use crate::watermark::SqliteWatermarkStore;
    use chrono::NaiveDate;

    struct Harness {
        queue: Arc<MockJobQueue>,
        store: Arc<SqliteWatermarkStore>,
        dispatcher: Dispatcher,
    }

    fn harness() -> Harness {
        let queue = Arc::new(MockJobQueue::new());
        let store = Arc::new(SqliteWatermarkStore::in_memory().unwrap());
        let dispatcher = Dispatcher::new(
            Arc::clone(&queue) as Arc<dyn JobQueue>,
            Arc::clone(&store) as Arc<dyn WatermarkStore>,
            fixtures::encoder(),
        );
        Harness {
            queue,
            store,
            dispatcher,
        }
    }

    fn target() -> DispatchTarget {
        DispatchTarget::new("ALL-Meso-v3.0.0", 24, "queue-24")
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 2, 1).unwrap()
    }

    #[tokio::test]
    async fn test_empty_scans_is_noop() {
        let h = harness();
        let prior = h.store.get("ALL-Meso-v3.0.0", 24).unwrap();

        let result = h.dispatcher.run(&target(), &prior, &[]).await.unwrap();
        assert_eq!(result, prior);
        assert!(h.queue.sent().is_empty());
        assert!(h.store.list().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_watermark_is_latest_timestamp() {
        let h = harness();
        let prior = h.store.get("ALL-Meso-v3.0.0", 24).unwrap();
        let scans = vec![
            fixtures::scan(10, day(), 5),
            fixtures::scan(11, day(), 9),
            fixtures::scan(12, day(), 2),
        ];

        let result = h.dispatcher.run(&target(), &prior, &scans).await.unwrap();
        assert_eq!(result.scan_id, 11);
        assert_eq!(result.timestamp, scans[1].timestamp);
        assert_eq!(h.store.get("ALL-Meso-v3.0.0", 24).unwrap(), result);
        assert_eq!(h.queue.sent().len(), 3);
    }

    #[tokio::test]
    async fn test_first_of_equal_timestamps_wins() {
        let h = harness();
        let prior = h.store.get("ALL-Meso-v3.0.0", 24).unwrap();
        let scans = vec![fixtures::scan(20, day(), 4), fixtures::scan(21, day(), 4)];

        let result = h.dispatcher.run(&target(), &prior, &scans).await.unwrap();
        assert_eq!(result.scan_id, 20);
    }

    #[tokio::test]
    async fn test_messages_carry_source_and_encrypted_target() {
        let h = harness();
        let prior = h.store.get("ALL-Meso-v3.0.0", 24).unwrap();
        h.dispatcher
            .run(&target(), &prior, &[fixtures::scan(7014769645, day(), 1)])
            .await
            .unwrap();

        let sent = h.queue.sent();
        assert_eq!(sent[0].queue, "queue-24");
        assert_eq!(
            sent[0].message.source_address,
            "https://odin.test/v4/l1_log/24/7014769645/"
        );

        let payload = fixtures::encoder()
            .decode_target(&sent[0].message.target_address)
            .unwrap();
        assert_eq!(payload.scan_id, 7014769645);
        assert_eq!(payload.freqmode, 24);
        assert_eq!(payload.project, "ALL-Meso-v3.0.0");
    }

    #[tokio::test]
    async fn test_rejected_send_aborts_without_watermark() {
        let h = harness();
        let prior = h.store.get("ALL-Meso-v3.0.0", 24).unwrap();
        h.queue.reject_nth(2, 500);
        let scans: Vec<_> = (0..5).map(|i| fixtures::scan(100 + i, day(), i as u32)).collect();

        let err = h.dispatcher.run(&target(), &prior, &scans).await.unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Rejected {
                scan_id: 102,
                status: 500,
                ..
            }
        ));
        // Two jobs went out before the failure, nothing after it.
        assert_eq!(h.queue.sent().len(), 2);
        assert_eq!(h.store.get("ALL-Meso-v3.0.0", 24).unwrap(), prior);
    }

    #[tokio::test]
    async fn test_transport_error_aborts_without_watermark() {
        let h = harness();
        let existing = WatermarkRecord::new("ALL-Meso-v3.0.0", 24, 5, fixtures::at(day(), 0));
        h.store.put(&existing).unwrap();
        h.queue.fail_nth(0);

        let err = h
            .dispatcher
            .run(&target(), &existing, &[fixtures::scan(6, day(), 3)])
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Transport { scan_id: 6, .. }));
        assert_eq!(h.store.get("ALL-Meso-v3.0.0", 24).unwrap(), existing);
    }

    #[tokio::test]
    async fn test_concurrent_writer_conflict_fails_closed() {
        let h = harness();
        let prior = h.store.get("ALL-Meso-v3.0.0", 24).unwrap();
        // Another run stored a watermark after this one read `prior`.
        let other = WatermarkRecord::new("ALL-Meso-v3.0.0", 24, 99, fixtures::at(day(), 23));
        h.store.put(&other).unwrap();

        let err = h
            .dispatcher
            .run(&target(), &prior, &[fixtures::scan(1, day(), 1)])
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Watermark(_)));
        assert_eq!(h.store.get("ALL-Meso-v3.0.0", 24).unwrap(), other);
    }

    #[tokio::test]
    async fn test_older_scans_do_not_regress_watermark() {
        let h = harness();
        let existing = WatermarkRecord::new("ALL-Meso-v3.0.0", 24, 50, fixtures::at(day(), 12));
        h.store.put(&existing).unwrap();

        let result = h
            .dispatcher
            .run(&target(), &existing, &[fixtures::scan(40, day(), 6)])
            .await
            .unwrap();
        assert_eq!(result, existing);
        assert_eq!(h.store.get("ALL-Meso-v3.0.0", 24).unwrap(), existing);
    }
}
