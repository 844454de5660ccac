use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::config::{BatchConfig, BatchTarget, ConfigError};
use crate::metrics;
use crate::token::{JobAddressEncoder, TokenError};

use super::{BatchEntry, BatchJob, CategoryTable};

/// Jobs grouped by routing tag, plus how many entries were dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    /// Tag to jobs, in input order within each tag
    pub groups: BTreeMap<String, Vec<BatchJob>>,
    /// Entries that failed validation
    pub invalid: usize,
    /// Valid entries whose freqmode has no category
    pub unmapped: usize,
}

impl BatchOutcome {
    pub fn routed(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }
}

/// Routes batch entries to per-tag job lists.
pub struct BatchRouter {
    categories: CategoryTable,
    api_root: String,
    target: BatchTarget,
    encoder: Option<JobAddressEncoder>,
}

impl BatchRouter {
    /// `encoder` is required when the configured target is `Encrypted`.
    pub fn new(config: &BatchConfig, encoder: Option<JobAddressEncoder>) -> Result<Self, ConfigError> {
        if config.target == BatchTarget::Encrypted && encoder.is_none() {
            return Err(ConfigError::ValidationError(
                "batch.target = \"encrypted\" requires a secret".to_string(),
            ));
        }

        Ok(Self {
            categories: CategoryTable::from_config(&config.categories),
            api_root: config.api_root.trim_end_matches('/').to_string(),
            target: config.target,
            encoder,
        })
    }

    pub fn categories(&self) -> &CategoryTable {
        &self.categories
    }

    /// Validate, look up and group every entry.
    ///
    /// Only a failure to encrypt a target is an error; bad or unmapped
    /// entries are counted in the outcome and skipped.
    pub fn route(&self, entries: &[Value]) -> Result<BatchOutcome, TokenError> {
        let mut outcome = BatchOutcome::default();

        for raw in entries {
            let entry = match BatchEntry::from_value(raw) {
                Ok(entry) => entry,
                Err(e) => {
                    debug!(error = %e, "Dropping invalid batch entry");
                    outcome.invalid += 1;
                    continue;
                }
            };

            let Some(category) = self.categories.get(entry.freqmode) else {
                debug!(freqmode = entry.freqmode, scanid = entry.scanid, "No category for freqmode");
                outcome.unmapped += 1;
                continue;
            };

            let job = BatchJob {
                source: format!(
                    "{}/v5/level1/{}/{}/Log/",
                    self.api_root, entry.freqmode, entry.scanid
                ),
                target: self.target_for(&entry, &category.project)?,
            };
            outcome
                .groups
                .entry(category.tag.clone())
                .or_default()
                .push(job);
        }

        metrics::BATCH_ENTRIES
            .with_label_values(&["routed"])
            .inc_by(outcome.routed() as u64);
        metrics::BATCH_ENTRIES
            .with_label_values(&["invalid"])
            .inc_by(outcome.invalid as u64);
        metrics::BATCH_ENTRIES
            .with_label_values(&["unmapped"])
            .inc_by(outcome.unmapped as u64);

        info!(
            entries = entries.len(),
            routed = outcome.routed(),
            tags = outcome.groups.len(),
            invalid = outcome.invalid,
            unmapped = outcome.unmapped,
            "Routed batch"
        );
        Ok(outcome)
    }

    fn target_for(&self, entry: &BatchEntry, project: &str) -> Result<String, TokenError> {
        match (self.target, &self.encoder) {
            (BatchTarget::Encrypted, Some(encoder)) => {
                encoder.encode_target(entry.scanid, entry.freqmode, project)
            }
            _ => Ok(project.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;
    use serde_json::json;

    fn router() -> BatchRouter {
        BatchRouter::new(&BatchConfig::default(), None).unwrap()
    }

    fn sample() -> Vec<Value> {
        vec![
            json!({"backend": "AC2", "freqmode": 1, "scanid": "1234", "extra": "faulty"}),
            json!({"backend": "AC1", "freqmode": 2, "scanid": 1235}),
        ]
    }

    #[test]
    fn test_groups_by_tag() {
        let outcome = router().route(&sample()).unwrap();
        assert_eq!(outcome.groups["stnd1"].len(), 1);
        assert_eq!(outcome.groups["stnd2"].len(), 1);
        assert_eq!(outcome.invalid, 0);
        assert_eq!(outcome.unmapped, 0);
    }

    #[test]
    fn test_empty_batch() {
        let outcome = router().route(&[]).unwrap();
        assert!(outcome.groups.is_empty());
        assert_eq!(outcome, BatchOutcome::default());
    }

    #[test]
    fn test_source_and_project_target() {
        let outcome = router()
            .route(&[json!({"backend": "AC1", "freqmode": 24, "scanid": 1001})])
            .unwrap();
        let job = &outcome.groups["meso24"][0];
        assert_eq!(
            job.source,
            "https://odin-smr.org/rest_api/v5/level1/24/1001/Log/"
        );
        assert_eq!(job.target, "ALL-Meso-v3.0.0");
    }

    #[test]
    fn test_string_scanid_routes_like_integer() {
        let router = router();
        let a = router
            .route(&[json!({"backend": "AC1", "freqmode": 24, "scanid": "1234"})])
            .unwrap();
        let b = router
            .route(&[json!({"backend": "AC1", "freqmode": 24, "scanid": 1234})])
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_unmapped_freqmode_is_dropped() {
        let outcome = router()
            .route(&[json!({"backend": "AC1", "freqmode": 99, "scanid": 1})])
            .unwrap();
        assert!(outcome.groups.is_empty());
        assert_eq!(outcome.unmapped, 1);
    }

    #[test]
    fn test_invalid_entries_are_counted() {
        let outcome = router()
            .route(&[
                json!({"backend": "AC9", "freqmode": 1, "scanid": 1}),
                json!({"backend": "AC1", "freqmode": 1}),
                json!("not an entry"),
                json!({"backend": "AC1", "freqmode": 1, "scanid": 7}),
            ])
            .unwrap();
        assert_eq!(outcome.invalid, 3);
        assert_eq!(outcome.routed(), 1);
    }

    #[test]
    fn test_order_preserved_within_tag() {
        let outcome = router()
            .route(&[
                json!({"backend": "AC1", "freqmode": 13, "scanid": 3}),
                json!({"backend": "AC1", "freqmode": 1, "scanid": 9}),
                json!({"backend": "AC2", "freqmode": 13, "scanid": 1}),
                json!({"backend": "AC1", "freqmode": 13, "scanid": 2}),
            ])
            .unwrap();
        let sources: Vec<_> = outcome.groups["meso13"]
            .iter()
            .map(|j| j.source.as_str())
            .collect();
        assert_eq!(
            sources,
            vec![
                "https://odin-smr.org/rest_api/v5/level1/13/3/Log/",
                "https://odin-smr.org/rest_api/v5/level1/13/1/Log/",
                "https://odin-smr.org/rest_api/v5/level1/13/2/Log/",
            ]
        );
    }

    #[test]
    fn test_encrypted_target() {
        let config = BatchConfig {
            target: BatchTarget::Encrypted,
            ..BatchConfig::default()
        };
        let router = BatchRouter::new(&config, Some(fixtures::encoder())).unwrap();
        let outcome = router
            .route(&[json!({"backend": "AC1", "freqmode": 24, "scanid": 1001})])
            .unwrap();

        let target = &outcome.groups["meso24"][0].target;
        assert!(target.starts_with("https://odin.test/v5/level2?d="));
        let payload = fixtures::encoder().decode_target(target).unwrap();
        assert_eq!(payload.scan_id, 1001);
        assert_eq!(payload.freqmode, 24);
        assert_eq!(payload.project, "ALL-Meso-v3.0.0");
    }

    #[test]
    fn test_encrypted_target_requires_encoder() {
        let config = BatchConfig {
            target: BatchTarget::Encrypted,
            ..BatchConfig::default()
        };
        assert!(BatchRouter::new(&config, None).is_err());
    }
}
