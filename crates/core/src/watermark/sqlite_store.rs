//! SQLite-backed watermark store implementation.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{WatermarkError, WatermarkRecord, WatermarkStore};

/// SQLite-backed watermark store.
pub struct SqliteWatermarkStore {
    conn: Mutex<Connection>,
}

impl SqliteWatermarkStore {
    /// Create a new SQLite watermark store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, WatermarkError> {
        let conn = Connection::open(path).map_err(|e| WatermarkError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite watermark store (useful for testing).
    pub fn in_memory() -> Result<Self, WatermarkError> {
        let conn =
            Connection::open_in_memory().map_err(|e| WatermarkError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), WatermarkError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS watermarks (
                project TEXT NOT NULL,
                freqmode INTEGER NOT NULL,
                scan_id INTEGER NOT NULL,
                timestamp TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (project, freqmode)
            );
            "#,
        )
        .map_err(|e| WatermarkError::Database(e.to_string()))?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, WatermarkError> {
        self.conn
            .lock()
            .map_err(|_| WatermarkError::Database("connection mutex poisoned".to_string()))
    }

    fn format_timestamp(ts: &DateTime<Utc>) -> String {
        // Fixed precision keeps the stored text comparable in compare_and_put.
        // Nanoseconds match what day-log parsing can produce.
        ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
    }

    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<(String, u32, i64, String)> {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
    }

    fn decode(raw: (String, u32, i64, String)) -> Result<WatermarkRecord, WatermarkError> {
        let (project, freqmode, scan_id, timestamp) = raw;
        let timestamp = DateTime::parse_from_rfc3339(&timestamp)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| WatermarkError::Corrupt {
                project: project.clone(),
                freqmode,
                message: e.to_string(),
            })?;
        Ok(WatermarkRecord {
            project,
            freqmode,
            scan_id,
            timestamp,
        })
    }
}

impl WatermarkStore for SqliteWatermarkStore {
    fn get(&self, project: &str, freqmode: u32) -> Result<WatermarkRecord, WatermarkError> {
        let conn = self.lock()?;

        let raw = conn
            .query_row(
                "SELECT project, freqmode, scan_id, timestamp FROM watermarks WHERE project = ? AND freqmode = ?",
                params![project, freqmode],
                Self::row_to_record,
            )
            .optional()
            .map_err(|e| WatermarkError::Database(e.to_string()))?;

        match raw {
            Some(raw) => Self::decode(raw),
            None => Ok(WatermarkRecord::sentinel(project, freqmode)),
        }
    }

    fn put(&self, record: &WatermarkRecord) -> Result<(), WatermarkError> {
        let conn = self.lock()?;

        conn.execute(
            "INSERT INTO watermarks (project, freqmode, scan_id, timestamp, updated_at) VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(project, freqmode) DO UPDATE SET
                scan_id = excluded.scan_id,
                timestamp = excluded.timestamp,
                updated_at = excluded.updated_at",
            params![
                record.project,
                record.freqmode,
                record.scan_id,
                Self::format_timestamp(&record.timestamp),
                Utc::now().to_rfc3339(),
            ],
        )
        .map_err(|e| WatermarkError::Database(e.to_string()))?;

        Ok(())
    }

    fn compare_and_put(
        &self,
        expected: &WatermarkRecord,
        record: &WatermarkRecord,
    ) -> Result<(), WatermarkError> {
        let conn = self.lock()?;
        let now = Utc::now().to_rfc3339();

        let changed = if expected.is_sentinel() {
            conn.execute(
                "INSERT INTO watermarks (project, freqmode, scan_id, timestamp, updated_at) VALUES (?, ?, ?, ?, ?)
                 ON CONFLICT(project, freqmode) DO NOTHING",
                params![
                    record.project,
                    record.freqmode,
                    record.scan_id,
                    Self::format_timestamp(&record.timestamp),
                    now,
                ],
            )
        } else {
            conn.execute(
                "UPDATE watermarks SET scan_id = ?, timestamp = ?, updated_at = ?
                 WHERE project = ? AND freqmode = ? AND scan_id = ? AND timestamp = ?",
                params![
                    record.scan_id,
                    Self::format_timestamp(&record.timestamp),
                    now,
                    record.project,
                    record.freqmode,
                    expected.scan_id,
                    Self::format_timestamp(&expected.timestamp),
                ],
            )
        }
        .map_err(|e| WatermarkError::Database(e.to_string()))?;

        if changed == 0 {
            return Err(WatermarkError::Conflict {
                project: record.project.clone(),
                freqmode: record.freqmode,
            });
        }
        Ok(())
    }

    fn list(&self) -> Result<Vec<WatermarkRecord>, WatermarkError> {
        let conn = self.lock()?;

        let mut stmt = conn
            .prepare(
                "SELECT project, freqmode, scan_id, timestamp FROM watermarks ORDER BY project, freqmode",
            )
            .map_err(|e| WatermarkError::Database(e.to_string()))?;

        let rows = stmt
            .query_map([], Self::row_to_record)
            .map_err(|e| WatermarkError::Database(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| WatermarkError::Database(e.to_string()))?;

        rows.into_iter().map(Self::decode).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn ts(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 1, day, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_get_unknown_returns_sentinel() {
        let store = SqliteWatermarkStore::in_memory().unwrap();
        let record = store.get("ALL-Meso-v3.0.0", 24).unwrap();
        assert!(record.is_sentinel());
        assert_eq!(record.project, "ALL-Meso-v3.0.0");
        assert_eq!(record.freqmode, 24);
    }

    #[test]
    fn test_put_then_get() {
        let store = SqliteWatermarkStore::in_memory().unwrap();
        let record = WatermarkRecord::new("p", 13, 7001, ts(3, 12));
        store.put(&record).unwrap();
        assert_eq!(store.get("p", 13).unwrap(), record);
    }

    #[test]
    fn test_put_overwrites() {
        let store = SqliteWatermarkStore::in_memory().unwrap();
        store.put(&WatermarkRecord::new("p", 13, 1, ts(3, 0))).unwrap();
        store.put(&WatermarkRecord::new("p", 13, 2, ts(4, 0))).unwrap();

        let record = store.get("p", 13).unwrap();
        assert_eq!(record.scan_id, 2);
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn test_keys_are_independent() {
        let store = SqliteWatermarkStore::in_memory().unwrap();
        store.put(&WatermarkRecord::new("p", 13, 1, ts(3, 0))).unwrap();
        store.put(&WatermarkRecord::new("q", 13, 2, ts(4, 0))).unwrap();

        assert_eq!(store.get("p", 13).unwrap().scan_id, 1);
        assert_eq!(store.get("q", 13).unwrap().scan_id, 2);
        assert!(store.get("p", 19).unwrap().is_sentinel());
    }

    #[test]
    fn test_compare_and_put_from_sentinel() {
        let store = SqliteWatermarkStore::in_memory().unwrap();
        let sentinel = store.get("p", 1).unwrap();
        let next = WatermarkRecord::new("p", 1, 10, ts(5, 6));

        store.compare_and_put(&sentinel, &next).unwrap();
        assert_eq!(store.get("p", 1).unwrap(), next);

        // A second writer starting from the sentinel must fail closed.
        let other = WatermarkRecord::new("p", 1, 11, ts(6, 6));
        let err = store.compare_and_put(&sentinel, &other).unwrap_err();
        assert!(matches!(err, WatermarkError::Conflict { .. }));
        assert_eq!(store.get("p", 1).unwrap(), next);
    }

    #[test]
    fn test_compare_and_put_detects_stale_expected() {
        let store = SqliteWatermarkStore::in_memory().unwrap();
        let first = WatermarkRecord::new("p", 1, 10, ts(5, 6));
        let second = WatermarkRecord::new("p", 1, 20, ts(7, 6));
        store.put(&first).unwrap();

        store.compare_and_put(&first, &second).unwrap();
        assert_eq!(store.get("p", 1).unwrap(), second);

        let third = WatermarkRecord::new("p", 1, 30, ts(9, 6));
        let err = store.compare_and_put(&first, &third).unwrap_err();
        assert!(matches!(err, WatermarkError::Conflict { .. }));
    }

    #[test]
    fn test_sub_microsecond_timestamp_survives_storage() {
        let store = SqliteWatermarkStore::in_memory().unwrap();
        let timestamp = ts(5, 6) + chrono::Duration::nanoseconds(123_456_789);
        let first = WatermarkRecord::new("p", 1, 10, timestamp);
        store.put(&first).unwrap();

        let stored = store.get("p", 1).unwrap();
        assert_eq!(stored.timestamp, timestamp);

        let next = WatermarkRecord::new("p", 1, 11, ts(6, 6));
        store.compare_and_put(&stored, &next).unwrap();
        assert_eq!(store.get("p", 1).unwrap(), next);
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("watermarks.db");
        let record = WatermarkRecord::new("ALL-Strat-v3.0.0", 2, 99, ts(10, 23));

        {
            let store = SqliteWatermarkStore::new(&path).unwrap();
            store.put(&record).unwrap();
        }

        let store = SqliteWatermarkStore::new(&path).unwrap();
        assert_eq!(store.get("ALL-Strat-v3.0.0", 2).unwrap(), record);
    }

    #[test]
    fn test_list_is_ordered() {
        let store = SqliteWatermarkStore::in_memory().unwrap();
        store.put(&WatermarkRecord::new("b", 2, 1, ts(3, 0))).unwrap();
        store.put(&WatermarkRecord::new("a", 9, 1, ts(3, 0))).unwrap();
        store.put(&WatermarkRecord::new("a", 1, 1, ts(3, 0))).unwrap();

        let keys: Vec<_> = store
            .list()
            .unwrap()
            .into_iter()
            .map(|r| (r.project, r.freqmode))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("a".to_string(), 1),
                ("a".to_string(), 9),
                ("b".to_string(), 2)
            ]
        );
    }
}
