use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// One scan found in a day log.
///
/// Scan ids are only unique within a freqmode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scan {
    pub scan_id: i64,
    pub timestamp: DateTime<Utc>,
}

impl Scan {
    pub fn new(scan_id: i64, timestamp: DateTime<Utc>) -> Self {
        Self { scan_id, timestamp }
    }
}

/// A day entry from the period index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodDay {
    /// Location of the day log
    pub url: String,
    pub freqmode: u32,
    pub date: NaiveDate,
}

/// One page of the period index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodInfo {
    pub days: Vec<PeriodDay>,
    /// Last date covered by this page
    pub period_end: NaiveDate,
}

// Wire formats

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct PeriodInfoResponse {
    pub data: Vec<PeriodDayResponse>,
    pub period_end: NaiveDate,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct PeriodDayResponse {
    #[serde(rename = "URL")]
    pub url: String,
    pub freq_mode: u32,
    pub date: NaiveDate,
}

impl From<PeriodInfoResponse> for PeriodInfo {
    fn from(r: PeriodInfoResponse) -> Self {
        Self {
            days: r
                .data
                .into_iter()
                .map(|d| PeriodDay {
                    url: d.url,
                    freqmode: d.freq_mode,
                    date: d.date,
                })
                .collect(),
            period_end: r.period_end,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct DayLogResponse {
    pub data: Vec<DayLogScan>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DayLogScan {
    #[serde(rename = "ScanID")]
    pub scan_id: i64,
    #[serde(rename = "DateTime")]
    pub date_time: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct LatestDateResponse {
    pub date: NaiveDate,
}

/// Parse an ISO 8601 timestamp as found in day logs.
///
/// Timestamps without an offset are taken as UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_timestamp_variants() {
        let expected = Utc.with_ymd_and_hms(2023, 1, 5, 10, 20, 30).unwrap();
        assert_eq!(parse_timestamp("2023-01-05T10:20:30"), Some(expected));
        assert_eq!(parse_timestamp("2023-01-05 10:20:30"), Some(expected));
        assert_eq!(parse_timestamp("2023-01-05T10:20:30Z"), Some(expected));
        assert_eq!(parse_timestamp("2023-01-05T11:20:30+01:00"), Some(expected));
        assert_eq!(
            parse_timestamp("2023-01-05"),
            Some(Utc.with_ymd_and_hms(2023, 1, 5, 0, 0, 0).unwrap())
        );
        assert!(parse_timestamp("2023-01-05T10:20:30.250").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_period_info_wire_format() {
        let json = r#"{
            "Data": [
                {"URL": "https://odin/v5/level1/1/2023-01-02/", "FreqMode": 1, "Date": "2023-01-02", "NumScan": 10},
                {"URL": "https://odin/v5/level1/2/2023-01-03/", "FreqMode": 2, "Date": "2023-01-03"}
            ],
            "PeriodStart": "2023-01-01",
            "PeriodEnd": "2023-01-31"
        }"#;
        let wire: PeriodInfoResponse = serde_json::from_str(json).unwrap();
        let info = PeriodInfo::from(wire);
        assert_eq!(info.days.len(), 2);
        assert_eq!(info.days[0].freqmode, 1);
        assert_eq!(info.days[1].date, NaiveDate::from_ymd_opt(2023, 1, 3).unwrap());
        assert_eq!(info.period_end, NaiveDate::from_ymd_opt(2023, 1, 31).unwrap());
    }

    #[test]
    fn test_day_log_wire_format() {
        let json = r#"{"Data": [{"ScanID": 7014769645, "DateTime": "2023-01-02T00:01:02", "FreqMode": 1}]}"#;
        let wire: DayLogResponse = serde_json::from_str(json).unwrap();
        assert_eq!(wire.data[0].scan_id, 7014769645);
        assert_eq!(wire.data[0].date_time, "2023-01-02T00:01:02");
    }
}
