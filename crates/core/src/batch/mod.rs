//! Batch routing of externally supplied scan lists.
//!
//! Stateless: entries are validated, looked up in the category table and
//! grouped by routing tag. Entries that fail validation or have no category
//! are dropped and counted, never escalated.

mod categories;
mod router;

pub use categories::CategoryTable;
pub use router::{BatchOutcome, BatchRouter};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Why a batch entry was dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Entry is not an object")]
    NotAnObject,

    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Unknown backend: {0}")]
    UnknownBackend(String),

    #[error("Field {field} is not an integer: {value}")]
    NotAnInteger { field: &'static str, value: String },
}

/// Receiver backend of a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Backend {
    #[serde(rename = "AC1")]
    Ac1,
    #[serde(rename = "AC2")]
    Ac2,
}

impl Backend {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "AC1" => Some(Backend::Ac1),
            "AC2" => Some(Backend::Ac2),
            _ => None,
        }
    }
}

/// A validated batch entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchEntry {
    pub backend: Backend,
    pub freqmode: u32,
    pub scanid: i64,
}

impl BatchEntry {
    /// Validate one raw entry. Integer fields accept numeric strings and
    /// integral floats; unknown fields are ignored.
    pub fn from_value(value: &Value) -> Result<Self, ValidationError> {
        let object = value.as_object().ok_or(ValidationError::NotAnObject)?;

        let backend = match object.get("backend") {
            None | Some(Value::Null) => return Err(ValidationError::MissingField("backend")),
            Some(Value::String(s)) => {
                Backend::parse(s).ok_or_else(|| ValidationError::UnknownBackend(s.clone()))?
            }
            Some(other) => return Err(ValidationError::UnknownBackend(other.to_string())),
        };

        let freqmode = required_int(object.get("freqmode"), "freqmode")?;
        let freqmode = u32::try_from(freqmode).map_err(|_| ValidationError::NotAnInteger {
            field: "freqmode",
            value: freqmode.to_string(),
        })?;
        let scanid = required_int(object.get("scanid"), "scanid")?;

        Ok(Self {
            backend,
            freqmode,
            scanid,
        })
    }
}

/// One routed job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchJob {
    pub source: String,
    pub target: String,
}

fn required_int(value: Option<&Value>, field: &'static str) -> Result<i64, ValidationError> {
    match value {
        None | Some(Value::Null) => Err(ValidationError::MissingField(field)),
        Some(v) => coerce_int(v).ok_or_else(|| ValidationError::NotAnInteger {
            field,
            value: v.to_string(),
        }),
    }
}

fn coerce_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numeric_string_scanid_is_coerced() {
        let entry =
            BatchEntry::from_value(&json!({"backend": "AC2", "freqmode": 1, "scanid": "1234"}))
                .unwrap();
        assert_eq!(entry.scanid, 1234);
        assert_eq!(entry.backend, Backend::Ac2);
    }

    #[test]
    fn test_extra_fields_are_ignored() {
        let entry = BatchEntry::from_value(
            &json!({"backend": "AC2", "freqmode": 1, "scanid": 1, "extra": "faulty"}),
        )
        .unwrap();
        assert_eq!(entry.freqmode, 1);
    }

    #[test]
    fn test_lax_integers() {
        assert_eq!(coerce_int(&json!(12)), Some(12));
        assert_eq!(coerce_int(&json!(12.0)), Some(12));
        assert_eq!(coerce_int(&json!(" 12 ")), Some(12));
        assert_eq!(coerce_int(&json!(12.5)), None);
        assert_eq!(coerce_int(&json!("12a")), None);
        assert_eq!(coerce_int(&json!(true)), None);
    }

    #[test]
    fn test_validation_errors() {
        assert_eq!(
            BatchEntry::from_value(&json!([1, 2])),
            Err(ValidationError::NotAnObject)
        );
        assert_eq!(
            BatchEntry::from_value(&json!({"freqmode": 1, "scanid": 1})),
            Err(ValidationError::MissingField("backend"))
        );
        assert_eq!(
            BatchEntry::from_value(&json!({"backend": "AC3", "freqmode": 1, "scanid": 1})),
            Err(ValidationError::UnknownBackend("AC3".to_string()))
        );
        assert_eq!(
            BatchEntry::from_value(&json!({"backend": "AC1", "freqmode": 1})),
            Err(ValidationError::MissingField("scanid"))
        );
        assert!(matches!(
            BatchEntry::from_value(&json!({"backend": "AC1", "freqmode": -1, "scanid": 1})),
            Err(ValidationError::NotAnInteger {
                field: "freqmode",
                ..
            })
        ));
        assert!(matches!(
            BatchEntry::from_value(&json!({"backend": "AC1", "freqmode": 1, "scanid": "x"})),
            Err(ValidationError::NotAnInteger { field: "scanid", .. })
        ));
    }
}
