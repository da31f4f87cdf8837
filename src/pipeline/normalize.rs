//! Reading normalizer.
//!
//! Projects raw backend records into `SensorReading`s using a zone schema.
//! Individual bad values become gaps; only a record without its timestamp
//! field at all is rejected.

use super::models::{SensorReading, ZoneSchema};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Epoch values above this are treated as milliseconds.
const EPOCH_MILLIS_THRESHOLD: i64 = 100_000_000_000;

/// Structural errors that make a batch of records unusable.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NormalizeError {
    #[error("malformed record at index {index}: {reason}")]
    MalformedRecord { index: usize, reason: String },
}

/// Normalize a batch of raw records.
pub fn normalize(records: &[Value], schema: &ZoneSchema) -> Result<Vec<SensorReading>, NormalizeError> {
    records
        .iter()
        .enumerate()
        .map(|(index, record)| normalize_record(index, record, schema))
        .collect()
}

fn normalize_record(index: usize, record: &Value, schema: &ZoneSchema) -> Result<SensorReading, NormalizeError> {
    let obj = record.as_object().ok_or_else(|| NormalizeError::MalformedRecord {
        index,
        reason: "record is not an object".to_string(),
    })?;

    let raw_ts = obj
        .get(&schema.timestamp_field)
        .ok_or_else(|| NormalizeError::MalformedRecord {
            index,
            reason: format!("missing timestamp field '{}'", schema.timestamp_field),
        })?;

    let (raw_time, time) = match raw_ts {
        Value::String(s) => (s.clone(), parse_timestamp(s)),
        Value::Number(n) => (n.to_string(), n.as_i64().and_then(from_epoch)),
        other => (other.to_string(), None),
    };

    let mut metrics = BTreeMap::new();
    for (source, metric) in &schema.fields {
        let value = obj.get(source).and_then(parse_value);
        // Two source fields may feed one metric; keep the first present value.
        let slot = metrics.entry(metric.clone()).or_insert(None);
        if slot.is_none() {
            *slot = value;
        }
    }

    Ok(SensorReading { time, raw_time, metrics })
}

/// Parse a timestamp string. Accepts RFC 3339 and naive ISO forms (taken as UTC).
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
    s.parse::<i64>().ok().and_then(from_epoch)
}

fn from_epoch(ts: i64) -> Option<DateTime<Utc>> {
    if ts.abs() >= EPOCH_MILLIS_THRESHOLD {
        DateTime::from_timestamp_millis(ts)
    } else {
        DateTime::from_timestamp(ts, 0)
    }
}

fn parse_value(value: &Value) -> Option<f64> {
    let v = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    v.is_finite().then_some(v)
}
