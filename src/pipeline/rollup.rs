//! Bucketed rollups for charting long windows.

use super::models::SensorReading;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Bucket sizes offered to charts, in seconds.
pub const BUCKET_LADDER: [i64; 6] = [60, 300, 900, 3600, 21600, 86400];

/// Aim for roughly this many points per chart.
const TARGET_POINTS: i64 = 200;

/// Aggregates of one metric inside a bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketStats {
    pub mean: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// One chart bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bucket {
    pub time: DateTime<Utc>,
    pub bucket_seconds: i64,
    pub samples: usize,
    pub metrics: BTreeMap<String, BucketStats>,
}

/// Truncate a datetime to the start of its containing bucket.
pub fn truncate_to_window(dt: DateTime<Utc>, window_seconds: i64) -> DateTime<Utc> {
    if window_seconds <= 0 {
        return dt;
    }
    let ts = dt.timestamp();
    let truncated = ts - ts.rem_euclid(window_seconds);
    DateTime::from_timestamp(truncated, 0).unwrap_or(dt)
}

/// Pick a bucket size for a chart spanning `span_secs`.
pub fn select_bucket_seconds(span_secs: i64) -> i64 {
    let target = span_secs / TARGET_POINTS;

    for &step in BUCKET_LADDER.iter().rev() {
        if step <= target {
            return step;
        }
    }

    BUCKET_LADDER[0]
}

/// Group readings into epoch-aligned buckets.
///
/// Input must be sorted; readings without a timestamp are skipped.
pub fn rollup(readings: &[SensorReading], bucket_seconds: i64, metrics: &[String]) -> Vec<Bucket> {
    let mut groups: BTreeMap<DateTime<Utc>, Vec<&SensorReading>> = BTreeMap::new();
    for r in readings {
        if let Some(t) = r.time {
            groups.entry(truncate_to_window(t, bucket_seconds)).or_default().push(r);
        }
    }

    groups
        .into_iter()
        .map(|(time, members)| Bucket {
            time,
            bucket_seconds,
            samples: members.len(),
            metrics: metrics
                .iter()
                .map(|m| (m.clone(), bucket_stats(&members, m)))
                .collect(),
        })
        .collect()
}

fn bucket_stats(members: &[&SensorReading], metric: &str) -> BucketStats {
    let values: Vec<f64> = members.iter().filter_map(|r| r.value(metric)).collect();
    if values.is_empty() {
        return BucketStats { mean: None, min: None, max: None };
    }

    BucketStats {
        mean: Some(values.iter().sum::<f64>() / values.len() as f64),
        min: values.iter().copied().reduce(f64::min),
        max: values.iter().copied().reduce(f64::max),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_truncate_to_window() {
        // 2024-01-01 12:34:56 truncated to 60s window = 12:34:00
        let dt = Utc.with_ymd_and_hms(2024, 1, 1, 12, 34, 56).unwrap();
        let truncated = truncate_to_window(dt, 60);
        assert_eq!(truncated, Utc.with_ymd_and_hms(2024, 1, 1, 12, 34, 0).unwrap());

        // 1h bucket = 12:00:00
        let truncated = truncate_to_window(dt, 3600);
        assert_eq!(truncated, Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap());

        // 1d bucket = midnight
        let truncated = truncate_to_window(dt, 86400);
        assert_eq!(truncated, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_select_bucket_seconds() {
        assert_eq!(select_bucket_seconds(3600), 60);
        assert_eq!(select_bucket_seconds(24 * 3600), 300);
        assert_eq!(select_bucket_seconds(7 * 86400), 900);
        assert_eq!(select_bucket_seconds(30 * 86400), 3600);
        assert_eq!(select_bucket_seconds(365 * 86400), 86400);
    }

    #[test]
    fn test_rollup() {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mk = |min: i64, temp: Option<f64>| {
            let mut metrics = BTreeMap::new();
            metrics.insert("temperature".to_string(), temp);
            SensorReading {
                time: Some(base + Duration::minutes(min)),
                raw_time: String::new(),
                metrics,
            }
        };
        let readings = vec![mk(0, Some(10.0)), mk(30, Some(20.0)), mk(61, None), mk(125, Some(5.0))];
        let buckets = rollup(&readings, 3600, &["temperature".to_string()]);

        assert_eq!(buckets.len(), 3);
        assert_eq!(buckets[0].samples, 2);
        assert_eq!(buckets[0].metrics["temperature"].mean, Some(15.0));
        assert_eq!(buckets[0].metrics["temperature"].min, Some(10.0));
        assert_eq!(buckets[0].metrics["temperature"].max, Some(20.0));
        assert_eq!(buckets[1].metrics["temperature"].mean, None);
        assert_eq!(buckets[2].time, base + Duration::hours(2));
    }

    #[test]
    fn test_rollup_empty() {
        assert!(rollup(&[], 60, &["temperature".to_string()]).is_empty());
    }
}
