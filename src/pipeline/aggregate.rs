//! Aggregation over reading subsets.

use super::models::SensorReading;

use serde::Serialize;
use tdigests::TDigest;

/// Centroid budget for quantile estimation.
const DIGEST_SIZE: usize = 100;

/// Distribution of one metric over a set of readings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSummary {
    pub count: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub p50: f64,
    pub p95: f64,
}

/// Present values of a metric, skipping gaps.
pub fn present_values<'a>(readings: &'a [SensorReading], metric: &'a str) -> impl Iterator<Item = f64> + 'a {
    readings.iter().filter_map(move |r| r.value(metric))
}

/// Arithmetic mean of the present values of `metric`.
///
/// Returns `None` when no reading carries a value, so "no data" stays
/// distinct from an average of zero.
pub fn mean(readings: &[SensorReading], metric: &str) -> Option<f64> {
    let (sum, count) = present_values(readings, metric).fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

/// Number of readings with no usable value for `metric`.
pub fn count_missing(readings: &[SensorReading], metric: &str) -> usize {
    readings.iter().filter(|r| r.value(metric).is_none()).count()
}

/// Summary statistics for a metric, or `None` without data.
pub fn summarize(readings: &[SensorReading], metric: &str) -> Option<MetricSummary> {
    let values: Vec<f64> = present_values(readings, metric).collect();
    if values.is_empty() {
        return None;
    }

    let count = values.len();
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mean = values.iter().sum::<f64>() / count as f64;

    let mut td = TDigest::from_values(values);
    td.compress(DIGEST_SIZE);

    Some(MetricSummary {
        count,
        mean,
        min,
        max,
        p50: sanitize_float(td.estimate_quantile(0.50)),
        p95: sanitize_float(td.estimate_quantile(0.95)),
    })
}

fn sanitize_float(f: f64) -> f64 {
    if f.is_nan() || f.is_infinite() {
        0.0
    } else {
        f
    }
}
