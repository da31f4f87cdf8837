//! Trend calculation between periods or consecutive samples.

use super::aggregate::mean;
use super::models::SensorReading;
use super::window::{filter, filter_half_open, WindowSpec};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Arrow direction shown next to a trend. A zero change reads as `Down`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn of(percent_change: f64) -> Self {
        if percent_change > 0.0 {
            Direction::Up
        } else {
            Direction::Down
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendResult {
    pub metric: String,
    pub current_average: Option<f64>,
    pub previous_average: Option<f64>,
    pub percent_change: f64,
    pub direction: Direction,
}

/// Percent change from `previous` to `current`, rounded to one decimal.
///
/// Yields 0 whenever either side is undefined or `previous` is zero, so the
/// result is always finite.
pub fn percent_change(current: Option<f64>, previous: Option<f64>) -> f64 {
    let (c, p) = match (current, previous) {
        (Some(c), Some(p)) if p != 0.0 => (c, p),
        _ => return 0.0,
    };

    let pct = round_one_decimal((c - p) / p * 100.0);
    if !pct.is_finite() || pct == 0.0 {
        // also folds -0.0 into 0.0
        0.0
    } else {
        pct
    }
}

fn round_one_decimal(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// Build a trend from two already computed values.
pub fn compare(metric: &str, current: Option<f64>, previous: Option<f64>) -> TrendResult {
    let percent_change = percent_change(current, previous);
    TrendResult {
        metric: metric.to_string(),
        current_average: current,
        previous_average: previous,
        percent_change,
        direction: Direction::of(percent_change),
    }
}

/// Compare the average over `spec` with the average over the adjacent previous period.
pub fn period_over_period(
    readings: &[SensorReading],
    metric: &str,
    spec: &WindowSpec,
    now: DateTime<Utc>,
) -> TrendResult {
    let current = filter(readings, spec, now);
    let (prev_start, prev_end) = spec.previous(now);
    let previous = filter_half_open(readings, prev_start, prev_end);

    compare(metric, mean(&current, metric), mean(&previous, metric))
}

/// Compare the latest reading with the one immediately before it.
///
/// `readings` must be chronologically sorted with timed readings only.
pub fn sample_over_sample(readings: &[SensorReading], metric: &str) -> TrendResult {
    let mut tail = readings.iter().rev();
    let latest = tail.next().and_then(|r| r.value(metric));
    let previous = tail.next().and_then(|r| r.value(metric));

    compare(metric, latest, previous)
}

/// Value of `metric` in the most recent reading, if present.
pub fn latest_value(readings: &[SensorReading], metric: &str) -> Option<f64> {
    readings.last().and_then(|r| r.value(metric))
}
