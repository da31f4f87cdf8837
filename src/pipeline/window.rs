//! Window filter.
//!
//! Selects readings inside a relative duration (`now - D ..`) or an absolute
//! inclusive `[start, end]` range.

use super::models::{SensorReading, SeriesView, SortedSeries};
use super::normalize::parse_timestamp;

use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

/// Errors from parsing window requests.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WindowError {
    #[error("invalid window duration: {0}")]
    InvalidDuration(String),
    #[error("invalid instant: {0}")]
    InvalidInstant(String),
    #[error("absolute window needs both start and end")]
    MissingBound,
}

/// Named relative windows offered by the dashboards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    Last24Hours,
    Last7Days,
    Last30Days,
}

impl Preset {
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "24h" => Some(Preset::Last24Hours),
            "7d" => Some(Preset::Last7Days),
            "30d" => Some(Preset::Last30Days),
            _ => None,
        }
    }

    pub fn duration(&self) -> Duration {
        match self {
            Preset::Last24Hours => Duration::hours(24),
            Preset::Last7Days => Duration::days(7),
            Preset::Last30Days => Duration::days(30),
        }
    }
}

/// A window selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowSpec {
    /// Everything at or after `now - duration`.
    Relative(Duration),
    /// Inclusive on both ends. A backward range selects nothing.
    Absolute { start: DateTime<Utc>, end: DateTime<Utc> },
}

impl From<Preset> for WindowSpec {
    fn from(preset: Preset) -> Self {
        WindowSpec::Relative(preset.duration())
    }
}

fn duration_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+)\s*([mhd])$").expect("window regex"))
}

impl WindowSpec {
    /// Parse a relative window such as `24h`, `7d`, `30d` or `90m`.
    pub fn parse_relative(s: &str) -> Result<Self, WindowError> {
        let s = s.trim().to_ascii_lowercase();
        if let Some(preset) = Preset::from_label(&s) {
            return Ok(preset.into());
        }

        let caps = duration_regex()
            .captures(&s)
            .ok_or_else(|| WindowError::InvalidDuration(s.clone()))?;

        let n: i64 = caps[1]
            .parse()
            .map_err(|_| WindowError::InvalidDuration(s.clone()))?;
        if n == 0 {
            return Err(WindowError::InvalidDuration(s));
        }

        let duration = match &caps[2] {
            "m" => Duration::try_minutes(n),
            "h" => Duration::try_hours(n),
            _ => Duration::try_days(n),
        };

        duration
            .map(WindowSpec::Relative)
            .ok_or(WindowError::InvalidDuration(s))
    }

    /// Parse an absolute window from two timestamps.
    pub fn parse_absolute(start: &str, end: &str) -> Result<Self, WindowError> {
        let start = parse_timestamp(start).ok_or_else(|| WindowError::InvalidInstant(start.to_string()))?;
        let end = parse_timestamp(end).ok_or_else(|| WindowError::InvalidInstant(end.to_string()))?;
        Ok(WindowSpec::Absolute { start, end })
    }

    /// Build a window from optional query parameters. `None` means no window.
    pub fn from_query(
        window: Option<&str>,
        start: Option<&str>,
        end: Option<&str>,
    ) -> Result<Option<Self>, WindowError> {
        match (window, start, end) {
            (Some(w), _, _) => Self::parse_relative(w).map(Some),
            (None, Some(s), Some(e)) => Self::parse_absolute(s, e).map(Some),
            (None, None, None) => Ok(None),
            _ => Err(WindowError::MissingBound),
        }
    }

    /// Inclusive lower and upper bounds at `now`. Relative windows have no upper bound.
    pub fn bounds(&self, now: DateTime<Utc>) -> (DateTime<Utc>, Option<DateTime<Utc>>) {
        match *self {
            WindowSpec::Relative(d) => (
                now.checked_sub_signed(d).unwrap_or(DateTime::<Utc>::MIN_UTC),
                None,
            ),
            WindowSpec::Absolute { start, end } => (start, Some(end)),
        }
    }

    /// Length of the window.
    pub fn span(&self) -> Duration {
        match *self {
            WindowSpec::Relative(d) => d,
            WindowSpec::Absolute { start, end } => end - start,
        }
    }

    /// The adjacent period preceding this window, as a half-open `[start, end)` range.
    pub fn previous(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let (start, _) = self.bounds(now);
        let prev_start = start
            .checked_sub_signed(self.span())
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        (prev_start, start)
    }

    pub fn describe(&self) -> String {
        match *self {
            WindowSpec::Relative(d) if d.num_days() > 1 && d == Duration::days(d.num_days()) => {
                format!("last {}d", d.num_days())
            }
            WindowSpec::Relative(d) if d.num_hours() > 0 && d == Duration::hours(d.num_hours()) => {
                format!("last {}h", d.num_hours())
            }
            WindowSpec::Relative(d) => format!("last {}m", d.num_minutes()),
            WindowSpec::Absolute { start, end } => {
                format!("{} .. {}", start.to_rfc3339(), end.to_rfc3339())
            }
        }
    }
}

/// Readings that fall inside the window. Readings without a valid timestamp never match.
pub fn filter(readings: &[SensorReading], spec: &WindowSpec, now: DateTime<Utc>) -> Vec<SensorReading> {
    let (start, end) = spec.bounds(now);
    if let Some(end) = end {
        if end < start {
            return Vec::new();
        }
    }

    readings
        .iter()
        .filter(|r| match r.time {
            Some(t) => t >= start && end.map_or(true, |e| t <= e),
            None => false,
        })
        .cloned()
        .collect()
}

/// Readings with `start <= time < end`.
pub fn filter_half_open(
    readings: &[SensorReading],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Vec<SensorReading> {
    readings
        .iter()
        .filter(|r| matches!(r.time, Some(t) if t >= start && t < end))
        .cloned()
        .collect()
}

/// Build a fresh view of a series. Without a window the whole series is returned.
pub fn view(series: &SortedSeries, spec: Option<&WindowSpec>, now: DateTime<Utc>) -> SeriesView {
    match spec {
        Some(spec) => SeriesView {
            window: Some(spec.describe()),
            readings: filter(&series.readings, spec, now),
            unparsable: series.unparsable,
        },
        None => SeriesView {
            window: None,
            readings: series.readings.clone(),
            unparsable: series.unparsable,
        },
    }
}
