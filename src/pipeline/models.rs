//! Pipeline model types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A single timestamped sensor observation in canonical form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorReading {
    /// Parsed instant, or `None` when the source timestamp could not be parsed.
    pub time: Option<DateTime<Utc>>,
    /// Timestamp exactly as the source reported it.
    pub raw_time: String,
    /// Canonical metric name to value. `None` marks a missing value, never zero.
    pub metrics: BTreeMap<String, Option<f64>>,
}

impl SensorReading {
    /// Present value for a metric, if any.
    pub fn value(&self, metric: &str) -> Option<f64> {
        self.metrics.get(metric).copied().flatten()
    }
}

/// A chronologically sorted series as produced by the sorter.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SortedSeries {
    pub readings: Vec<SensorReading>,
    /// Readings whose timestamp failed to parse. They sit at the end of `readings`.
    pub unparsable: usize,
}

impl SortedSeries {
    /// Readings with a valid timestamp, in ascending order.
    pub fn timed(&self) -> &[SensorReading] {
        let end = self.readings.len() - self.unparsable.min(self.readings.len());
        &self.readings[..end]
    }
}

/// Read-only projection of a series for one window request.
#[derive(Debug, Clone, Serialize)]
pub struct SeriesView {
    /// Human readable window description, `None` for the live view.
    pub window: Option<String>,
    pub readings: Vec<SensorReading>,
    pub unparsable: usize,
}

impl SeriesView {
    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }
}

/// Greenhouse zone type. Each zone has its own raw record schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoneKind {
    Cold,
    Hot,
}

impl ZoneKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ZoneKind::Cold => "cold",
            ZoneKind::Hot => "hot",
        }
    }
}

impl fmt::Display for ZoneKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ZoneKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cold" => Ok(ZoneKind::Cold),
            "hot" => Ok(ZoneKind::Hot),
            other => Err(format!("unknown zone: {}", other)),
        }
    }
}

/// Field mapping that projects a zone's raw records into `SensorReading`s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneSchema {
    /// Endpoint path relative to the API base URL. `{id}` is replaced by the greenhouse id.
    pub path: String,
    pub timestamp_field: String,
    /// Source field name to canonical metric name.
    pub fields: BTreeMap<String, String>,
}

impl ZoneSchema {
    pub fn cold() -> Self {
        Self {
            path: "greenhouses/{id}/cold/readings".to_string(),
            timestamp_field: "timestamp".to_string(),
            fields: field_map(&[("temperature", "temperature"), ("humidity", "humidity")]),
        }
    }

    pub fn hot() -> Self {
        Self {
            path: "greenhouses/{id}/hot/readings".to_string(),
            timestamp_field: "timestamp".to_string(),
            fields: field_map(&[
                ("temperature", "temperature"),
                ("air_humidity", "air_humidity"),
                ("soil_humidity", "soil_humidity"),
                ("luminosity", "luminosity"),
            ]),
        }
    }

    /// Canonical metric names produced by this schema, sorted and deduplicated.
    pub fn metrics(&self) -> Vec<String> {
        let mut metrics: Vec<String> = self.fields.values().cloned().collect();
        metrics.sort();
        metrics.dedup();
        metrics
    }

    /// Endpoint path for a greenhouse.
    pub fn endpoint(&self, greenhouse_id: &str) -> String {
        self.path.replace("{id}", greenhouse_id)
    }
}

fn field_map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(src, metric)| (src.to_string(), metric.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zone_parse() {
        assert_eq!("cold".parse::<ZoneKind>(), Ok(ZoneKind::Cold));
        assert_eq!(" HOT ".parse::<ZoneKind>(), Ok(ZoneKind::Hot));
        assert!("warm".parse::<ZoneKind>().is_err());
    }

    #[test]
    fn test_schema_metrics() {
        let mut schema = ZoneSchema::cold();
        schema.fields.insert("temp_c".to_string(), "temperature".to_string());
        assert_eq!(schema.metrics(), vec!["humidity", "temperature"]);
        assert_eq!(ZoneSchema::hot().metrics().len(), 4);
    }

    #[test]
    fn test_endpoint() {
        assert_eq!(ZoneSchema::hot().endpoint("7"), "greenhouses/7/hot/readings");
    }

    #[test]
    fn test_missing_value_is_not_zero() {
        let mut metrics = BTreeMap::new();
        metrics.insert("temperature".to_string(), None);
        metrics.insert("humidity".to_string(), Some(0.0));
        let reading = SensorReading {
            time: None,
            raw_time: String::new(),
            metrics,
        };
        assert_eq!(reading.value("temperature"), None);
        assert_eq!(reading.value("humidity"), Some(0.0));
        assert_eq!(reading.value("luminosity"), None);
    }
}
