//! Sensor time-series pipeline.
//!
//! Normalize raw records, sort them, then window, aggregate and compare.

mod aggregate;
mod models;
mod normalize;
mod rollup;
mod sort;
mod trend;
mod window;

pub use aggregate::*;
pub use models::*;
pub use normalize::*;
pub use rollup::*;
pub use sort::*;
pub use trend::*;
pub use window::*;

use serde_json::Value;

/// Normalize and sort a fetched batch in one step.
pub fn process(records: &[Value], schema: &ZoneSchema) -> Result<SortedSeries, NormalizeError> {
    let readings = normalize(records, schema)?;
    Ok(sort_readings(readings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use std::collections::BTreeMap;

    #[test]
    fn test_process_sorts_and_averages() {
        let schema = ZoneSchema {
            path: "readings".to_string(),
            timestamp_field: "t".to_string(),
            fields: BTreeMap::from([("temp_c".to_string(), "temperature".to_string())]),
        };
        let records = vec![
            json!({"t": "2025-01-01T01:00:00Z", "temp_c": 22}),
            json!({"t": "2025-01-01T00:00:00Z", "temp_c": 20}),
        ];

        let series = process(&records, &schema).unwrap();
        assert_eq!(series.unparsable, 0);
        assert_eq!(series.readings.len(), 2);
        assert_eq!(series.readings[0].time, Some(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()));
        assert_eq!(series.readings[0].value("temperature"), Some(20.0));
        assert_eq!(series.readings[1].value("temperature"), Some(22.0));
        assert_eq!(mean(&series.readings, "temperature"), Some(21.0));
    }

    #[test]
    fn test_process_rejects_missing_timestamp() {
        let records = vec![json!({"temperature": 20})];
        assert!(matches!(
            process(&records, &ZoneSchema::cold()),
            Err(NormalizeError::MalformedRecord { index: 0, .. })
        ));
    }
}
