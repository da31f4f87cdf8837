//! Chronological sorter.

use super::models::{SensorReading, SortedSeries};

use std::cmp::Ordering;

/// Stable-sort readings ascending by timestamp.
///
/// Readings with an unparsable timestamp keep their relative order and are
/// moved to the end; their count is reported in `SortedSeries::unparsable`.
pub fn sort_readings(mut readings: Vec<SensorReading>) -> SortedSeries {
    readings.sort_by(|a, b| match (a.time, b.time) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });

    let unparsable = readings.iter().rev().take_while(|r| r.time.is_none()).count();

    SortedSeries { readings, unparsable }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::SeedableRng;
    use std::collections::BTreeMap;

    fn reading(offset_min: Option<i64>, tag: f64) -> SensorReading {
        let base = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let mut metrics = BTreeMap::new();
        metrics.insert("temperature".to_string(), Some(tag));
        SensorReading {
            time: offset_min.map(|m| base + Duration::minutes(m)),
            raw_time: offset_min.map(|m| m.to_string()).unwrap_or_else(|| "garbage".to_string()),
            metrics,
        }
    }

    #[test]
    fn test_sorts_ascending() {
        let sorted = sort_readings(vec![reading(Some(30), 1.0), reading(Some(10), 2.0), reading(Some(20), 3.0)]);
        let tags: Vec<_> = sorted.readings.iter().map(|r| r.value("temperature").unwrap()).collect();
        assert_eq!(tags, vec![2.0, 3.0, 1.0]);
        assert_eq!(sorted.unparsable, 0);
    }

    #[test]
    fn test_unparsable_moved_to_end_and_counted() {
        let sorted = sort_readings(vec![
            reading(None, 1.0),
            reading(Some(5), 2.0),
            reading(None, 3.0),
            reading(Some(1), 4.0),
        ]);
        let tags: Vec<_> = sorted.readings.iter().map(|r| r.value("temperature").unwrap()).collect();
        assert_eq!(tags, vec![4.0, 2.0, 1.0, 3.0]);
        assert_eq!(sorted.unparsable, 2);
        assert_eq!(sorted.timed().len(), 2);
    }

    #[test]
    fn test_equal_timestamps_keep_input_order() {
        let sorted = sort_readings(vec![reading(Some(1), 1.0), reading(Some(0), 9.0), reading(Some(1), 2.0)]);
        let tags: Vec<_> = sorted.readings.iter().map(|r| r.value("temperature").unwrap()).collect();
        assert_eq!(tags, vec![9.0, 1.0, 2.0]);
    }

    #[test]
    fn test_idempotent() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let mut input: Vec<SensorReading> = (0..50)
                .map(|i| reading(if i % 7 == 0 { None } else { Some(i % 13) }, i as f64))
                .collect();
            input.shuffle(&mut rng);

            let once = sort_readings(input);
            let twice = sort_readings(once.readings.clone());
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_empty() {
        let sorted = sort_readings(Vec::new());
        assert!(sorted.readings.is_empty());
        assert_eq!(sorted.unparsable, 0);
    }
}
