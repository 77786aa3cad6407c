//! Time-indexed value series shared by observations and model output.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A series of `(timestamp, value)` points kept sorted by timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TimeSeries {
    points: Vec<(DateTime<Utc>, f64)>,
}

impl TimeSeries {
    pub fn new() -> Self {
        Self { points: Vec::new() }
    }

    /// Build a series from unordered points; sorts by timestamp.
    pub fn from_points(mut points: Vec<(DateTime<Utc>, f64)>) -> Self {
        points.sort_by_key(|(ts, _)| *ts);
        Self { points }
    }

    pub fn push(&mut self, timestamp: DateTime<Utc>, value: f64) {
        match self.points.last() {
            Some((last, _)) if *last > timestamp => {
                self.points.push((timestamp, value));
                self.points.sort_by_key(|(ts, _)| *ts);
            }
            _ => self.points.push((timestamp, value)),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[(DateTime<Utc>, f64)] {
        &self.points
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|(_, v)| *v)
    }

    /// Inner join with `other` on exactly-matching timestamps.
    ///
    /// Returns `(timestamp, self_value, other_value)` rows. Both inputs are
    /// sorted, so this is a linear merge.
    pub fn inner_join(&self, other: &TimeSeries) -> Vec<(DateTime<Utc>, f64, f64)> {
        let mut joined = Vec::new();
        let (mut i, mut j) = (0, 0);
        while i < self.points.len() && j < other.points.len() {
            let (left_ts, left_v) = self.points[i];
            let (right_ts, right_v) = other.points[j];
            if left_ts == right_ts {
                joined.push((left_ts, left_v, right_v));
                i += 1;
                j += 1;
            } else if left_ts < right_ts {
                i += 1;
            } else {
                j += 1;
            }
        }
        joined
    }

    /// Points with timestamps in `[start, end]`, inclusive on both ends.
    pub fn restrict(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> TimeSeries {
        Self {
            points: self
                .points
                .iter()
                .filter(|(ts, _)| *ts >= start && *ts <= end)
                .copied()
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 6, 1, hour, 0, 0).unwrap()
    }

    fn series(points: &[(u32, f64)]) -> TimeSeries {
        TimeSeries::from_points(points.iter().map(|(h, v)| (ts(*h), *v)).collect())
    }

    #[test]
    fn from_points_sorts() {
        let s = series(&[(3, 3.0), (1, 1.0), (2, 2.0)]);
        let hours: Vec<f64> = s.values().collect();
        assert_eq!(hours, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn push_keeps_order() {
        let mut s = series(&[(2, 2.0)]);
        s.push(ts(1), 1.0);
        s.push(ts(3), 3.0);
        let values: Vec<f64> = s.values().collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn inner_join_keeps_shared_timestamps_only() {
        let left = series(&[(1, 10.0), (2, 20.0), (4, 40.0)]);
        let right = series(&[(2, 0.2), (3, 0.3), (4, 0.4)]);
        let joined = left.inner_join(&right);
        assert_eq!(joined.len(), 2);
        assert_eq!(joined[0], (ts(2), 20.0, 0.2));
        assert_eq!(joined[1], (ts(4), 40.0, 0.4));
    }

    #[test]
    fn inner_join_disjoint_is_empty() {
        let left = series(&[(1, 1.0), (2, 2.0)]);
        let right = series(&[(5, 5.0), (6, 6.0)]);
        assert!(left.inner_join(&right).is_empty());
    }

    #[test]
    fn restrict_is_inclusive() {
        let s = series(&[(1, 1.0), (2, 2.0), (3, 3.0), (4, 4.0)]);
        let clipped = s.restrict(ts(2), ts(3));
        let values: Vec<f64> = clipped.values().collect();
        assert_eq!(values, vec![2.0, 3.0]);
    }
}
