//! CSV loading and saving for time-indexed series.
//!
//! The on-disk format is a two-column CSV with a header row:
//! `timestamp,value`, timestamps in RFC 3339.

use std::path::Path;

use chrono::{DateTime, Utc};
use ht_types::{validation_error, HtResult, TimeSeries};

/// Load a `timestamp,value` CSV file into a [`TimeSeries`].
pub fn read_series_csv<P: AsRef<Path>>(path: P) -> HtResult<TimeSeries> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| validation_error!("cannot open series file {}: {}", path.display(), e))?;

    let mut points = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record
            .map_err(|e| validation_error!("malformed row in {}: {}", path.display(), e))?;
        if record.len() < 2 {
            return Err(validation_error!(
                "row {} of {} has {} columns, expected 2",
                line + 1,
                path.display(),
                record.len()
            ));
        }
        let timestamp: DateTime<Utc> = record[0].parse().map_err(|e| {
            validation_error!("bad timestamp `{}` in {}: {}", &record[0], path.display(), e)
        })?;
        let value: f64 = record[1].parse().map_err(|e| {
            validation_error!("bad value `{}` in {}: {}", &record[1], path.display(), e)
        })?;
        points.push((timestamp, value));
    }
    Ok(TimeSeries::from_points(points))
}

/// Write a [`TimeSeries`] as a `timestamp,value` CSV file.
pub fn write_series_csv<P: AsRef<Path>>(path: P, series: &TimeSeries) -> HtResult<()> {
    let path = path.as_ref();
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| validation_error!("cannot create series file {}: {}", path.display(), e))?;
    writer
        .write_record(["timestamp", "value"])
        .map_err(|e| validation_error!("write to {} failed: {}", path.display(), e))?;
    for (timestamp, value) in series.points() {
        writer
            .write_record([timestamp.to_rfc3339(), value.to_string()])
            .map_err(|e| validation_error!("write to {} failed: {}", path.display(), e))?;
    }
    writer
        .flush()
        .map_err(|e| validation_error!("flush of {} failed: {}", path.display(), e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn csv_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("observed.csv");

        let series = TimeSeries::from_points(vec![
            (Utc.with_ymd_and_hms(2023, 6, 1, 0, 0, 0).unwrap(), 1.25),
            (Utc.with_ymd_and_hms(2023, 6, 1, 1, 0, 0).unwrap(), 2.5),
        ]);
        write_series_csv(&path, &series).unwrap();
        let back = read_series_csv(&path).unwrap();
        assert_eq!(series, back);
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(read_series_csv("/nonexistent/observed.csv").is_err());
    }

    #[test]
    fn bad_timestamp_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(&path, "timestamp,value\nnot-a-time,1.0\n").unwrap();
        assert!(read_series_csv(&path).is_err());
    }

    #[test]
    fn bad_value_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(&path, "timestamp,value\n2023-06-01T00:00:00Z,abc\n").unwrap();
        assert!(read_series_csv(&path).is_err());
    }
}
