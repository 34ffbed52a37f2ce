use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use csv::{ReaderBuilder, Trim};
use serde::Deserialize;

use crate::dataset::{TripDataset, TripRecord, TripStatus};
use crate::error::{Error, Result};

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const TIME_FORMATS: &[&str] = &["%H:%M:%S", "%H:%M", "%I:%M %p", "%I:%M:%S %p"];

/// One CSV row as written by the trip export, or with already-normalized
/// column names.
#[derive(Debug, Deserialize)]
struct RawTripRow {
    #[serde(alias = "Date", alias = "date")]
    trip_date: Option<String>,
    #[serde(alias = "Status", alias = "status")]
    trip_status: Option<String>,
    #[serde(alias = "Scheduled_Pickup", alias = "scheduled_pickup")]
    scheduled_pickup_time: Option<String>,
    #[serde(alias = "Actual_Pickup", alias = "actual_pickup")]
    actual_pickup_time: Option<String>,
    #[serde(alias = "Dropoff_Time", alias = "dropoff")]
    dropoff_time: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub total_rows: usize,
    pub loaded_rows: usize,
    /// Rows that could not be deserialized at all; skipped.
    pub parse_errors: usize,
    /// Rows kept without a usable trip date; they never match a date filter.
    pub missing_dates: usize,
}

/// Load the trip log from a CSV file.
pub fn load_csv(path: impl AsRef<Path>) -> Result<(TripDataset, LoadReport)> {
    let path = path.as_ref();
    let file = File::open(path)
        .map_err(|e| Error::Dataset(format!("cannot open {}: {e}", path.display())))?;
    let (dataset, report) = load_from_reader(file)?;

    match dataset.date_span() {
        Some((first, last)) => log::info!(
            "Loaded {} trips from {} spanning {} days ({first} to {last})",
            report.loaded_rows,
            path.display(),
            (last - first).num_days() + 1
        ),
        None => log::info!("Loaded {} trips from {} (no dated rows)", report.loaded_rows, path.display()),
    }

    Ok((dataset.with_source(path), report))
}

/// Load the trip log from any CSV source with a header row.
pub fn load_from_reader<R: Read>(reader: R) -> Result<(TripDataset, LoadReport)> {
    let mut rdr = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let mut report = LoadReport::default();
    let mut records = Vec::new();

    for (index, result) in rdr.deserialize::<RawTripRow>().enumerate() {
        report.total_rows += 1;
        let row = match result {
            Ok(r) => r,
            Err(e) => {
                log::warn!("Skipping CSV row {}: {e}", index + 1);
                report.parse_errors += 1;
                continue;
            }
        };

        let date = parse_date(row.trip_date.as_deref());
        if date.is_none() {
            report.missing_dates += 1;
        }
        let status = row
            .trip_status
            .as_deref()
            .map(TripStatus::from_raw)
            .unwrap_or(TripStatus::Other);

        records.push(TripRecord::new(
            date,
            status,
            parse_timestamp(row.scheduled_pickup_time.as_deref(), date),
            parse_timestamp(row.actual_pickup_time.as_deref(), date),
            parse_timestamp(row.dropoff_time.as_deref(), date),
        ));
    }

    report.loaded_rows = records.len();
    if report.missing_dates > 0 {
        log::warn!("{} trips have no usable date and will not match any range", report.missing_dates);
    }
    Ok((TripDataset::from_records(records), report))
}

fn non_empty(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}

/// Parse a trip date. Accepts plain dates or full timestamps (the time is
/// dropped).
fn parse_date(raw: Option<&str>) -> Option<NaiveDate> {
    let s = non_empty(raw)?;
    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(s, f).ok())
        .or_else(|| parse_datetime(s).map(|dt| dt.date()))
}

fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
}

/// Parse a pickup/dropoff timestamp. A bare time of day is anchored to the
/// trip date.
fn parse_timestamp(raw: Option<&str>, date: Option<NaiveDate>) -> Option<NaiveDateTime> {
    let s = non_empty(raw)?;
    parse_datetime(s).or_else(|| {
        let time = TIME_FORMATS
            .iter()
            .find_map(|f| NaiveTime::parse_from_str(s, f).ok())?;
        Some(date?.and_time(time))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    const SOURCE_CSV: &str = "\
trip_id,trip_date,trip_status,scheduled_pickup_time,actual_pickup_time,dropoff_time
1,2024-06-03,completed,2024-06-03 09:00:00,2024-06-03 09:04:00,2024-06-03 09:34:00
2,2024-06-03,Cancelled,2024-06-03 10:00:00,,
3,2024-06-04,COMPLETED,2024-06-04 11:00:00,2024-06-04 11:10:00,2024-06-04 11:40:00
4,not-a-date,pending,,,
";

    #[test]
    fn test_load_source_columns() {
        let (ds, report) = load_from_reader(SOURCE_CSV.as_bytes()).unwrap();
        assert_eq!(report.total_rows, 4);
        assert_eq!(report.loaded_rows, 4);
        assert_eq!(report.parse_errors, 0);
        assert_eq!(report.missing_dates, 1);

        let r = &ds.records()[0];
        assert_eq!(r.date, Some(d(2024, 6, 3)));
        assert_eq!(r.status, TripStatus::Completed);
        assert_eq!(r.trip_duration_minutes(), Some(30.0));
        assert_eq!(r.on_time(), Some(true));

        assert_eq!(ds.records()[1].status, TripStatus::Cancelled);
        assert_eq!(ds.records()[1].actual_pickup, None);
        assert_eq!(ds.records()[2].on_time(), Some(false));
        assert_eq!(ds.records()[3].date, None);
        assert_eq!(ds.records()[3].status, TripStatus::Other);
    }

    #[test]
    fn test_load_normalized_columns_and_time_of_day() {
        let csv = "\
Date,Status,Scheduled_Pickup,Actual_Pickup,Dropoff_Time
06/05/2024,Completed,08:00,08:02,08:47
";
        let (ds, _) = load_from_reader(csv.as_bytes()).unwrap();
        let r = &ds.records()[0];
        assert_eq!(r.date, Some(d(2024, 6, 5)));
        assert_eq!(r.trip_duration_minutes(), Some(45.0));
        assert_eq!(r.on_time(), Some(true));
    }

    #[test]
    fn test_parse_date_accepts_timestamps() {
        assert_eq!(parse_date(Some("2024-06-05 13:45:00")), Some(d(2024, 6, 5)));
        assert_eq!(parse_date(Some("  ")), None);
        assert_eq!(parse_date(None), None);
    }

    #[test]
    fn test_time_without_date_is_absent() {
        assert_eq!(parse_timestamp(Some("08:00"), None), None);
    }

    #[test]
    fn test_load_csv_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SOURCE_CSV.as_bytes()).unwrap();

        let (ds, report) = load_csv(file.path()).unwrap();
        assert_eq!(report.loaded_rows, 4);
        assert_eq!(ds.source(), Some(file.path()));
    }

    #[test]
    fn test_load_csv_missing_file() {
        let err = load_csv("/nonexistent/trips.csv").unwrap_err();
        assert!(matches!(err, Error::Dataset(_)));
    }
}
