pub mod loader;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

pub use loader::{load_csv, load_from_reader, LoadReport};

/// Maximum pickup deviation, either direction, that still counts as on time.
pub const ON_TIME_TOLERANCE_SECS: i64 = 5 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TripStatus {
    Completed,
    Cancelled,
    /// Any pending or unknown state.
    Other,
}

impl TripStatus {
    /// Normalize a raw status string regardless of casing.
    pub fn from_raw(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "completed" | "complete" => TripStatus::Completed,
            "cancelled" | "canceled" => TripStatus::Cancelled,
            _ => TripStatus::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TripStatus::Completed => "Completed",
            TripStatus::Cancelled => "Cancelled",
            TripStatus::Other => "Other",
        }
    }
}

/// One ride from the trip log. Derived fields are computed at construction
/// and never change afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TripRecord {
    pub date: Option<NaiveDate>,
    pub status: TripStatus,
    pub scheduled_pickup: Option<NaiveDateTime>,
    pub actual_pickup: Option<NaiveDateTime>,
    pub dropoff: Option<NaiveDateTime>,
    trip_duration_minutes: Option<f64>,
    on_time: Option<bool>,
}

impl TripRecord {
    pub fn new(
        date: Option<NaiveDate>,
        status: TripStatus,
        scheduled_pickup: Option<NaiveDateTime>,
        actual_pickup: Option<NaiveDateTime>,
        dropoff: Option<NaiveDateTime>,
    ) -> Self {
        let completed = status == TripStatus::Completed;

        let trip_duration_minutes = match (completed, actual_pickup, dropoff) {
            (true, Some(pickup), Some(dropoff)) => {
                Some((dropoff - pickup).num_seconds() as f64 / 60.0)
            }
            _ => None,
        };
        let on_time = match (completed, scheduled_pickup, actual_pickup) {
            (true, Some(scheduled), Some(actual)) => {
                Some((actual - scheduled).num_seconds().abs() <= ON_TIME_TOLERANCE_SECS)
            }
            _ => None,
        };

        Self {
            date,
            status,
            scheduled_pickup,
            actual_pickup,
            dropoff,
            trip_duration_minutes,
            on_time,
        }
    }

    /// Minutes from actual pickup to dropoff; only for completed trips with
    /// both timestamps.
    pub fn trip_duration_minutes(&self) -> Option<f64> {
        self.trip_duration_minutes
    }

    /// Whether pickup happened within the tolerance of the schedule; only for
    /// completed trips with both pickup timestamps.
    pub fn on_time(&self) -> Option<bool> {
        self.on_time
    }

    pub fn is_completed(&self) -> bool {
        self.status == TripStatus::Completed
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == TripStatus::Cancelled
    }
}

/// The in-memory trip log. Read-only once built.
#[derive(Debug, Clone, Default)]
pub struct TripDataset {
    records: Vec<TripRecord>,
    source: Option<PathBuf>,
}

impl TripDataset {
    pub fn from_records(records: Vec<TripRecord>) -> Self {
        Self {
            records,
            source: None,
        }
    }

    pub fn with_source(mut self, path: impl AsRef<Path>) -> Self {
        self.source = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn records(&self) -> &[TripRecord] {
        &self.records
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Earliest and latest trip dates present.
    pub fn date_span(&self) -> Option<(NaiveDate, NaiveDate)> {
        let mut dates = self.records.iter().filter_map(|r| r.date);
        let first = dates.next()?;
        Some(dates.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d))))
    }
}

/// Shared reference to the current dataset.
///
/// Readers take a snapshot `Arc` and keep using it for the whole query;
/// reloading replaces the reference as a unit, so a reader never sees a
/// partially updated table.
#[derive(Debug, Default)]
pub struct DatasetHandle {
    current: RwLock<Arc<TripDataset>>,
}

impl DatasetHandle {
    pub fn new(dataset: TripDataset) -> Self {
        Self {
            current: RwLock::new(Arc::new(dataset)),
        }
    }

    pub fn snapshot(&self) -> Arc<TripDataset> {
        self.current.read().clone()
    }

    /// Install a new dataset and return the one it replaced.
    pub fn replace(&self, dataset: TripDataset) -> Arc<TripDataset> {
        std::mem::replace(&mut *self.current.write(), Arc::new(dataset))
    }
}
