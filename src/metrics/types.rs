use chrono::NaiveDate;
use serde::Serialize;

use crate::dataset::TripRecord;

/// Summary and performance statistics over a set of trips.
///
/// An empty set yields every field zero (or `None` for the date bounds).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SummaryMetrics {
    pub total_trips: u64,
    pub completed_trips: u64,
    pub cancelled_trips: u64,
    /// Percentage of all trips that completed.
    pub completion_rate: f64,
    pub on_time_count: u64,
    /// Percentage of completed trips (with both pickup times) picked up on time.
    pub on_time_rate: f64,
    /// Trip time statistics in minutes, over completed trips only.
    pub avg_trip_time: f64,
    pub min_trip_time: f64,
    pub max_trip_time: f64,
    pub trip_time_std: f64,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// Days between the earliest and latest trip, both included.
    pub total_days: u64,
    pub avg_daily_trips: f64,
    pub avg_daily_completed: f64,
    pub avg_daily_cancelled: f64,
    pub efficiency_score: f64,
    /// Weighted blend of completion, on-time and efficiency, 0-100.
    pub performance_score: f64,
}

/// Time unit used to group trips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BucketUnit {
    Day,
    /// ISO week starting Monday.
    Week,
    Month,
    Year,
}

/// Semantic chart encoding recommended to the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    /// Discrete per-period bars.
    Comparison,
    /// Continuous line.
    Trend,
}

/// Bucket unit and encoding chosen for a filtered set of trips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Granularity {
    pub bucket_unit: BucketUnit,
    pub encoding: Encoding,
    /// Days spanned by the filtered trips, both ends included; 0 when empty.
    pub span_days: i64,
}

/// One contiguous sub-interval of a range and the metrics of its trips.
#[derive(Debug, Clone, Serialize)]
pub struct Bucket {
    pub label: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub metrics: SummaryMetrics,
    #[serde(skip)]
    pub records: Vec<TripRecord>,
}

/// Ordered, non-overlapping buckets. Periods without trips are not present.
#[derive(Debug, Clone, Serialize)]
pub struct BucketSeries {
    pub unit: BucketUnit,
    pub buckets: Vec<Bucket>,
}

impl BucketSeries {
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn labels(&self) -> Vec<&str> {
        self.buckets.iter().map(|b| b.label.as_str()).collect()
    }

    /// Every trip from every bucket, in bucket order.
    pub fn flat_records(&self) -> Vec<TripRecord> {
        self.buckets
            .iter()
            .flat_map(|b| b.records.iter().copied())
            .collect()
    }
}
