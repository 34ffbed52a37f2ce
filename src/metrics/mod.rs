pub mod bucket;
pub mod stats;
pub mod types;

pub use bucket::{bucketed, select, select_bucket_unit, select_encoding, span_days};
pub use types::*;

use crate::dataset::TripRecord;
use crate::query::DateRange;

/// Weights of the composite performance score.
const COMPLETION_WEIGHT: f64 = 0.4;
const ON_TIME_WEIGHT: f64 = 0.4;
const EFFICIENCY_WEIGHT: f64 = 0.2;

/// Trips whose date falls in `range`, both ends included. Undated trips never
/// match.
pub fn filter_by_range(records: &[TripRecord], range: &DateRange) -> Vec<TripRecord> {
    records
        .iter()
        .filter(|r| r.date.is_some_and(|d| range.contains(d)))
        .copied()
        .collect()
}

/// Compute summary metrics over `records`, restricted to `range` when given.
pub fn summarize(records: &[TripRecord], range: Option<&DateRange>) -> SummaryMetrics {
    match range {
        Some(range) => summarize_filtered(&filter_by_range(records, range)),
        None => summarize_filtered(records),
    }
}

/// Compute summary metrics over trips that are already filtered. This is the
/// single code path used for whole ranges and for every bucket.
pub fn summarize_filtered(records: &[TripRecord]) -> SummaryMetrics {
    if records.is_empty() {
        return SummaryMetrics::default();
    }

    let total_trips = records.len() as u64;
    let completed_trips = records.iter().filter(|r| r.is_completed()).count() as u64;
    let cancelled_trips = records.iter().filter(|r| r.is_cancelled()).count() as u64;

    let punctuality: Vec<bool> = records.iter().filter_map(|r| r.on_time()).collect();
    let on_time_count = punctuality.iter().filter(|&&on_time| on_time).count() as u64;

    // Sorted so the result does not depend on record order.
    let mut durations: Vec<f64> = records
        .iter()
        .filter_map(|r| r.trip_duration_minutes())
        .collect();
    durations.sort_by(f64::total_cmp);
    let avg_trip_time = stats::mean(&durations);

    let dates = records.iter().filter_map(|r| r.date);
    let start_date = dates.clone().min();
    let end_date = dates.max();
    let total_days = match (start_date, end_date) {
        (Some(start), Some(end)) => (end - start).num_days() as u64 + 1,
        _ => 0,
    };
    let per_day = |count: u64| {
        if total_days == 0 {
            0.0
        } else {
            count as f64 / total_days as f64
        }
    };

    let completion_rate = stats::pct(completed_trips, total_trips);
    let on_time_rate = stats::pct(on_time_count, punctuality.len() as u64);
    let efficiency_score = efficiency_score(avg_trip_time);

    SummaryMetrics {
        total_trips,
        completed_trips,
        cancelled_trips,
        completion_rate,
        on_time_count,
        on_time_rate,
        avg_trip_time,
        min_trip_time: stats::min(&durations),
        max_trip_time: stats::max(&durations),
        trip_time_std: stats::sample_stddev(&durations, avg_trip_time),
        start_date,
        end_date,
        total_days,
        avg_daily_trips: per_day(total_trips),
        avg_daily_completed: per_day(completed_trips),
        avg_daily_cancelled: per_day(cancelled_trips),
        efficiency_score,
        performance_score: performance_score(completion_rate, on_time_rate, efficiency_score),
    }
}

/// 100 at zero average trip time, falling linearly to 0 at 60 minutes and
/// beyond. No trip times at all count as fully efficient.
pub fn efficiency_score(avg_trip_time: f64) -> f64 {
    if avg_trip_time <= 0.0 {
        return 100.0;
    }
    (100.0 - avg_trip_time / 60.0 * 100.0).max(0.0)
}

pub fn performance_score(completion_rate: f64, on_time_rate: f64, efficiency_score: f64) -> f64 {
    let score = COMPLETION_WEIGHT * completion_rate
        + ON_TIME_WEIGHT * on_time_rate
        + EFFICIENCY_WEIGHT * efficiency_score;
    score.clamp(0.0, 100.0)
}
