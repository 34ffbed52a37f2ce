use chrono::{Datelike, Weekday};
use serde::Serialize;

use super::validate::{Resolved, ResolutionSource};
use super::ToolKind;
use crate::dataset::{TripDataset, TripRecord};
use crate::error::{Error, Result};
use crate::metrics::{
    bucketed, filter_by_range, select, stats, summarize_filtered, Bucket, BucketSeries, Encoding,
    Granularity, SummaryMetrics,
};
use crate::query::DateRange;

const WEEK: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// Everything the presentation layer needs to render one answer.
#[derive(Debug, Clone, Serialize)]
pub struct AggregationResult {
    pub tool: ToolKind,
    /// The resolved range, with its period type refined by the granularity.
    pub range: DateRange,
    pub description: Option<String>,
    pub source: ResolutionSource,
    pub granularity: Granularity,
    pub recommended_encoding: Encoding,
    pub metrics: SummaryMetrics,
    pub bucketed_series: BucketSeries,
    pub detail: ToolDetail,
}

/// Quality band for a percentage: good at 90 and above, fair at 75 and above.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Band {
    Good,
    Fair,
    Poor,
}

impl Band {
    pub fn for_rate(rate: f64) -> Self {
        if rate >= 90.0 {
            Band::Good
        } else if rate >= 75.0 {
            Band::Fair
        } else {
            Band::Poor
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Band::Good => "good",
            Band::Fair => "fair",
            Band::Poor => "poor",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeekdayCount {
    pub weekday: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeekdayRate {
    pub weekday: String,
    pub total: u64,
    pub completed: u64,
    pub rate: f64,
    pub band: Band,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketRate {
    pub label: String,
    pub rate: f64,
    pub band: Band,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketTripTime {
    pub label: String,
    pub completed_trips: u64,
    pub avg: f64,
    pub min: f64,
    pub max: f64,
}

/// A bucket's value against the mean over all buckets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Benchmark {
    pub value: f64,
    pub delta: f64,
    pub better_than_average: bool,
}

impl Benchmark {
    fn higher_is_better(value: f64, average: f64) -> Self {
        Self {
            value,
            delta: value - average,
            better_than_average: value >= average,
        }
    }

    fn lower_is_better(value: f64, average: f64) -> Self {
        Self {
            value,
            delta: value - average,
            better_than_average: value <= average,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchmarkRow {
    pub label: String,
    pub completion_rate: Benchmark,
    pub on_time_rate: Benchmark,
    /// Absent for buckets without any timed trip.
    pub trip_time: Option<Benchmark>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BenchmarkAverages {
    pub completion_rate: f64,
    pub on_time_rate: f64,
    pub trip_time: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatmapRow {
    pub label: String,
    pub completion_rate: f64,
    pub on_time_rate: f64,
    /// 0 for the slowest bucket, 100 for an instantaneous one.
    pub trip_efficiency: f64,
}

/// Operation-specific output on top of the shared metrics and series.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolDetail {
    Summary,
    Cancellations {
        cancellation_rate: f64,
        by_weekday: Vec<WeekdayCount>,
    },
    Completions {
        by_weekday: Vec<WeekdayCount>,
    },
    OnTimePickup {
        late_count: u64,
        by_bucket: Vec<BucketRate>,
    },
    TripTime {
        by_bucket: Vec<BucketTripTime>,
    },
    CompletionRate {
        by_weekday: Vec<WeekdayRate>,
    },
    Benchmarking {
        averages: BenchmarkAverages,
        by_bucket: Vec<BenchmarkRow>,
    },
    Heatmap {
        by_bucket: Vec<HeatmapRow>,
    },
}

/// Run the operation named by a validated request over `dataset`.
///
/// Every operation filters to the resolved range, picks its granularity from
/// the trips found there and shares the same metrics and bucketed series.
pub fn dispatch(dataset: &TripDataset, resolved: &Resolved) -> Result<AggregationResult> {
    let tool = ToolKind::from_name(&resolved.request.tool_name)
        .ok_or_else(|| Error::UnknownTool(resolved.request.tool_name.clone()))?;

    let filtered = filter_by_range(dataset.records(), &resolved.range);
    let granularity = select(&resolved.range, &filtered);
    let range = granularity.refine(&resolved.range);
    let metrics = summarize_filtered(&filtered);
    let series = bucketed(&filtered, &range, granularity.bucket_unit);

    log::debug!(
        "Dispatching {tool} over {range}: {} trips in {} buckets",
        metrics.total_trips,
        series.len()
    );

    let detail = match tool {
        ToolKind::TripSummary => ToolDetail::Summary,
        ToolKind::Cancellations => ToolDetail::Cancellations {
            cancellation_rate: stats::pct(metrics.cancelled_trips, metrics.total_trips),
            by_weekday: count_by_weekday(&filtered, TripRecord::is_cancelled),
        },
        ToolKind::Completions => ToolDetail::Completions {
            by_weekday: count_by_weekday(&filtered, TripRecord::is_completed),
        },
        ToolKind::OnTimePickup => on_time_detail(&filtered, &series),
        ToolKind::TripTime => trip_time_detail(&series),
        ToolKind::CompletionRate => ToolDetail::CompletionRate {
            by_weekday: completion_by_weekday(&filtered),
        },
        ToolKind::Benchmarking => benchmarking_detail(&series),
        ToolKind::Heatmap => heatmap_detail(&series),
    };

    Ok(AggregationResult {
        tool,
        range,
        description: resolved.request.description.clone(),
        source: resolved.source,
        granularity,
        recommended_encoding: granularity.encoding,
        metrics,
        bucketed_series: series,
        detail,
    })
}

/// Matching trips per weekday, Monday first. Weekdays without a match are
/// left out.
fn count_by_weekday(records: &[TripRecord], matches: fn(&TripRecord) -> bool) -> Vec<WeekdayCount> {
    WEEK.iter()
        .filter_map(|&weekday| {
            let count = records
                .iter()
                .filter(|r| matches(r) && r.date.is_some_and(|d| d.weekday() == weekday))
                .count() as u64;
            (count > 0).then(|| WeekdayCount {
                weekday: weekday.to_string(),
                count,
            })
        })
        .collect()
}

fn completion_by_weekday(records: &[TripRecord]) -> Vec<WeekdayRate> {
    WEEK.iter()
        .filter_map(|&weekday| {
            let day: Vec<&TripRecord> = records
                .iter()
                .filter(|r| r.date.is_some_and(|d| d.weekday() == weekday))
                .collect();
            if day.is_empty() {
                return None;
            }
            let total = day.len() as u64;
            let completed = day.iter().filter(|r| r.is_completed()).count() as u64;
            let rate = stats::pct(completed, total);
            Some(WeekdayRate {
                weekday: weekday.to_string(),
                total,
                completed,
                rate,
                band: Band::for_rate(rate),
            })
        })
        .collect()
}

fn on_time_detail(records: &[TripRecord], series: &BucketSeries) -> ToolDetail {
    let late_count = records.iter().filter(|r| r.on_time() == Some(false)).count() as u64;
    let by_bucket = series
        .buckets
        .iter()
        .filter(|b| has_on_time_data(b))
        .map(|b| BucketRate {
            label: b.label.clone(),
            rate: b.metrics.on_time_rate,
            band: Band::for_rate(b.metrics.on_time_rate),
        })
        .collect();
    ToolDetail::OnTimePickup {
        late_count,
        by_bucket,
    }
}

fn trip_time_detail(series: &BucketSeries) -> ToolDetail {
    let by_bucket = series
        .buckets
        .iter()
        .filter(|b| has_trip_times(b))
        .map(|b| BucketTripTime {
            label: b.label.clone(),
            completed_trips: b.metrics.completed_trips,
            avg: b.metrics.avg_trip_time,
            min: b.metrics.min_trip_time,
            max: b.metrics.max_trip_time,
        })
        .collect();
    ToolDetail::TripTime { by_bucket }
}

fn has_on_time_data(bucket: &Bucket) -> bool {
    bucket.records.iter().any(|r| r.on_time().is_some())
}

fn has_trip_times(bucket: &Bucket) -> bool {
    bucket.records.iter().any(|r| r.trip_duration_minutes().is_some())
}

fn benchmarking_detail(series: &BucketSeries) -> ToolDetail {
    let completion: Vec<f64> = series.buckets.iter().map(|b| b.metrics.completion_rate).collect();
    let on_time: Vec<f64> = series.buckets.iter().map(|b| b.metrics.on_time_rate).collect();
    let trip_time: Vec<f64> = series
        .buckets
        .iter()
        .filter(|b| has_trip_times(b))
        .map(|b| b.metrics.avg_trip_time)
        .collect();

    let averages = BenchmarkAverages {
        completion_rate: stats::mean(&completion),
        on_time_rate: stats::mean(&on_time),
        trip_time: stats::mean(&trip_time),
    };

    let by_bucket = series
        .buckets
        .iter()
        .map(|b| BenchmarkRow {
            label: b.label.clone(),
            completion_rate: Benchmark::higher_is_better(
                b.metrics.completion_rate,
                averages.completion_rate,
            ),
            on_time_rate: Benchmark::higher_is_better(b.metrics.on_time_rate, averages.on_time_rate),
            trip_time: has_trip_times(b)
                .then(|| Benchmark::lower_is_better(b.metrics.avg_trip_time, averages.trip_time)),
        })
        .collect();

    ToolDetail::Benchmarking {
        averages,
        by_bucket,
    }
}

fn heatmap_detail(series: &BucketSeries) -> ToolDetail {
    let active: Vec<&SummaryMetrics> = series
        .buckets
        .iter()
        .map(|b| &b.metrics)
        .filter(|m| m.completion_rate > 0.0)
        .collect();
    let max_time = active.iter().map(|m| m.avg_trip_time).fold(0.0, f64::max);

    let by_bucket = series
        .buckets
        .iter()
        .filter(|b| b.metrics.completion_rate > 0.0)
        .map(|b| HeatmapRow {
            label: b.label.clone(),
            completion_rate: b.metrics.completion_rate,
            on_time_rate: b.metrics.on_time_rate,
            trip_efficiency: if max_time > 0.0 {
                (max_time - b.metrics.avg_trip_time) / max_time * 100.0
            } else {
                0.0
            },
        })
        .collect();
    ToolDetail::Heatmap { by_bucket }
}
