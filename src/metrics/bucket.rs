use std::collections::BTreeMap;

use chrono::{Datelike, Days, NaiveDate};

use super::types::{Bucket, BucketSeries, BucketUnit, Encoding, Granularity};
use super::{filter_by_range, summarize_filtered};
use crate::dataset::TripRecord;
use crate::date_util::week_start;
use crate::query::{DateRange, PeriodType};

impl BucketUnit {
    /// ≤7 days → day, ≤35 → week, ≤400 → month, otherwise year.
    pub fn for_span_days(days: i64) -> Self {
        match days {
            i64::MIN..=7 => BucketUnit::Day,
            8..=35 => BucketUnit::Week,
            36..=400 => BucketUnit::Month,
            _ => BucketUnit::Year,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BucketUnit::Day => "day",
            BucketUnit::Week => "week",
            BucketUnit::Month => "month",
            BucketUnit::Year => "year",
        }
    }

    /// Boundary of the bucket containing `d`.
    pub fn truncate(&self, d: NaiveDate) -> NaiveDate {
        match self {
            BucketUnit::Day => d,
            BucketUnit::Week => week_start(d),
            BucketUnit::Month => d.with_day(1).unwrap_or(d),
            BucketUnit::Year => d.with_ordinal(1).unwrap_or(d),
        }
    }

    /// Boundary of the bucket after the one starting at `boundary`.
    pub fn next_boundary(&self, boundary: NaiveDate) -> Option<NaiveDate> {
        match self {
            BucketUnit::Day => boundary.checked_add_days(Days::new(1)),
            BucketUnit::Week => boundary.checked_add_days(Days::new(7)),
            BucketUnit::Month => {
                if boundary.month() == 12 {
                    NaiveDate::from_ymd_opt(boundary.year() + 1, 1, 1)
                } else {
                    NaiveDate::from_ymd_opt(boundary.year(), boundary.month() + 1, 1)
                }
            }
            BucketUnit::Year => NaiveDate::from_ymd_opt(boundary.year() + 1, 1, 1),
        }
    }

    pub fn label(&self, boundary: NaiveDate) -> String {
        let fmt = match self {
            BucketUnit::Day => "%a %m/%d",
            BucketUnit::Week => "Week %m/%d",
            BucketUnit::Month => "%b %Y",
            BucketUnit::Year => "%Y",
        };
        boundary.format(fmt).to_string()
    }

    pub fn period_type(&self) -> PeriodType {
        match self {
            BucketUnit::Day => PeriodType::Daily,
            BucketUnit::Week => PeriodType::Weekly,
            BucketUnit::Month => PeriodType::Monthly,
            BucketUnit::Year => PeriodType::Yearly,
        }
    }
}

impl Encoding {
    /// ≤21 days → comparison, otherwise trend.
    pub fn for_span_days(days: i64) -> Self {
        if days <= 21 {
            Encoding::Comparison
        } else {
            Encoding::Trend
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Encoding::Comparison => "comparison",
            Encoding::Trend => "trend",
        }
    }
}

impl Granularity {
    /// The range with its period type replaced by the bucket unit's. A custom
    /// range keeps its tag.
    pub fn refine(&self, range: &DateRange) -> DateRange {
        if range.period_type == PeriodType::Custom || self.span_days == 0 {
            return *range;
        }
        DateRange {
            period_type: self.bucket_unit.period_type(),
            ..*range
        }
    }
}

/// Days between the earliest and latest dated trip, both included. 0 when no
/// trip has a date.
pub fn span_days(records: &[TripRecord]) -> i64 {
    let mut dates = records.iter().filter_map(|r| r.date);
    let Some(first) = dates.next() else {
        return 0;
    };
    let (lo, hi) = dates.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d)));
    (hi - lo).num_days() + 1
}

pub fn select_bucket_unit(filtered: &[TripRecord]) -> BucketUnit {
    BucketUnit::for_span_days(span_days(filtered))
}

pub fn select_encoding(filtered: &[TripRecord]) -> Encoding {
    Encoding::for_span_days(span_days(filtered))
}

/// Choose bucket unit and encoding from the span of the trips that fall in
/// `range`, not from the requested range itself.
pub fn select(range: &DateRange, records: &[TripRecord]) -> Granularity {
    let filtered = filter_by_range(records, range);
    let granularity = Granularity {
        bucket_unit: select_bucket_unit(&filtered),
        encoding: select_encoding(&filtered),
        span_days: span_days(&filtered),
    };
    log::debug!(
        "Granularity for {range}: {} buckets, {} encoding ({} days of data)",
        granularity.bucket_unit.as_str(),
        granularity.encoding.as_str(),
        granularity.span_days
    );
    granularity
}

/// Group the trips in `range` into `unit` buckets. Buckets are ordered by
/// start date, clipped to the range, and only present when they hold at least
/// one trip.
pub fn bucketed(records: &[TripRecord], range: &DateRange, unit: BucketUnit) -> BucketSeries {
    let mut groups: BTreeMap<NaiveDate, Vec<TripRecord>> = BTreeMap::new();
    for record in filter_by_range(records, range) {
        if let Some(date) = record.date {
            groups.entry(unit.truncate(date)).or_default().push(record);
        }
    }

    let buckets = groups
        .into_iter()
        .map(|(boundary, records)| {
            let last = unit
                .next_boundary(boundary)
                .and_then(|next| next.pred_opt())
                .unwrap_or(range.end);
            Bucket {
                label: unit.label(boundary),
                start: boundary.max(range.start),
                end: last.min(range.end),
                metrics: summarize_filtered(&records),
                records,
            }
        })
        .collect();

    BucketSeries { unit, buckets }
}
