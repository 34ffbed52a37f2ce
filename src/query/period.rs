use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{Datelike, Days, NaiveDate, Weekday};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::date_util::{last_day_of_month, month_bounds};
use crate::error::{Error, Result};

static RE_QUARTER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d{4})-Q([1-4])$").unwrap());
static RE_WEEK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d{4})-W(\d{1,2})$").unwrap());
static RE_MONTH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{2})$").unwrap());

/// Classification hint attached to a resolved range. Bucketing may override it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodType {
    Daily,
    Weekly,
    Monthly,
    Yearly,
    Custom,
}

impl PeriodType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodType::Daily => "daily",
            PeriodType::Weekly => "weekly",
            PeriodType::Monthly => "monthly",
            PeriodType::Yearly => "yearly",
            PeriodType::Custom => "custom",
        }
    }

    /// Classify a span of `days` days: ≤10 daily, ≤35 weekly, ≤400 monthly,
    /// otherwise yearly.
    pub fn for_day_count(days: u64) -> Self {
        match days {
            0..=10 => PeriodType::Daily,
            11..=35 => PeriodType::Weekly,
            36..=400 => PeriodType::Monthly,
            _ => PeriodType::Yearly,
        }
    }
}

impl fmt::Display for PeriodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PeriodType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "daily" => Ok(PeriodType::Daily),
            "weekly" => Ok(PeriodType::Weekly),
            "monthly" => Ok(PeriodType::Monthly),
            "yearly" => Ok(PeriodType::Yearly),
            "custom" => Ok(PeriodType::Custom),
            other => Err(Error::PeriodParse(format!("unknown period type: {other}"))),
        }
    }
}

/// A concrete, inclusive calendar range. `start <= end` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub period_type: PeriodType,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate, period_type: PeriodType) -> Result<Self> {
        if start > end {
            return Err(Error::InvalidRange(format!("{start} is after {end}")));
        }
        Ok(Self {
            start,
            end,
            period_type,
        })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Number of calendar days covered, both ends included.
    pub fn num_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn to_key(&self) -> String {
        format!("{}..{}", self.start, self.end)
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {} ({})", self.start, self.end, self.period_type)
    }
}

/// A named calendar period, addressed by a compact key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Period {
    Year(i32),
    Quarter(i32, u8),
    Month(i32, u8),
    Week(i32, u8),
    Rolling(u32, NaiveDate),
}

impl Period {
    /// Parse a period key.
    ///
    /// Supported formats:
    /// - `2025`: year
    /// - `2025-Q1`: quarter
    /// - `2025-01`: month
    /// - `2025-W05`: ISO week
    /// - `30d`: rolling last N days ending the day before `today`
    pub fn parse(s: &str, today: NaiveDate) -> Result<Self> {
        let s = s.trim();

        if let Some(n) = s.strip_suffix(['d', 'D']) {
            if let Ok(n) = n.parse::<u32>() {
                if n > 0 {
                    return Ok(Period::Rolling(n, today));
                }
            }
        }

        if s.len() == 4 {
            if let Ok(year) = s.parse::<i32>() {
                return Ok(Period::Year(year));
            }
        }

        if let Some(caps) = RE_QUARTER.captures(s) {
            let year: i32 = caps[1].parse().map_err(|_| invalid(s))?;
            let q: u8 = caps[2].parse().map_err(|_| invalid(s))?;
            return Ok(Period::Quarter(year, q));
        }

        if let Some(caps) = RE_WEEK.captures(s) {
            let year: i32 = caps[1].parse().map_err(|_| invalid(s))?;
            let week: u8 = caps[2].parse().map_err(|_| invalid(s))?;
            if NaiveDate::from_isoywd_opt(year, u32::from(week), Weekday::Mon).is_some() {
                return Ok(Period::Week(year, week));
            }
        }

        if let Some(caps) = RE_MONTH.captures(s) {
            let year: i32 = caps[1].parse().map_err(|_| invalid(s))?;
            let month: u8 = caps[2].parse().map_err(|_| invalid(s))?;
            if (1..=12).contains(&month) {
                return Ok(Period::Month(year, month));
            }
        }

        Err(invalid(s))
    }

    /// Quarter containing `d`.
    pub fn quarter_of(d: NaiveDate) -> Self {
        Period::Quarter(d.year(), crate::date_util::quarter_of(d))
    }

    pub fn to_key(&self) -> String {
        match self {
            Period::Year(y) => format!("{y}"),
            Period::Quarter(y, q) => format!("{y}-Q{q}"),
            Period::Month(y, m) => format!("{y}-{m:02}"),
            Period::Week(y, w) => format!("{y}-W{w:02}"),
            Period::Rolling(n, _) => format!("{n}d"),
        }
    }

    /// Start and end dates (inclusive).
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        match self {
            Period::Year(y) => Some((
                NaiveDate::from_ymd_opt(*y, 1, 1)?,
                NaiveDate::from_ymd_opt(*y, 12, 31)?,
            )),
            Period::Quarter(y, q) => {
                let start_month = (u32::from(*q) - 1) * 3 + 1;
                Some((
                    NaiveDate::from_ymd_opt(*y, start_month, 1)?,
                    last_day_of_month(*y, start_month + 2)?,
                ))
            }
            Period::Month(y, m) => month_bounds(*y, u32::from(*m)),
            Period::Week(y, w) => {
                let start = NaiveDate::from_isoywd_opt(*y, u32::from(*w), Weekday::Mon)?;
                Some((start, start.checked_add_days(Days::new(6))?))
            }
            Period::Rolling(n, as_of) => {
                let end = as_of.pred_opt()?;
                Some((end.checked_sub_days(Days::new(u64::from(n.saturating_sub(1))))?, end))
            }
        }
    }

    pub fn period_type(&self) -> PeriodType {
        match self {
            Period::Year(_) => PeriodType::Yearly,
            Period::Quarter(..) | Period::Month(..) => PeriodType::Monthly,
            Period::Week(..) => PeriodType::Weekly,
            Period::Rolling(n, _) => PeriodType::for_day_count(u64::from(*n)),
        }
    }

    pub fn to_range(&self) -> Result<DateRange> {
        let (start, end) = self
            .date_range()
            .ok_or_else(|| Error::PeriodParse(format!("period out of range: {}", self.to_key())))?;
        DateRange::new(start, end, self.period_type())
    }

    /// Get the previous period of the same type.
    pub fn previous(&self) -> Self {
        match self {
            Period::Year(y) => Period::Year(y - 1),
            Period::Quarter(y, q) => {
                if *q == 1 {
                    Period::Quarter(y - 1, 4)
                } else {
                    Period::Quarter(*y, q - 1)
                }
            }
            Period::Month(y, m) => {
                if *m == 1 {
                    Period::Month(y - 1, 12)
                } else {
                    Period::Month(*y, m - 1)
                }
            }
            Period::Week(y, w) => {
                if *w == 1 {
                    let weeks = NaiveDate::from_ymd_opt(y - 1, 12, 28)
                        .map(|d| d.iso_week().week() as u8)
                        .unwrap_or(52);
                    Period::Week(y - 1, weeks)
                } else {
                    Period::Week(*y, w - 1)
                }
            }
            Period::Rolling(n, as_of) => Period::Rolling(
                *n,
                as_of
                    .checked_sub_days(Days::new(u64::from(*n)))
                    .unwrap_or(*as_of),
            ),
        }
    }
}

fn invalid(s: &str) -> Error {
    Error::PeriodParse(format!("unrecognized period: {s}"))
}
