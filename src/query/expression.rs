//! Deterministic resolution of date phrases ("last 2 weeks", "Q1 2024",
//! "month of June", ...) into concrete calendar ranges.
//!
//! Rules are tried in a fixed order and the first match wins:
//!
//! 1. explicit `YYYY-MM-DD to YYYY-MM-DD` literal
//! 2. counted relative units (`last|past|previous N weeks|months|years|days`)
//! 3. named months (`month of June`, `June 2024`, `last June`)
//! 4. quarters (`Q3`, `Q1 2024`, `last quarter`)
//! 5. fixed phrases (`last week`, `this month`, `this year`, ...)

use std::sync::LazyLock;

use chrono::{Datelike, Days, NaiveDate};
use regex::Regex;

use crate::date_util::{month_bounds, week_start, years_before};
use crate::query::period::{DateRange, Period, PeriodType};

static RE_EXPLICIT_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{4}-\d{2}-\d{2})\s*to\s*(\d{4}-\d{2}-\d{2})").unwrap()
});

static RE_QUARTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bq([1-4])(?:\s*(\d{4}))?\b").unwrap());

static RE_LAST_QUARTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\blast\s+quarter\b").unwrap());

/// Counted relative units in match priority order.
static COUNTED_UNITS: LazyLock<Vec<(CountedUnit, Regex)>> = LazyLock::new(|| {
    [
        (CountedUnit::Weeks, "weeks?"),
        (CountedUnit::Months, "months?"),
        (CountedUnit::Years, "years?"),
        (CountedUnit::Days, "days?"),
    ]
    .into_iter()
    .map(|(unit, word)| {
        let re = Regex::new(&format!(r"\b(?:last|past|previous)\s+(\d+)\s+{word}\b")).unwrap();
        (unit, re)
    })
    .collect()
});

/// Month names and abbreviations, each with its three phrase patterns.
static MONTH_PATTERNS: LazyLock<Vec<MonthPatterns>> = LazyLock::new(|| {
    MONTH_NAMES
        .iter()
        .map(|&(name, month)| MonthPatterns {
            month,
            month_of: Regex::new(&format!(r"\bmonth\s+of\s+{name}\b")).unwrap(),
            with_year: Regex::new(&format!(r"\b{name}\s+(\d{{4}})\b")).unwrap(),
            last: Regex::new(&format!(r"\blast\s+{name}\b")).unwrap(),
        })
        .collect()
});

const MONTH_NAMES: &[(&str, u32)] = &[
    ("january", 1),
    ("jan", 1),
    ("february", 2),
    ("feb", 2),
    ("march", 3),
    ("mar", 3),
    ("april", 4),
    ("apr", 4),
    ("may", 5),
    ("june", 6),
    ("july", 7),
    ("august", 8),
    ("aug", 8),
    ("september", 9),
    ("sep", 9),
    ("october", 10),
    ("oct", 10),
    ("november", 11),
    ("nov", 11),
    ("december", 12),
    ("dec", 12),
];

const LAST_WEEK: &[&str] = &["last week", "past week", "previous week"];
const THIS_WEEK: &[&str] = &["this week", "current week"];
const LAST_MONTH: &[&str] = &["last month", "past month", "previous month"];
const THIS_MONTH: &[&str] = &["this month", "current month"];
const LAST_YEAR: &[&str] = &["last year", "past year", "previous year"];
const THIS_YEAR: &[&str] = &["this year", "current year"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CountedUnit {
    Weeks,
    Months,
    Years,
    Days,
}

struct MonthPatterns {
    month: u32,
    month_of: Regex,
    with_year: Regex,
    last: Regex,
}

/// Resolve a free-text date expression relative to `today`.
///
/// Returns `None` when no rule matches; callers treat that as unresolved,
/// never as an empty range.
pub fn parse_expression(text: &str, today: NaiveDate) -> Option<DateRange> {
    let lower = text.to_lowercase();

    explicit_range(text)
        .or_else(|| counted_units(&lower, today))
        .or_else(|| named_month(&lower, today))
        .or_else(|| quarter(&lower, today))
        .or_else(|| fixed_phrase(&lower, today))
}

fn explicit_range(text: &str) -> Option<DateRange> {
    let caps = RE_EXPLICIT_RANGE.captures(text)?;
    let start = NaiveDate::parse_from_str(&caps[1], "%Y-%m-%d").ok()?;
    let end = NaiveDate::parse_from_str(&caps[2], "%Y-%m-%d").ok()?;
    DateRange::new(start, end, PeriodType::Custom).ok()
}

fn counted_units(lower: &str, today: NaiveDate) -> Option<DateRange> {
    let (unit, n) = COUNTED_UNITS.iter().find_map(|(unit, re)| {
        let caps = re.captures(lower)?;
        Some((*unit, caps[1].parse::<u64>().ok()))
    })?;
    let n = n?;
    let end = today.pred_opt()?;

    let (start, period_type) = match unit {
        CountedUnit::Weeks => (end.checked_sub_days(Days::new(n.checked_mul(7)?))?, PeriodType::Weekly),
        CountedUnit::Months => (end.checked_sub_days(Days::new(n.checked_mul(30)?))?, PeriodType::Monthly),
        CountedUnit::Years => (years_before(today, u32::try_from(n).ok()?)?, PeriodType::Yearly),
        CountedUnit::Days => (
            end.checked_sub_days(Days::new(n.checked_sub(1)?))?,
            PeriodType::for_day_count(n),
        ),
    };
    DateRange::new(start, end, period_type).ok()
}

fn named_month(lower: &str, today: NaiveDate) -> Option<DateRange> {
    for p in MONTH_PATTERNS.iter() {
        let year = if p.month_of.is_match(lower) {
            Some(today.year())
        } else if let Some(caps) = p.with_year.captures(lower) {
            caps[1].parse::<i32>().ok()
        } else if p.last.is_match(lower) {
            // Most recent fully past occurrence of that month
            if today.month() > p.month {
                Some(today.year())
            } else {
                Some(today.year() - 1)
            }
        } else {
            None
        };

        if let Some(year) = year {
            let (start, end) = month_bounds(year, p.month)?;
            return DateRange::new(start, end, PeriodType::Monthly).ok();
        }
    }
    None
}

fn quarter(lower: &str, today: NaiveDate) -> Option<DateRange> {
    let period = if let Some(caps) = RE_QUARTER.captures(lower) {
        let q: u8 = caps[1].parse().ok()?;
        let year = match caps.get(2) {
            Some(y) => y.as_str().parse().ok()?,
            None => today.year(),
        };
        Period::Quarter(year, q)
    } else if RE_LAST_QUARTER.is_match(lower) {
        Period::quarter_of(today).previous()
    } else {
        return None;
    };

    let (start, end) = period.date_range()?;
    DateRange::new(start, end, PeriodType::Monthly).ok()
}

fn fixed_phrase(lower: &str, today: NaiveDate) -> Option<DateRange> {
    let mentions = |phrases: &[&str]| phrases.iter().any(|p| lower.contains(p));

    let (start, end, period_type) = if mentions(LAST_WEEK) {
        // Seven days ending yesterday
        let end = today.pred_opt()?;
        (end.checked_sub_days(Days::new(6))?, end, PeriodType::Weekly)
    } else if mentions(THIS_WEEK) {
        (week_start(today), today, PeriodType::Weekly)
    } else if mentions(LAST_MONTH) {
        let (year, month) = if today.month() == 1 {
            (today.year() - 1, 12)
        } else {
            (today.year(), today.month() - 1)
        };
        let (start, end) = month_bounds(year, month)?;
        (start, end, PeriodType::Monthly)
    } else if mentions(THIS_MONTH) {
        (today.with_day(1)?, today, PeriodType::Monthly)
    } else if mentions(LAST_YEAR) {
        let year = today.year() - 1;
        (
            NaiveDate::from_ymd_opt(year, 1, 1)?,
            NaiveDate::from_ymd_opt(year, 12, 31)?,
            PeriodType::Yearly,
        )
    } else if mentions(THIS_YEAR) {
        (NaiveDate::from_ymd_opt(today.year(), 1, 1)?, today, PeriodType::Yearly)
    } else {
        return None;
    };

    DateRange::new(start, end, period_type).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn parse(text: &str, today: NaiveDate) -> DateRange {
        parse_expression(text, today).unwrap_or_else(|| panic!("no match for {text:?}"))
    }

    #[test]
    fn test_explicit_range_is_custom() {
        let r = parse("show data from 2024-01-01 to 2024-03-31", d(2025, 5, 5));
        assert_eq!(r.start, d(2024, 1, 1));
        assert_eq!(r.end, d(2024, 3, 31));
        assert_eq!(r.period_type, PeriodType::Custom);
    }

    #[test]
    fn test_invalid_explicit_range_falls_through() {
        // 2024-02-30 is not a date; the quarter rule picks up "q1" instead
        let r = parse("2024-02-30 to 2024-03-31 q1", d(2025, 5, 5));
        assert_eq!(r.start, d(2025, 1, 1));
        assert_eq!(parse_expression("2024-03-31 to 2024-01-01", d(2025, 5, 5)), None);
    }

    #[test]
    fn test_last_n_weeks() {
        let today = d(2024, 6, 15);
        for n in 1..=60u64 {
            let r = parse(&format!("last {n} weeks"), today);
            assert_eq!(r.end, d(2024, 6, 14));
            assert_eq!((r.end - r.start).num_days(), 7 * n as i64, "n = {n}");
            assert_eq!(r.period_type, PeriodType::Weekly);
        }
        let r = parse("Past 1 week of trips", today);
        assert_eq!(r.start, d(2024, 6, 7));
    }

    #[test]
    fn test_last_n_months_uses_thirty_day_months() {
        let r = parse("previous 3 months", d(2024, 6, 15));
        assert_eq!(r.end, d(2024, 6, 14));
        assert_eq!(r.start, d(2024, 3, 16));
        assert_eq!(r.period_type, PeriodType::Monthly);
    }

    #[test]
    fn test_last_n_years_uses_calendar_subtraction() {
        let r = parse("last 2 years", d(2024, 6, 15));
        assert_eq!(r.start, d(2022, 6, 15));
        assert_eq!(r.end, d(2024, 6, 14));
        assert_eq!(r.period_type, PeriodType::Yearly);
    }

    #[test]
    fn test_last_n_days_reclassifies_period_type() {
        let today = d(2024, 6, 15);
        let r = parse("last 7 days", today);
        assert_eq!(r.start, d(2024, 6, 8));
        assert_eq!(r.end, d(2024, 6, 14));
        assert_eq!(r.num_days(), 7);
        assert_eq!(r.period_type, PeriodType::Daily);

        assert_eq!(parse("past 14 days", today).period_type, PeriodType::Weekly);
        assert_eq!(parse("past 45 days", today).period_type, PeriodType::Monthly);
        assert_eq!(parse("past 500 days", today).period_type, PeriodType::Yearly);
    }

    #[test]
    fn test_counted_units_priority_and_bounds() {
        // weeks are tried before days regardless of position in the text
        let r = parse("last 10 days vs last 2 weeks", d(2024, 6, 15));
        assert_eq!(r.period_type, PeriodType::Weekly);
        assert_eq!(parse_expression("last 0 days", d(2024, 6, 15)), None);
        assert_eq!(
            parse_expression("last 99999999999999999999 weeks", d(2024, 6, 15)),
            None
        );
    }

    #[test]
    fn test_month_of() {
        let r = parse("month of June", d(2024, 9, 2));
        assert_eq!((r.start, r.end), (d(2024, 6, 1), d(2024, 6, 30)));
        assert_eq!(r.period_type, PeriodType::Monthly);

        let r = parse("cancellations for the month of dec", d(2024, 3, 2));
        assert_eq!((r.start, r.end), (d(2024, 12, 1), d(2024, 12, 31)));
    }

    #[test]
    fn test_month_with_year() {
        let r = parse("June 2023 on-time rate", d(2024, 9, 2));
        assert_eq!((r.start, r.end), (d(2023, 6, 1), d(2023, 6, 30)));
        let r = parse("feb 2024", d(2025, 1, 1));
        assert_eq!(r.end, d(2024, 2, 29));
    }

    #[test]
    fn test_last_named_month() {
        // June already passed this year
        let r = parse("last june", d(2024, 9, 2));
        assert_eq!(r.start, d(2024, 6, 1));
        // June not yet over: previous year's June
        let r = parse("last june", d(2024, 6, 20));
        assert_eq!(r.start, d(2023, 6, 1));
        let r = parse("last december", d(2024, 3, 1));
        assert_eq!((r.start, r.end), (d(2023, 12, 1), d(2023, 12, 31)));
    }

    #[test]
    fn test_quarters() {
        let today = d(2025, 5, 5);
        let r = parse("Q1 2024", today);
        assert_eq!((r.start, r.end), (d(2024, 1, 1), d(2024, 3, 31)));
        assert_eq!(r.period_type, PeriodType::Monthly);

        let r = parse("Q4 2023", today);
        assert_eq!((r.start, r.end), (d(2023, 10, 1), d(2023, 12, 31)));

        let r = parse("how did q3 go", today);
        assert_eq!((r.start, r.end), (d(2025, 7, 1), d(2025, 9, 30)));
    }

    #[test]
    fn test_last_quarter_rolls_back_year() {
        let r = parse("last quarter", d(2024, 2, 10));
        assert_eq!((r.start, r.end), (d(2023, 10, 1), d(2023, 12, 31)));
        let r = parse("last quarter", d(2024, 8, 10));
        assert_eq!((r.start, r.end), (d(2024, 4, 1), d(2024, 6, 30)));
    }

    #[test]
    fn test_week_phrases() {
        // 2024-06-13 is a Thursday
        let today = d(2024, 6, 13);
        let r = parse("trips last week", today);
        assert_eq!((r.start, r.end), (d(2024, 6, 6), d(2024, 6, 12)));
        assert_eq!(r.num_days(), 7);
        assert_eq!(r.period_type, PeriodType::Weekly);

        let r = parse("this week", today);
        assert_eq!((r.start, r.end), (d(2024, 6, 10), today));
        assert_eq!(r.start.weekday(), Weekday::Mon);
    }

    #[test]
    fn test_month_and_year_phrases() {
        let today = d(2024, 1, 20);
        let r = parse("last month", today);
        assert_eq!((r.start, r.end), (d(2023, 12, 1), d(2023, 12, 31)));
        let r = parse("this month", today);
        assert_eq!((r.start, r.end), (d(2024, 1, 1), today));
        let r = parse("previous year", today);
        assert_eq!((r.start, r.end), (d(2023, 1, 1), d(2023, 12, 31)));
        let r = parse("current year", today);
        assert_eq!((r.start, r.end), (d(2024, 1, 1), today));
        assert_eq!(r.period_type, PeriodType::Yearly);
    }

    #[test]
    fn test_no_match() {
        assert_eq!(parse_expression("how are things", d(2024, 1, 20)), None);
        assert_eq!(parse_expression("", d(2024, 1, 20)), None);
        // month abbreviations only match whole words
        assert_eq!(parse_expression("summary 2024", d(2024, 1, 20)), None);
    }
}
