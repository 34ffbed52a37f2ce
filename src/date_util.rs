use chrono::{Datelike, Days, NaiveDate};

/// Get the last day of a given month.
///
/// Computed as the first day of the following month minus one day, so
/// December rolls into January of the next year.
pub fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    next.pred_opt()
}

/// First and last day of a calendar month.
pub fn month_bounds(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    Some((
        NaiveDate::from_ymd_opt(year, month, 1)?,
        last_day_of_month(year, month)?,
    ))
}

/// Get the quarter (1-4) for a given date.
pub fn quarter_of(d: NaiveDate) -> u8 {
    ((d.month() - 1) / 3 + 1) as u8
}

/// The Monday on or before `d`.
pub fn week_start(d: NaiveDate) -> NaiveDate {
    d - Days::new(u64::from(d.weekday().num_days_from_monday()))
}

/// Same month and day `years` calendar years earlier. Feb 29 falls back to
/// the last day of February when the target year is not a leap year.
pub fn years_before(d: NaiveDate, years: u32) -> Option<NaiveDate> {
    let year = d.year().checked_sub(i32::try_from(years).ok()?)?;
    NaiveDate::from_ymd_opt(year, d.month(), d.day())
        .or_else(|| last_day_of_month(year, d.month()))
}

/// Strip markdown code fences from LLM responses.
pub fn strip_code_fences(s: &str) -> &str {
    let s = s.trim();
    if let Some(rest) = s.strip_prefix("```json") {
        rest.strip_suffix("```").unwrap_or(rest).trim()
    } else if let Some(rest) = s.strip_prefix("```") {
        rest.strip_suffix("```").unwrap_or(rest).trim()
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_last_day_of_month() {
        assert_eq!(last_day_of_month(2025, 1), Some(d(2025, 1, 31)));
        assert_eq!(last_day_of_month(2025, 2), Some(d(2025, 2, 28)));
        assert_eq!(last_day_of_month(2024, 2), Some(d(2024, 2, 29))); // Leap year
        assert_eq!(last_day_of_month(2025, 12), Some(d(2025, 12, 31)));
        assert_eq!(last_day_of_month(2025, 13), None);
    }

    #[test]
    fn test_quarter_of() {
        assert_eq!(quarter_of(d(2025, 1, 15)), 1);
        assert_eq!(quarter_of(d(2025, 3, 31)), 1);
        assert_eq!(quarter_of(d(2025, 4, 1)), 2);
        assert_eq!(quarter_of(d(2025, 6, 30)), 2);
        assert_eq!(quarter_of(d(2025, 7, 1)), 3);
        assert_eq!(quarter_of(d(2025, 12, 31)), 4);
    }

    #[test]
    fn test_week_start() {
        // 2024-06-13 is a Thursday
        let monday = week_start(d(2024, 6, 13));
        assert_eq!(monday, d(2024, 6, 10));
        assert_eq!(monday.weekday(), Weekday::Mon);
        assert_eq!(week_start(d(2024, 6, 10)), d(2024, 6, 10));
        // Sunday belongs to the week that started six days earlier
        assert_eq!(week_start(d(2024, 6, 16)), d(2024, 6, 10));
    }

    #[test]
    fn test_years_before() {
        assert_eq!(years_before(d(2024, 6, 15), 2), Some(d(2022, 6, 15)));
        assert_eq!(years_before(d(2024, 2, 29), 1), Some(d(2023, 2, 28)));
    }

    #[test]
    fn test_strip_code_fences_json() {
        assert_eq!(
            strip_code_fences("```json\n{\"key\": \"value\"}\n```"),
            "{\"key\": \"value\"}"
        );
    }

    #[test]
    fn test_strip_code_fences_plain() {
        assert_eq!(
            strip_code_fences("```\n{\"key\": \"value\"}\n```"),
            "{\"key\": \"value\"}"
        );
    }

    #[test]
    fn test_strip_code_fences_none() {
        assert_eq!(strip_code_fences("  {}  "), "{}");
    }
}
