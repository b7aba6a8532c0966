//! Calendar range math: week alignment and the enumeration of expected
//! range-ids per tier. Weeks start on Monday for the whole run; the first
//! window is the Monday on or before the first manifest date.

use chrono::{Datelike, Days, NaiveDate};

/// The Monday on or before the given date.
pub fn align_to_week_start(date: NaiveDate) -> NaiveDate {
    let offset = date.weekday().num_days_from_monday() as u64;
    date.checked_sub_days(Days::new(offset))
        .expect("date underflow aligning to Monday")
}

/// Week-start dates of every 7-day window touching `[first, last]`.
pub fn week_windows(first: NaiveDate, last: NaiveDate) -> Vec<NaiveDate> {
    let mut windows = Vec::new();
    let mut cursor = align_to_week_start(first);
    while cursor <= last {
        windows.push(cursor);
        cursor = cursor
            .checked_add_days(Days::new(7))
            .expect("date overflow enumerating weeks");
    }
    windows
}

/// `YYYY-MM` of a date.
pub fn month_id(date: NaiveDate) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}

/// `YYYY-QN` of a `YYYY-MM` month id. Returns `None` for malformed input.
pub fn quarter_id(month: &str) -> Option<String> {
    let (year, m) = month.split_once('-')?;
    let m: u32 = m.parse().ok()?;
    if year.len() != 4 || year.parse::<u32>().is_err() || !(1..=12).contains(&m) {
        return None;
    }
    Some(format!("{year}-Q{}", (m - 1) / 3 + 1))
}

/// Distinct months owning the given week windows, ascending. A week belongs
/// to the month its start date is in, so this is exactly the monthly tier's
/// expected range-id set.
pub fn months_for_weeks(week_starts: &[NaiveDate]) -> Vec<String> {
    let mut months: Vec<String> = week_starts.iter().map(|ws| month_id(*ws)).collect();
    months.dedup();
    months
}

/// Distinct quarters owning the given months, ascending.
pub fn quarters_for_months(months: &[String]) -> Vec<String> {
    let mut quarters: Vec<String> = months
        .iter()
        .filter_map(|m| quarter_id(m))
        .collect();
    quarters.dedup();
    quarters
}

/// Parse a weekly range-id back into its week-start date.
pub fn parse_week_start(range_id: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(range_id, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn monday_aligns_to_itself() {
        assert_eq!(align_to_week_start(d(2025, 3, 3)), d(2025, 3, 3));
    }

    #[test]
    fn midweek_aligns_back_to_monday() {
        assert_eq!(align_to_week_start(d(2025, 3, 5)), d(2025, 3, 3));
        assert_eq!(align_to_week_start(d(2025, 3, 9)), d(2025, 3, 3));
    }

    #[test]
    fn saturday_first_date_aligns_into_prior_month() {
        // 2025-03-01 is a Saturday; its week starts 2025-02-24.
        assert_eq!(align_to_week_start(d(2025, 3, 1)), d(2025, 2, 24));
    }

    #[test]
    fn single_week_range_yields_one_window() {
        let windows = week_windows(d(2025, 3, 3), d(2025, 3, 5));
        assert_eq!(windows, vec![d(2025, 3, 3)]);
    }

    #[test]
    fn windows_step_by_seven_and_cover_the_last_date() {
        let windows = week_windows(d(2025, 3, 3), d(2025, 3, 17));
        assert_eq!(windows, vec![d(2025, 3, 3), d(2025, 3, 10), d(2025, 3, 17)]);
    }

    #[test]
    fn month_and_quarter_ids() {
        assert_eq!(month_id(d(2025, 3, 31)), "2025-03");
        assert_eq!(quarter_id("2025-03").as_deref(), Some("2025-Q1"));
        assert_eq!(quarter_id("2025-04").as_deref(), Some("2025-Q2"));
        assert_eq!(quarter_id("2024-12").as_deref(), Some("2024-Q4"));
        assert_eq!(quarter_id("2024-13"), None);
        assert_eq!(quarter_id("garbage"), None);
    }

    #[test]
    fn months_for_weeks_dedups_in_order() {
        let weeks = week_windows(d(2025, 2, 24), d(2025, 3, 17));
        let months = months_for_weeks(&weeks);
        assert_eq!(months, vec!["2025-02".to_string(), "2025-03".into()]);
    }

    #[test]
    fn quarters_for_months_dedups_in_order() {
        let months = vec![
            "2025-02".to_string(),
            "2025-03".into(),
            "2025-04".into(),
        ];
        assert_eq!(
            quarters_for_months(&months),
            vec!["2025-Q1".to_string(), "2025-Q2".into()]
        );
    }

    #[test]
    fn two_year_span_produces_eight_quarters() {
        let weeks = week_windows(d(2024, 1, 1), d(2025, 12, 28));
        let quarters = quarters_for_months(&months_for_weeks(&weeks));
        assert_eq!(quarters.len(), 8);
        assert_eq!(quarters.first().map(String::as_str), Some("2024-Q1"));
        assert_eq!(quarters.last().map(String::as_str), Some("2025-Q4"));
    }

    #[test]
    fn week_range_id_round_trips() {
        let ws = d(2025, 3, 3);
        assert_eq!(parse_week_start("2025-03-03"), Some(ws));
        assert_eq!(parse_week_start("not-a-date"), None);
    }
}
