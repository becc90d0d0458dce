//! Time helpers - business timezone conversion
//!
//! Timestamps are stored as UTC Unix millis; calendar questions (which day a
//! ticket belongs to, what "today" is) are answered in the business timezone.

use chrono::{Datelike, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;

/// Business-local calendar date of a Unix millis timestamp
pub fn local_date(millis: i64, tz: Tz) -> NaiveDate {
    match Utc.timestamp_millis_opt(millis).single() {
        Some(utc) => utc.with_timezone(&tz).date_naive(),
        None => NaiveDate::MIN,
    }
}

/// Today in the business timezone
pub fn today(tz: Tz) -> NaiveDate {
    Utc::now().with_timezone(&tz).date_naive()
}

/// First day of a month, `None` for an invalid month
pub fn month_start(year: i32, month: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1)
}

/// The month before `(year, month)`
pub fn previous_month(year: i32, month: u32) -> (i32, u32) {
    if month <= 1 {
        (year - 1, 12)
    } else {
        (year, month - 1)
    }
}

/// `(year, month)` of a date
pub fn year_month(date: NaiveDate) -> (i32, u32) {
    (date.year(), date.month())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_date_crosses_midnight() {
        let tz: Tz = "Europe/Madrid".parse().unwrap();
        // 2025-03-14 23:30 UTC is already 2025-03-15 00:30 in Madrid (UTC+1)
        let millis = Utc
            .with_ymd_and_hms(2025, 3, 14, 23, 30, 0)
            .unwrap()
            .timestamp_millis();
        assert_eq!(local_date(millis, tz), NaiveDate::from_ymd_opt(2025, 3, 15).unwrap());
        assert_eq!(local_date(millis, chrono_tz::UTC), NaiveDate::from_ymd_opt(2025, 3, 14).unwrap());
    }

    #[test]
    fn test_previous_month_wraps_year() {
        assert_eq!(previous_month(2025, 1), (2024, 12));
        assert_eq!(previous_month(2025, 7), (2025, 6));
        assert!(month_start(2025, 13).is_none());
    }
}
