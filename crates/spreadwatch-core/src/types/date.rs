//! Date type for settlement and maturity arithmetic.

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, CoreResult};

/// Formats accepted by [`Date::parse`], tried in order.
const PARSE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y%m%d", "%m/%d/%Y"];

/// A calendar date.
///
/// Newtype over `chrono::NaiveDate` carrying the handful of operations the
/// spread engine needs: business-day rolls for settlement, month rolls for
/// coupon schedules, and day counts for year fractions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Date(NaiveDate);

impl Date {
    /// Creates a new date from year, month, and day.
    pub fn from_ymd(year: i32, month: u32, day: u32) -> CoreResult<Self> {
        NaiveDate::from_ymd_opt(year, month, day)
            .map(Date)
            .ok_or_else(|| CoreError::invalid_date(format!("{year}-{month:02}-{day:02}")))
    }

    /// Parses a date from `YYYY-MM-DD`, `YYYYMMDD` or `MM/DD/YYYY`.
    pub fn parse(s: &str) -> CoreResult<Self> {
        let trimmed = s.trim();
        PARSE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
            .map(Date)
            .ok_or_else(|| CoreError::invalid_date(format!("Cannot parse: {s}")))
    }

    /// Returns today's date in local time.
    pub fn today() -> Self {
        Date(chrono::Local::now().date_naive())
    }

    /// Returns the year component.
    pub fn year(&self) -> i32 {
        self.0.year()
    }

    /// Returns the month component (1-12).
    pub fn month(&self) -> u32 {
        self.0.month()
    }

    /// Returns the day component (1-31).
    pub fn day(&self) -> u32 {
        self.0.day()
    }

    /// Adds a number of calendar days.
    pub fn add_days(&self, days: i64) -> Self {
        Date(self.0 + chrono::Duration::days(days))
    }

    /// Adds a number of months, clamping the day to the end of the target month.
    pub fn add_months(&self, months: i32) -> CoreResult<Self> {
        let total_months = self.year() * 12 + self.month() as i32 - 1 + months;
        let new_year = total_months.div_euclid(12);
        let new_month = (total_months.rem_euclid(12) + 1) as u32;
        let new_day = self.day().min(days_in_month(new_year, new_month));

        Self::from_ymd(new_year, new_month, new_day)
    }

    /// Number of calendar days from `self` to `other` (negative if `other` is earlier).
    pub fn days_between(&self, other: &Date) -> i64 {
        (other.0 - self.0).num_days()
    }

    /// Returns the day of week.
    pub fn weekday(&self) -> Weekday {
        self.0.weekday()
    }

    /// Checks if the date is a Saturday or Sunday.
    pub fn is_weekend(&self) -> bool {
        matches!(self.weekday(), Weekday::Sat | Weekday::Sun)
    }

    /// Checks if the date is Monday through Friday.
    pub fn is_weekday(&self) -> bool {
        !self.is_weekend()
    }

    /// Adds business days (weekdays only). Negative values move backward.
    pub fn add_business_days(&self, days: i32) -> Self {
        if days == 0 {
            return *self;
        }

        let direction = if days > 0 { 1i64 } else { -1i64 };
        let mut remaining = days.abs();
        let mut current = *self;

        while remaining > 0 {
            current = current.add_days(direction);
            if current.is_weekday() {
                remaining -= 1;
            }
        }

        current
    }

    /// Returns the underlying `NaiveDate`.
    pub fn as_naive_date(&self) -> NaiveDate {
        self.0
    }
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl From<NaiveDate> for Date {
    fn from(date: NaiveDate) -> Self {
        Date(date)
    }
}

impl From<Date> for NaiveDate {
    fn from(date: Date) -> Self {
        date.0
    }
}

fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if NaiveDate::from_ymd_opt(year, 2, 29).is_some() => 29,
        _ => 28,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> Date {
        Date::from_ymd(y, m, d).unwrap()
    }

    #[test]
    fn test_invalid_date() {
        assert!(Date::from_ymd(2025, 2, 30).is_err());
        assert!(Date::from_ymd(2025, 13, 1).is_err());
    }

    #[test]
    fn test_parse_formats() {
        assert_eq!(Date::parse("2030-01-01").unwrap(), date(2030, 1, 1));
        assert_eq!(Date::parse("20300101").unwrap(), date(2030, 1, 1));
        assert_eq!(Date::parse("01/01/2030").unwrap(), date(2030, 1, 1));
        assert_eq!(Date::parse(" 2030-01-01 ").unwrap(), date(2030, 1, 1));
        assert!(Date::parse("NULL").is_err());
        assert!(Date::parse("").is_err());
    }

    #[test]
    fn test_add_months_clamps_day() {
        assert_eq!(date(2024, 1, 31).add_months(1).unwrap(), date(2024, 2, 29));
        assert_eq!(date(2025, 8, 31).add_months(-6).unwrap(), date(2025, 2, 28));
        assert_eq!(date(2025, 3, 15).add_months(-3).unwrap(), date(2024, 12, 15));
    }

    #[test]
    fn test_add_business_days_skips_weekend() {
        // Friday + 1 business day = Monday
        assert_eq!(date(2025, 6, 13).add_business_days(1), date(2025, 6, 16));
        // Monday - 1 business day = Friday
        assert_eq!(date(2025, 6, 16).add_business_days(-1), date(2025, 6, 13));
        assert_eq!(date(2025, 6, 16).add_business_days(0), date(2025, 6, 16));
    }

    #[test]
    fn test_days_between() {
        assert_eq!(date(2025, 1, 1).days_between(&date(2025, 12, 31)), 364);
        assert_eq!(date(2025, 12, 31).days_between(&date(2025, 1, 1)), -364);
    }

    #[test]
    fn test_serde_is_transparent() {
        let json = serde_json::to_string(&date(2030, 1, 1)).unwrap();
        assert_eq!(json, "\"2030-01-01\"");
    }
}
