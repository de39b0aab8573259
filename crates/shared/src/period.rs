//! Calendar period resolution for analytics aggregation.
//!
//! A period is determined by a [`PeriodType`] and a reference instant, and is
//! aligned to calendar boundaries in UTC. The end bound is inclusive at
//! millisecond precision, so a daily period spans
//! `[00:00:00.000, 23:59:59.999]`.

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Aggregation bucket size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PeriodType {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl PeriodType {
    /// Database representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodType::Daily => "DAILY",
            PeriodType::Weekly => "WEEKLY",
            PeriodType::Monthly => "MONTHLY",
            PeriodType::Yearly => "YEARLY",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "DAILY" => Some(PeriodType::Daily),
            "WEEKLY" => Some(PeriodType::Weekly),
            "MONTHLY" => Some(PeriodType::Monthly),
            "YEARLY" => Some(PeriodType::Yearly),
            _ => None,
        }
    }
}

impl std::fmt::Display for PeriodType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A resolved `[start, end]` aggregation window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Period {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Resolves the calendar period containing `reference`.
///
/// Weekly periods are ISO weeks (Monday through Sunday). Monthly and yearly
/// periods cover the whole calendar month/year.
pub fn resolve_period(period_type: PeriodType, reference: DateTime<Utc>) -> Period {
    let date = reference.date_naive();
    let (start_date, next_start_date) = match period_type {
        PeriodType::Daily => (date, date + Duration::days(1)),
        PeriodType::Weekly => {
            let monday = date - Duration::days(date.weekday().num_days_from_monday() as i64);
            (monday, monday + Duration::days(7))
        }
        PeriodType::Monthly => {
            let first = first_of_month(date.year(), date.month());
            let next = if date.month() == 12 {
                first_of_month(date.year() + 1, 1)
            } else {
                first_of_month(date.year(), date.month() + 1)
            };
            (first, next)
        }
        PeriodType::Yearly => (
            first_of_month(date.year(), 1),
            first_of_month(date.year() + 1, 1),
        ),
    };

    let start = start_of_day(start_date);
    let end = start_of_day(next_start_date) - Duration::milliseconds(1);
    Period { start, end }
}

fn first_of_month(year: i32, month: u32) -> NaiveDate {
    // Month is always 1..=12 here.
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MIN)
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn test_daily_period_spans_calendar_day() {
        let p = resolve_period(PeriodType::Daily, at(2025, 3, 10, 14, 22));
        assert_eq!(p.start, at(2025, 3, 10, 0, 0));
        assert_eq!(p.end, at(2025, 3, 10, 23, 59) + Duration::seconds(59) + Duration::milliseconds(999));
        assert!(p.end > p.start);
    }

    #[test]
    fn test_weekly_period_starts_monday() {
        // 2025-03-12 is a Wednesday; its ISO week starts Monday 2025-03-10.
        let p = resolve_period(PeriodType::Weekly, at(2025, 3, 12, 8, 0));
        assert_eq!(p.start, at(2025, 3, 10, 0, 0));
        assert_eq!(p.end.date_naive(), NaiveDate::from_ymd_opt(2025, 3, 16).unwrap());
    }

    #[test]
    fn test_weekly_period_on_monday_and_sunday() {
        let monday = resolve_period(PeriodType::Weekly, at(2025, 3, 10, 0, 0));
        assert_eq!(monday.start, at(2025, 3, 10, 0, 0));
        let sunday = resolve_period(PeriodType::Weekly, at(2025, 3, 16, 23, 0));
        assert_eq!(sunday.start, at(2025, 3, 10, 0, 0));
    }

    #[test]
    fn test_monthly_period_spans_whole_month() {
        let p = resolve_period(PeriodType::Monthly, at(2025, 3, 10, 14, 22));
        assert_eq!(p.start, at(2025, 3, 1, 0, 0));
        assert_eq!(p.end.date_naive(), NaiveDate::from_ymd_opt(2025, 3, 31).unwrap());
        assert_eq!(p.end.hour(), 23);
        assert_eq!(p.end.minute(), 59);
    }

    #[test]
    fn test_monthly_period_december_rolls_year() {
        let p = resolve_period(PeriodType::Monthly, at(2024, 12, 25, 1, 0));
        assert_eq!(p.start, at(2024, 12, 1, 0, 0));
        assert_eq!(p.end.date_naive(), NaiveDate::from_ymd_opt(2024, 12, 31).unwrap());
    }

    #[test]
    fn test_monthly_period_leap_february() {
        let p = resolve_period(PeriodType::Monthly, at(2024, 2, 15, 0, 0));
        assert_eq!(p.end.date_naive(), NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
    }

    #[test]
    fn test_yearly_period() {
        let p = resolve_period(PeriodType::Yearly, at(2025, 6, 1, 12, 0));
        assert_eq!(p.start, at(2025, 1, 1, 0, 0));
        assert_eq!(p.end.date_naive(), NaiveDate::from_ymd_opt(2025, 12, 31).unwrap());
    }

    #[test]
    fn test_period_type_round_trip() {
        for pt in [
            PeriodType::Daily,
            PeriodType::Weekly,
            PeriodType::Monthly,
            PeriodType::Yearly,
        ] {
            assert_eq!(PeriodType::parse(pt.as_str()), Some(pt));
        }
        assert_eq!(PeriodType::parse("HOURLY"), None);
    }

    #[test]
    fn test_period_type_serde_uppercase() {
        let json = serde_json::to_string(&PeriodType::Daily).unwrap();
        assert_eq!(json, "\"DAILY\"");
        let parsed: PeriodType = serde_json::from_str("\"WEEKLY\"").unwrap();
        assert_eq!(parsed, PeriodType::Weekly);
    }
}
