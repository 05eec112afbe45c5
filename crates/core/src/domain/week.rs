use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::errors::{DomainError, WeekBound};

const DAY_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y"];

/// Parses a day-granularity date. Timestamps are truncated to their date part.
pub fn parse_day(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    let day_part = match trimmed.split_once(['T', ' ']) {
        Some((day, _)) => day,
        None => trimmed,
    };

    DAY_FORMATS.iter().find_map(|format| NaiveDate::parse_from_str(day_part, format).ok())
}

/// The week being planned. Both bounds are inclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetWeek {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl TargetWeek {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, DomainError> {
        if end < start {
            return Err(DomainError::InvertedWeekBounds { start, end });
        }
        Ok(Self { start, end })
    }

    /// Validates caller-supplied bounds before any planning work starts.
    pub fn parse(start: Option<&str>, end: Option<&str>) -> Result<Self, DomainError> {
        let start = parse_bound(WeekBound::Start, start)?;
        let end = parse_bound(WeekBound::End, end)?;
        Self::new(start, end)
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// Three weeks centred on the same weekday one year (52 weeks) earlier.
    pub fn year_ago_span(&self) -> (NaiveDate, NaiveDate) {
        let anchor = self.start - Duration::weeks(52);
        (anchor - Duration::weeks(1), anchor + Duration::days(13))
    }

    /// The 52 weeks immediately before the target week.
    pub fn trailing_year_span(&self) -> (NaiveDate, NaiveDate) {
        (self.start - Duration::weeks(52), self.start - Duration::days(1))
    }
}

fn parse_bound(bound: WeekBound, raw: Option<&str>) -> Result<NaiveDate, DomainError> {
    let raw = raw.map(str::trim).filter(|value| !value.is_empty());
    let Some(raw) = raw else {
        return Err(DomainError::MissingWeekBound { bound });
    };

    parse_day(raw).ok_or_else(|| DomainError::InvalidWeekBound { bound, value: raw.to_string() })
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{parse_day, TargetWeek};
    use crate::errors::{DomainError, WeekBound};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid test date")
    }

    #[test]
    fn parses_iso_dates_and_timestamps() {
        assert_eq!(parse_day("2025-03-10"), Some(day(2025, 3, 10)));
        assert_eq!(parse_day(" 2025-03-10T08:15:00Z "), Some(day(2025, 3, 10)));
        assert_eq!(parse_day("2025-03-10 08:15:00"), Some(day(2025, 3, 10)));
        assert_eq!(parse_day("10/03/2025"), Some(day(2025, 3, 10)));
    }

    #[test]
    fn rejects_malformed_dates() {
        assert_eq!(parse_day(""), None);
        assert_eq!(parse_day("2025-02-30"), None);
        assert_eq!(parse_day("next monday"), None);
    }

    #[test]
    fn missing_bounds_are_reported_by_name() {
        let error = TargetWeek::parse(None, Some("2025-03-16")).unwrap_err();
        assert_eq!(error, DomainError::MissingWeekBound { bound: WeekBound::Start });

        let error = TargetWeek::parse(Some("2025-03-10"), Some("   ")).unwrap_err();
        assert_eq!(error, DomainError::MissingWeekBound { bound: WeekBound::End });
    }

    #[test]
    fn unparseable_and_inverted_bounds_are_rejected() {
        let error = TargetWeek::parse(Some("soon"), Some("2025-03-16")).unwrap_err();
        assert!(matches!(error, DomainError::InvalidWeekBound { bound: WeekBound::Start, .. }));

        let error = TargetWeek::parse(Some("2025-03-16"), Some("2025-03-10")).unwrap_err();
        assert!(matches!(error, DomainError::InvertedWeekBounds { .. }));
    }

    #[test]
    fn derived_spans_are_anchored_on_the_target_start() {
        let week = TargetWeek::parse(Some("2025-03-10"), Some("2025-03-16")).unwrap();

        assert_eq!(week.days(), 7);
        assert_eq!(week.year_ago_span(), (day(2024, 3, 4), day(2024, 3, 24)));
        assert_eq!(week.trailing_year_span(), (day(2024, 3, 11), day(2025, 3, 9)));
    }
}
