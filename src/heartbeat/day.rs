//! UTC calendar-day bucketing.
//!
//! A heartbeat is keyed by the UTC calendar day of the instant it was logged.
//! The day is computed with plain epoch arithmetic so the observer's offset
//! (or locale) never leaks into the bucket.

use std::fmt;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

const SECONDS_PER_DAY: i64 = 86_400;

/// `NaiveDate::num_days_from_ce()` of 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i64 = 719_163;

/// A UTC calendar day. Serializes as `YYYY-MM-DD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HeartbeatDay(NaiveDate);

impl HeartbeatDay {
    /// Truncate an instant in any timezone to its UTC midnight.
    pub fn of<Tz: TimeZone>(instant: &DateTime<Tz>) -> Self {
        let days = instant.timestamp().div_euclid(SECONDS_PER_DAY);
        let date = i32::try_from(UNIX_EPOCH_DAYS_FROM_CE + days)
            .ok()
            .and_then(NaiveDate::from_num_days_from_ce_opt)
            // Only reachable at the edges of chrono's range.
            .unwrap_or_else(|| instant.with_timezone(&Utc).date_naive());
        Self(date)
    }

    /// Build a day from a calendar date. Returns `None` for invalid dates.
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self)
    }

}

impl fmt::Display for HeartbeatDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn at(rfc3339: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(rfc3339).unwrap()
    }

    #[test]
    fn test_utc_instant_maps_to_same_date() {
        let day = HeartbeatDay::of(&at("2021-11-01T12:00:00Z"));
        assert_eq!(day, HeartbeatDay::from_ymd(2021, 11, 1).unwrap());
    }

    #[test]
    fn test_negative_offset_evening_rolls_to_next_utc_day() {
        // 23:00 in New York (EDT, -04:00) is 03:00 UTC the next day.
        let day = HeartbeatDay::of(&at("2021-11-01T23:00:00-04:00"));
        assert_eq!(day.to_string(), "2021-11-02");
    }

    #[test]
    fn test_positive_offset_morning_rolls_to_previous_utc_day() {
        let day = HeartbeatDay::of(&at("2021-11-02T01:00:00+09:00"));
        assert_eq!(day.to_string(), "2021-11-01");
    }

    #[test]
    fn test_midnight_boundary() {
        let before = HeartbeatDay::of(&at("2021-12-31T23:59:59Z"));
        let after = HeartbeatDay::of(&at("2022-01-01T00:00:00Z"));
        assert_eq!(before.to_string(), "2021-12-31");
        assert_eq!(after.to_string(), "2022-01-01");
        assert_eq!(HeartbeatDay::from_ymd(2022, 1, 1), Some(after));
        assert!(before < after);
    }

    #[test]
    fn test_pre_epoch_instant() {
        let day = HeartbeatDay::of(&at("1969-12-31T23:59:59Z"));
        assert_eq!(day.to_string(), "1969-12-31");
    }

    #[test]
    fn test_serializes_as_iso_date() {
        let day = HeartbeatDay::from_ymd(2021, 3, 7).unwrap();
        assert_eq!(serde_json::to_string(&day).unwrap(), "\"2021-03-07\"");
        let parsed: HeartbeatDay = serde_json::from_str("\"2021-03-07\"").unwrap();
        assert_eq!(parsed, day);
    }
}
