//! Timestamp helpers.
//!
//! All timestamps are stored as RFC 3339 UTC strings with millisecond
//! precision (`2024-06-01T10:00:00.000Z`) so that string comparison in SQL
//! matches chronological order.

use chrono::{DateTime, Duration, NaiveDate, SecondsFormat, Utc};

pub fn now() -> String {
    format(Utc::now())
}

pub fn format(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn from_now(offset: Duration) -> String {
    format(Utc::now() + offset)
}

pub fn parse(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|parsed| parsed.with_timezone(&Utc))
}

/// Parse either a full RFC 3339 timestamp or a bare `YYYY-MM-DD` date.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .or_else(|| parse(value).map(|dt| dt.date_naive()))
}

/// Whole days elapsed between `value` and `now`, rounded down.
pub fn days_since(value: &str, now: DateTime<Utc>) -> Option<i64> {
    parse(value).map(|then| (now - then).num_days())
}
