//! Date arithmetic helpers for the dispute timeline rules

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};

/// Start of the calendar month containing `now` (UTC).
pub fn month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .expect("first of month is always a valid timestamp")
}

/// Days remaining until `deadline`, rounded up. Zero when the deadline has
/// passed. A deadline 1 second away still counts as 1 day.
pub fn days_until_ceil(now: DateTime<Utc>, deadline: DateTime<Utc>) -> i64 {
    let remaining = deadline - now;
    if remaining <= Duration::zero() {
        return 0;
    }
    let secs = remaining.num_seconds();
    (secs + 86_399) / 86_400
}

/// End of the calendar day containing `now` (UTC, 23:59:59).
pub fn end_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(now.year(), now.month(), now.day(), 23, 59, 59)
        .single()
        .expect("end of day is always a valid timestamp")
}
