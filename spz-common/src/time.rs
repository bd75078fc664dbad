//! Timestamp utilities

use chrono::{DateTime, NaiveDate, Utc};

/// Convert milliseconds to duration
pub fn millis_to_duration(millis: u64) -> std::time::Duration {
    std::time::Duration::from_millis(millis)
}

/// Calendar day (UTC) of a timestamp
pub fn day_of(timestamp: DateTime<Utc>) -> NaiveDate {
    timestamp.date_naive()
}
