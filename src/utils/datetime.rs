//! Date/time helpers
//!
//! The Azure SDK reports times as `time::OffsetDateTime`; the rest of the
//! crate works in `chrono::DateTime<Utc>`.

use chrono::{DateTime, Duration, Utc};
use time::OffsetDateTime;

/// Convert an SDK timestamp to UTC, keeping sub-second precision
pub fn offset_to_utc(value: OffsetDateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(value.unix_timestamp(), value.nanosecond())
}

/// Human readable age, e.g. "40d 3h"
pub fn format_age(now: DateTime<Utc>, then: DateTime<Utc>) -> String {
    let age = now.signed_duration_since(then);
    if age < Duration::zero() {
        return "in the future".to_string();
    }

    let days = age.num_days();
    let hours = age.num_hours() - days * 24;
    if days > 0 {
        format!("{}d {}h", days, hours)
    } else {
        let minutes = age.num_minutes() - age.num_hours() * 60;
        format!("{}h {}m", hours, minutes)
    }
}
