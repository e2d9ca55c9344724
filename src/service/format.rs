//! Human-readable dates and times for notification texts.

use chrono::{DateTime, Datelike, NaiveDate, Utc};

/// Formats a date as `January 8th, 2030`.
#[must_use]
pub fn format_session_date(date: NaiveDate) -> String {
    let day = date.day();
    let suffix = match (day % 10, day % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{} {day}{suffix}, {}", date.format("%B"), date.year())
}

/// Formats a time of day as `01:00 PM`.
#[must_use]
pub fn format_time(ts: DateTime<Utc>) -> String {
    ts.format("%I:%M %p").to_string()
}
