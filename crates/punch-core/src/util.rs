//! Shared utility functions used across multiple modules.

use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime, SubsecRound};

/// Storage and display format for full timestamps.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// Format for calendar dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";
/// Format for wall-clock times.
pub const TIME_FORMAT: &str = "%H:%M:%S";

/// Normalize optional text by trimming whitespace and removing empties.
///
/// Returns `None` when the input is `None` or the trimmed value is empty.
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    let value = value?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Check if a string starts with `http://` or `https://`.
pub fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

/// Drop sub-second precision; sessions are compared and serialized per second.
pub fn truncate_to_seconds(timestamp: NaiveDateTime) -> NaiveDateTime {
    timestamp.trunc_subsecs(0)
}

/// Current local wall-clock time at second precision.
pub fn now() -> NaiveDateTime {
    truncate_to_seconds(Local::now().naive_local())
}

/// Midnight at the start of the given date.
pub fn start_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

/// Format a timestamp with [`TIMESTAMP_FORMAT`].
pub fn format_timestamp(timestamp: NaiveDateTime) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a timestamp written with [`TIMESTAMP_FORMAT`].
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value.trim(), TIMESTAMP_FORMAT).ok()
}
