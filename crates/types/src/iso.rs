//! Compact ISO timestamps as stored in content fields

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

const COMPACT_FORMAT: &str = "%Y%m%dT%H%M%S";

/// Format a timestamp as `yyyyMMddTHHmmssZ`
#[must_use]
pub fn format(timestamp: DateTime<Utc>) -> String {
    format!("{}Z", timestamp.format(COMPACT_FORMAT))
}

/// Parse a compact (`20240131T101500Z`) or RFC 3339 timestamp
///
/// A compact value without the trailing `Z` is read as UTC.
#[must_use]
pub fn parse(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    let compact = value.strip_suffix('Z').unwrap_or(value);
    if let Ok(naive) = NaiveDateTime::parse_from_str(compact, COMPACT_FORMAT) {
        return Some(naive.and_utc());
    }
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// RFC 3339 rendering used in log fields
#[must_use]
pub fn to_rfc3339(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
}
