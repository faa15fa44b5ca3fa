//! Timestamp conversions shared by the service adapters.

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};

/// Convert Runtastic's epoch milliseconds to a UTC instant.
pub fn from_epoch_millis(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}

/// Parse a Strava `start_date`.
///
/// Accepts RFC 3339 (`2024-05-01T07:00:05Z`) and, leniently, a naive
/// `YYYY-MM-DDTHH:MM:SS` which is taken as UTC.
pub fn parse_start_date(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Some(ndt.and_utc());
    }
    None
}

/// Format an instant the way GPX expects it.
pub fn gpx_time(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}
