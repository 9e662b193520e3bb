//! Timestamp encoding shared by the store and the polling endpoint
//!
//! Stored timestamps are fixed-width UTC strings with microsecond precision,
//! so comparing them as text in SQL gives the same order as comparing times.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

/// Format a timestamp for storage
pub fn encode(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a timestamp previously written by [`encode`]
pub fn decode(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Current time truncated to what storage keeps
pub fn now() -> DateTime<Utc> {
    let now = Utc::now();
    decode(&encode(now)).unwrap_or(now)
}

/// Parse an ISO 8601 timestamp supplied by a client.
///
/// Accepts RFC 3339 with an offset, naive date-times (taken as UTC) with a
/// `T` or space separator, and bare dates.
pub fn parse_client(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Some(ts) = decode(raw) {
        return Some(ts);
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
