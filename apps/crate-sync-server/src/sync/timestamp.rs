//! Timestamp normalization and cursor handling
//!
//! Every stored `ts` uses one textual profile, `YYYY-MM-DDTHH:MM:SSZ`, so a
//! cursor handed out by a pull can be sent back verbatim on the next pull.

use chrono::{DateTime, Duration, NaiveDateTime, SubsecRound, Timelike, Utc};

use super::types::Change;

/// Profile of every timestamp the server emits
pub const CURSOR_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Secondary input format accepted on push, read as UTC
const SQL_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Render an instant in the cursor profile.
pub fn format_cursor(ts: DateTime<Utc>) -> String {
    ts.format(CURSOR_FORMAT).to_string()
}

/// Parse an RFC 3339 timestamp (any offset, optional fraction) into UTC.
///
/// This is the only format accepted for cursors.
pub fn parse_cursor(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

/// Parse a pushed timestamp: RFC 3339, or `YYYY-MM-DD HH:MM:SS` taken as UTC.
pub fn parse_pushed(raw: &str) -> Option<DateTime<Utc>> {
    parse_cursor(raw).or_else(|| {
        NaiveDateTime::parse_from_str(raw, SQL_DATETIME_FORMAT)
            .ok()
            .map(|naive| naive.and_utc())
    })
}

/// Resolve a pushed `ts` to a whole-second UTC instant, falling back to `now`.
pub fn normalize_instant(raw: &str, now: DateTime<Utc>) -> DateTime<Utc> {
    let ts = if raw.is_empty() {
        now
    } else {
        parse_pushed(raw).unwrap_or(now)
    };
    ts.trunc_subsecs(0)
}

/// Rewrite a pushed `ts` into the cursor profile.
pub fn normalize_ts(raw: &str, now: DateTime<Utc>) -> String {
    format_cursor(normalize_instant(raw, now))
}

/// Normalize the `ts` of every change in a batch against a single `now`.
///
/// No other field is touched.
pub fn normalize_batch(mut changes: Vec<Change>, now: DateTime<Utc>) -> Vec<Change> {
    for change in &mut changes {
        change.ts = normalize_ts(&change.ts, now);
    }
    changes
}

/// Smallest whole second at or after `ts`.
///
/// Stored timestamps are whole seconds, so `stored >= ts` holds exactly when
/// `stored >= ceil_to_second(ts)`. Text comparisons rely on this.
pub fn ceil_to_second(ts: DateTime<Utc>) -> DateTime<Utc> {
    if ts.nanosecond() == 0 {
        ts
    } else {
        ts.trunc_subsecs(0) + Duration::seconds(1)
    }
}
