//! Timestamp formats used in artifacts

use chrono::{DateTime, Local, Utc};

/// ISO-8601 UTC, second precision, no fractional seconds
#[must_use]
pub fn utc_iso_seconds(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Current time in [`utc_iso_seconds`] form
#[must_use]
pub fn now_utc_iso() -> String {
    utc_iso_seconds(Utc::now())
}

/// Wall-clock run id (`YYYYMMDD-HHMMSS`, local time)
#[must_use]
pub fn local_run_id(at: DateTime<Local>) -> String {
    at.format("%Y%m%d-%H%M%S").to_string()
}

/// Seconds since the Unix epoch
#[must_use]
pub fn epoch_seconds() -> i64 {
    Utc::now().timestamp()
}
