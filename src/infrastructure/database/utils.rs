//! Storage-boundary helpers.
//!
//! Timestamps are unix seconds in the database and `DateTime<Utc>` inside
//! the core; the conversion happens here and nowhere else.

use chrono::{DateTime, TimeZone, Utc};

/// `DateTime<Utc>` to stored unix seconds.
pub fn to_unix(dt: DateTime<Utc>) -> i64 {
    dt.timestamp()
}

/// Stored unix seconds back to `DateTime<Utc>`. Out-of-range values clamp
/// to the epoch rather than poisoning a whole row read.
pub fn from_unix(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .unwrap_or_else(|| Utc.timestamp_opt(0, 0).single().unwrap_or_default())
}
