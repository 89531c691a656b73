//! Fixed-window arithmetic
//!
//! Two schemes coexist. Hourly windows open at the first call and last one
//! hour. Daily windows are calendar days in UTC. Neither slides, so a burst
//! straddling a boundary can reach twice the limit.

use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::store::RateLimitRecord;

/// Window a rate limit counter is kept over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowScheme {
    /// One hour from the first call in the window
    Hourly,
    /// One UTC calendar day
    Daily,
}

impl WindowScheme {
    /// Length of one window
    pub fn length(&self) -> Duration {
        match self {
            WindowScheme::Hourly => Duration::hours(1),
            WindowScheme::Daily => Duration::days(1),
        }
    }

    /// Window start for a fresh record written at `now`
    pub fn start_for(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            WindowScheme::Hourly => now,
            WindowScheme::Daily => day_start(now),
        }
    }

    /// Whether a window opened at `window_start` is still open at `now`
    pub fn is_current(&self, window_start: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match self {
            WindowScheme::Hourly => now - window_start < self.length(),
            WindowScheme::Daily => window_start == day_start(now),
        }
    }

    /// When a window opened at `window_start` closes
    pub fn reset_at(&self, window_start: DateTime<Utc>) -> DateTime<Utc> {
        window_start + self.length()
    }

    /// Lowercase name for messages
    pub fn as_str(&self) -> &'static str {
        match self {
            WindowScheme::Hourly => "hourly",
            WindowScheme::Daily => "daily",
        }
    }
}

/// 00:00:00 UTC of the day containing `now`
pub fn day_start(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.from_utc_datetime(&now.date_naive().and_time(NaiveTime::MIN))
}

/// Calls counted against the window that is open at `now`
///
/// A record from a closed window counts as zero. Nothing is written; the
/// stored count is replaced only on the next increment.
pub fn effective_count(record: &RateLimitRecord, now: DateTime<Utc>) -> u32 {
    if record.window.is_current(record.window_start, now) {
        record.count
    } else {
        0
    }
}
