//! Caller-supplied time. The engine never reads a clock; every entry point
//! takes `now` explicitly so resolution stays deterministic.

use chrono::{DateTime, Duration, Utc};

pub type Timestamp = DateTime<Utc>;

/// Seconds (fractional) to a chrono duration, millisecond precision.
/// Negative and NaN inputs become zero; values past chrono's range
/// saturate at `Duration::MAX`.
pub fn secs(value: f64) -> Duration {
    if value.is_nan() || value <= 0.0 {
        return Duration::zero();
    }
    // float-to-int casts saturate, so infinity lands on i64::MAX
    let millis = (value * 1000.0).round() as i64;
    Duration::try_milliseconds(millis).unwrap_or(Duration::MAX)
}

/// `at + duration`, pinned to the last representable instant instead of
/// overflowing.
pub fn saturating_add(at: Timestamp, duration: Duration) -> Timestamp {
    at.checked_add_signed(duration)
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// `at` plus fractional seconds, see [`secs`] and [`saturating_add`].
pub fn after_secs(at: Timestamp, value: f64) -> Timestamp {
    saturating_add(at, secs(value))
}

/// Signed seconds from `earlier` to `later`.
pub fn seconds_between(earlier: Timestamp, later: Timestamp) -> f64 {
    later.signed_duration_since(earlier).num_milliseconds() as f64 / 1000.0
}
