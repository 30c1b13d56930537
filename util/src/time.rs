//! General time utility functions

use chrono;

/// Number of nanoseconds in a second
pub const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Convert a duration into a number of seconds, or `None` if overflow
pub fn duration_to_secs(duration: chrono::Duration) -> Option<f64> {
    duration
        .num_nanoseconds()
        .map(|ns| ns as f64 / NANOS_PER_SECOND as f64)
}

/// Convert a number of seconds into a duration, rounded to the nearest nanosecond.
pub fn secs_to_duration(secs: f64) -> chrono::Duration {
    chrono::Duration::nanoseconds((secs * NANOS_PER_SECOND as f64).round() as i64)
}
