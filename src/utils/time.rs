/*!
 * Conversions between the protocol's millisecond fields, chrono durations
 * used for instant arithmetic and the std durations tokio timers expect.
 */

use chrono::Duration;

/// Millisecond field to a chrono duration
pub fn from_millis(ms: u64) -> Duration {
    Duration::milliseconds(i64::try_from(ms).unwrap_or(i64::MAX))
}

/// Chrono duration to a timer delay; negative durations become zero
pub fn to_std(duration: Duration) -> std::time::Duration {
    duration.to_std().unwrap_or(std::time::Duration::ZERO)
}
