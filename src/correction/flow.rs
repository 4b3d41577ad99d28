use chrono::{DateTime, Utc};

use crate::correction::config::ElapsedTimeMode;

/// Reading values are integers in thousandths of the flow-rate volume unit.
pub const VOLUME_SCALE: f64 = 1000.0;

const SECONDS_PER_DAY: i64 = 86_400;

/// Minutes between the last reading and the effective observation time.
pub fn elapsed_minutes(last: DateTime<Utc>, observed: DateTime<Utc>, mode: ElapsedTimeMode) -> f64 {
    let gap = observed - last;
    match mode {
        ElapsedTimeMode::SecondsComponent => {
            gap.num_seconds().rem_euclid(SECONDS_PER_DAY) as f64 / 60.0
        }
        ElapsedTimeMode::TotalDuration => gap.num_milliseconds() as f64 / 60_000.0,
    }
}

/// Converts a bound in volume units per hour to volume units per minute.
pub fn per_minute(max_flow_rate_per_hour: f64) -> f64 {
    max_flow_rate_per_hour / 60.0
}

/// Implied flow in volume units per minute.
///
/// With no elapsed time an unchanged value has zero flow and any change has infinite
/// flow in the direction of the change.
pub fn implied_flow_rate(corrected: u64, last: u64, elapsed_minutes: f64) -> f64 {
    let delta = corrected as f64 - last as f64;
    if delta == 0.0 {
        return 0.0;
    }
    if elapsed_minutes <= 0.0 {
        return f64::INFINITY.copysign(delta);
    }
    delta / VOLUME_SCALE / elapsed_minutes
}
