//! Precision grid for time values.
//!
//! Every component that produces or compares a time value goes through this
//! module. Values are snapped to a fixed decimal grid of [`GRID_DIGITS`]
//! digits (microseconds), which keeps floating-point drift out of interval
//! arithmetic and duration comparisons.

/// Number of decimal digits kept for time values.
pub const GRID_DIGITS: u32 = 6;

/// Grid steps per second (10^GRID_DIGITS).
pub const GRID_SCALE: f64 = 1_000_000.0;

/// Tolerance used when asserting that two snapped sums agree.
pub const SUM_EPSILON: f64 = 1e-6;

/// Snap a time value (seconds) to the precision grid.
///
/// Snapping is idempotent: `snap(snap(x)) == snap(x)`.
///
/// # Examples
/// ```
/// use aedit_models::precision::snap;
/// assert_eq!(snap(1.0000004), 1.0);
/// assert_eq!(snap(90.923 - 90.867), 0.056);
/// ```
pub fn snap(secs: f64) -> f64 {
    if !secs.is_finite() {
        return secs;
    }
    from_micros(to_micros(secs))
}

/// Convert seconds to whole grid steps (microseconds), rounding half away from zero.
pub fn to_micros(secs: f64) -> i64 {
    (secs * GRID_SCALE).round() as i64
}

/// Convert grid steps (microseconds) back to seconds.
pub fn from_micros(micros: i64) -> f64 {
    micros as f64 / GRID_SCALE
}

/// Compare two time values after snapping both to the grid.
pub fn approx_eq(a: f64, b: f64, eps: f64) -> bool {
    (snap(a) - snap(b)).abs() <= eps
}

/// Absolute difference of two time values, snapped to the grid.
pub fn abs_delta(a: f64, b: f64) -> f64 {
    snap((snap(a) - snap(b)).abs())
}

/// Format seconds as `HH:MM:SS.mmm` for log output.
pub fn format_seconds(total_secs: f64) -> String {
    let total_ms = (snap(total_secs.max(0.0)) * 1000.0).round() as u64;
    let hours = total_ms / 3_600_000;
    let mins = (total_ms % 3_600_000) / 60_000;
    let secs = (total_ms % 60_000) / 1000;
    let ms = total_ms % 1000;
    format!("{:02}:{:02}:{:02}.{:03}", hours, mins, secs, ms)
}
