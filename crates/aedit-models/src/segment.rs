//! Time intervals: detected silence windows and derived keep segments.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::precision::snap;

/// A detected interval believed to contain no meaningful signal.
///
/// Produced by the external engine's detection pass; may arrive unordered
/// and overlapping.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SilenceWindow {
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds
    pub end: f64,
}

impl SilenceWindow {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// Duration of this window in seconds (snapped, never negative).
    pub fn duration(&self) -> f64 {
        snap((self.end - self.start).max(0.0))
    }
}

/// A contiguous interval of the source that survives processing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct KeepSegment {
    /// Start time in seconds (source timeline)
    pub start: f64,
    /// End time in seconds (source timeline)
    pub end: f64,
}

impl KeepSegment {
    pub fn new(start: f64, end: f64) -> Self {
        Self {
            start: snap(start),
            end: snap(end),
        }
    }

    /// Duration of this segment in seconds (snapped, never negative).
    pub fn duration(&self) -> f64 {
        snap((self.end - self.start).max(0.0))
    }
}

/// Total duration of a list of keep segments, snapped.
pub fn total_duration(segments: &[KeepSegment]) -> f64 {
    snap(segments.iter().map(KeepSegment::duration).sum())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keep_segment_snaps_bounds() {
        let seg = KeepSegment::new(1.0000001, 2.5000004);
        assert_eq!(seg.start, 1.0);
        assert_eq!(seg.end, 2.5);
        assert_eq!(seg.duration(), 1.5);
    }

    #[test]
    fn test_inverted_window_has_zero_duration() {
        let window = SilenceWindow::new(3.0, 2.0);
        assert_eq!(window.duration(), 0.0);
    }

    #[test]
    fn test_total_duration() {
        let segments = vec![KeepSegment::new(0.0, 1.25), KeepSegment::new(2.0, 2.5)];
        assert_eq!(total_duration(&segments), 1.75);
    }
}
