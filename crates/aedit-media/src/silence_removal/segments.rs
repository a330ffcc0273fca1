//! Interval algebra turning silence windows into keep segments.
//!
//! ```text
//!  region   [==========================================)
//!  silence        [----)  [--)[---)            [------)
//!  merged         [----)  [-------)            [------)
//!  keep     [====)      [=)       [==========)
//! ```
//!
//! All arithmetic runs on integer microseconds so that
//! `keep total + merged silence total == region length` holds exactly.

use tracing::debug;

use aedit_models::precision::{from_micros, snap, to_micros};
use aedit_models::{KeepSegment, SegmentPlan, SilenceParams, SilenceWindow};

use crate::error::{MediaError, MediaResult};

/// Half-open interval in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Span {
    start: i64,
    end: i64,
}

impl Span {
    fn len(&self) -> i64 {
        self.end - self.start
    }
}

/// Merge/complement sweep over silence windows.
#[derive(Debug, Clone, Copy)]
pub struct SegmentAlgebra {
    merge_epsilon_us: i64,
    min_segment_us: i64,
}

impl SegmentAlgebra {
    pub fn new(merge_epsilon_seconds: f64, min_segment_seconds: f64) -> Self {
        Self {
            merge_epsilon_us: to_micros(merge_epsilon_seconds.max(0.0)),
            min_segment_us: to_micros(min_segment_seconds.max(0.0)),
        }
    }

    pub fn from_params(params: &SilenceParams) -> Self {
        Self::new(params.merge_epsilon_seconds, params.min_segment_seconds)
    }

    /// Clip, sort and merge `windows` inside `[region_start, region_end)`.
    ///
    /// Windows closer than the merge epsilon are joined, and so are windows
    /// whose gap would leave a keep segment shorter than the minimum segment.
    /// Keep fragments at the region edges that are too short are absorbed into
    /// the neighbouring silence.
    pub fn merge_windows(
        &self,
        windows: &[SilenceWindow],
        region_start: f64,
        region_end: f64,
    ) -> Vec<SilenceWindow> {
        let region = Span {
            start: to_micros(region_start),
            end: to_micros(region_end),
        };
        self.merge_spans(windows, region)
            .into_iter()
            .map(|s| SilenceWindow::new(from_micros(s.start), from_micros(s.end)))
            .collect()
    }

    /// Compute merged silence and the complementary keep segments.
    ///
    /// Fails with [`MediaError::EmptyResult`] when nothing would be kept.
    pub fn compute(
        &self,
        windows: &[SilenceWindow],
        region_start: f64,
        region_end: f64,
    ) -> MediaResult<SegmentPlan> {
        if !region_start.is_finite() || !region_end.is_finite() {
            return Err(MediaError::invalid_plan("silence region bounds must be finite"));
        }
        let region = Span {
            start: to_micros(region_start),
            end: to_micros(region_end),
        };
        if region.len() <= 0 {
            return Err(MediaError::invalid_plan(format!(
                "silence region [{}, {}) is empty",
                region_start, region_end
            )));
        }

        let merged = self.merge_spans(windows, region);

        let mut keep = Vec::with_capacity(merged.len() + 1);
        let mut cursor = region.start;
        for silence in &merged {
            if silence.start > cursor {
                keep.push(Span {
                    start: cursor,
                    end: silence.start,
                });
            }
            cursor = silence.end;
        }
        if cursor < region.end {
            keep.push(Span {
                start: cursor,
                end: region.end,
            });
        }
        keep.retain(|k| k.len() >= self.min_segment_us);

        debug!(
            raw_windows = windows.len(),
            merged_windows = merged.len(),
            keep_segments = keep.len(),
            "Computed keep segments"
        );

        if keep.is_empty() {
            return Err(MediaError::empty_result(snap(region_start), snap(region_end)));
        }

        Ok(SegmentPlan {
            region_start: from_micros(region.start),
            region_end: from_micros(region.end),
            merged_silence: merged
                .iter()
                .map(|s| SilenceWindow::new(from_micros(s.start), from_micros(s.end)))
                .collect(),
            keep: keep
                .iter()
                .map(|k| KeepSegment::new(from_micros(k.start), from_micros(k.end)))
                .collect(),
        })
    }

    fn merge_spans(&self, windows: &[SilenceWindow], region: Span) -> Vec<Span> {
        let mut spans: Vec<Span> = windows
            .iter()
            .filter(|w| w.start.is_finite() && w.end.is_finite())
            .map(|w| Span {
                start: to_micros(w.start).max(region.start),
                end: to_micros(w.end).min(region.end),
            })
            .filter(|s| s.len() > 0)
            .collect();
        spans.sort_by_key(|s| (s.start, s.end));

        let mut merged: Vec<Span> = Vec::with_capacity(spans.len());
        for span in spans {
            match merged.last_mut() {
                Some(running) if self.joins(running.end, span.start) => {
                    running.end = running.end.max(span.end);
                }
                _ => merged.push(span),
            }
        }

        // A sliver of keep at either edge would fall below the minimum.
        if let Some(first) = merged.first_mut() {
            let lead = first.start - region.start;
            if lead > 0 && lead < self.min_segment_us {
                first.start = region.start;
            }
        }
        if let Some(last) = merged.last_mut() {
            let tail = region.end - last.end;
            if tail > 0 && tail < self.min_segment_us {
                last.end = region.end;
            }
        }

        merged
    }

    fn joins(&self, running_end: i64, next_start: i64) -> bool {
        let gap = next_start - running_end;
        // A gap too short to survive as a keep segment is silence too.
        gap <= self.merge_epsilon_us || gap < self.min_segment_us
    }
}

/// Run the algebra over the windows for a validated silence request.
pub fn compute_keep_segments(
    windows: &[SilenceWindow],
    params: &SilenceParams,
) -> MediaResult<SegmentPlan> {
    SegmentAlgebra::from_params(params).compute(windows, params.region_start, params.region_end)
}

/// Summary statistics for a computed segment plan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentStats {
    pub keep_count: usize,
    pub cut_count: usize,
    pub keep_duration: f64,
    pub cut_duration: f64,
    /// Kept fraction of the region, 0.0-1.0
    pub keep_ratio: f64,
}

/// Compute statistics for a segment plan.
pub fn compute_segment_stats(plan: &SegmentPlan) -> SegmentStats {
    let keep_duration = plan.keep_total();
    let region = plan.region_duration();
    SegmentStats {
        keep_count: plan.keep.len(),
        cut_count: plan.merged_silence.len(),
        keep_duration,
        cut_duration: plan.silence_total(),
        keep_ratio: if region > 0.0 { keep_duration / region } else { 0.0 },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;
    use aedit_models::precision::SUM_EPSILON;

    fn w(start: f64, end: f64) -> SilenceWindow {
        SilenceWindow::new(start, end)
    }

    fn algebra() -> SegmentAlgebra {
        SegmentAlgebra::new(0.01, 0.0001)
    }

    fn assert_complete(plan: &SegmentPlan) {
        let sum = plan.keep_total() + plan.silence_total();
        assert!((sum - plan.region_duration()).abs() <= SUM_EPSILON);
    }

    #[test]
    fn test_no_silence_keeps_whole_region() {
        let plan = assert_ok!(algebra().compute(&[], 2.0, 10.0));
        assert_eq!(plan.keep, vec![KeepSegment::new(2.0, 10.0)]);
        assert!(plan.merged_silence.is_empty());
    }

    #[test]
    fn test_near_adjacent_windows_merge() {
        let merged = algebra().merge_windows(&[w(3.005, 4.0), w(2.0, 3.0)], 0.0, 10.0);
        assert_eq!(merged, vec![w(2.0, 4.0)]);
    }

    #[test]
    fn test_windows_beyond_epsilon_stay_apart() {
        let merged = algebra().merge_windows(&[w(2.0, 3.0), w(3.02, 4.0)], 0.0, 10.0);
        assert_eq!(merged, vec![w(2.0, 3.0), w(3.02, 4.0)]);
    }

    #[test]
    fn test_unsorted_overlapping_windows() {
        let windows = [w(6.0, 7.0), w(1.0, 3.0), w(2.5, 4.0), w(3.5, 3.8)];
        let plan = assert_ok!(algebra().compute(&windows, 0.0, 10.0));
        assert_eq!(plan.merged_silence, vec![w(1.0, 4.0), w(6.0, 7.0)]);
        assert_eq!(
            plan.keep,
            vec![
                KeepSegment::new(0.0, 1.0),
                KeepSegment::new(4.0, 6.0),
                KeepSegment::new(7.0, 10.0),
            ]
        );
        assert_complete(&plan);
    }

    #[test]
    fn test_windows_clipped_to_region() {
        let windows = [w(0.0, 2.5), w(4.0, 5.0), w(9.0, 12.0), w(20.0, 21.0)];
        let plan = assert_ok!(algebra().compute(&windows, 2.0, 10.0));
        assert_eq!(plan.merged_silence, vec![w(2.0, 2.5), w(4.0, 5.0), w(9.0, 10.0)]);
        assert_eq!(
            plan.keep,
            vec![KeepSegment::new(2.5, 4.0), KeepSegment::new(5.0, 9.0)]
        );
        assert_complete(&plan);
    }

    #[test]
    fn test_full_silence_is_empty_result() {
        let result = algebra().compute(&[w(0.0, 6.0), w(5.0, 10.0)], 0.0, 10.0);
        assert!(matches!(result, Err(MediaError::EmptyResult { .. })));
    }

    #[test]
    fn test_short_edge_fragment_absorbed() {
        // 0.05 s of keep before the first window is below a 0.1 s minimum.
        let algebra = SegmentAlgebra::new(0.01, 0.1);
        let plan = assert_ok!(algebra.compute(&[w(0.05, 1.0), w(9.0, 9.95)], 0.0, 10.0));
        assert_eq!(plan.keep, vec![KeepSegment::new(1.0, 9.0)]);
        assert_eq!(plan.merged_silence, vec![w(0.0, 1.0), w(9.0, 10.0)]);
        assert_complete(&plan);
    }

    #[test]
    fn test_short_inner_gap_merged() {
        let algebra = SegmentAlgebra::new(0.01, 0.1);
        let plan = assert_ok!(algebra.compute(&[w(1.0, 2.0), w(2.05, 3.0)], 0.0, 10.0));
        assert_eq!(plan.merged_silence, vec![w(1.0, 3.0)]);
        assert_complete(&plan);
    }

    #[test]
    fn test_invalid_windows_ignored() {
        let windows = [w(f64::NAN, 2.0), w(5.0, 4.0), w(3.0, 3.0)];
        let plan = assert_ok!(algebra().compute(&windows, 0.0, 10.0));
        assert!(plan.merged_silence.is_empty());
        assert_eq!(plan.keep.len(), 1);
    }

    #[test]
    fn test_empty_region_is_invalid() {
        assert!(matches!(
            algebra().compute(&[], 5.0, 5.0),
            Err(MediaError::InvalidPlan(_))
        ));
    }

    #[test]
    fn test_twenty_five_windows_scenario() {
        let windows: Vec<_> = (0..25)
            .map(|i| {
                let start = 1.0 + i as f64 * 4.6;
                w(start, start + 1.02624)
            })
            .collect();
        let plan = assert_ok!(algebra().compute(&windows, 0.0, 116.523));

        assert_eq!(plan.merged_silence.len(), 25);
        assert_eq!(plan.keep.len(), 26);
        assert_eq!(plan.silence_total(), 25.656);
        assert_eq!(plan.keep_total(), 90.867);
        assert_complete(&plan);

        let stats = compute_segment_stats(&plan);
        assert_eq!(stats.cut_count, 25);
        assert!((stats.keep_ratio - 90.867 / 116.523).abs() < 1e-9);
    }

    #[test]
    fn test_merged_windows_are_disjoint_and_ordered() {
        let windows: Vec<_> = (0..40)
            .map(|i| {
                let start = ((i * 37) % 100) as f64 * 0.1;
                w(start, start + 0.35)
            })
            .collect();
        let plan = assert_ok!(algebra().compute(&windows, 0.0, 12.0));
        for pair in plan.merged_silence.windows(2) {
            assert!(pair[0].end < pair[1].start);
        }
        for pair in plan.keep.windows(2) {
            assert!(pair[0].end <= pair[1].start);
        }
        assert_complete(&plan);
    }
}
