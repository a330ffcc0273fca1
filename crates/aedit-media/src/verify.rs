//! Output verification against the plan's theoretical duration.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use aedit_models::precision::{abs_delta, snap, to_micros, SUM_EPSILON};
use aedit_models::verification::DEFAULT_TOLERANCE_SECS;
use aedit_models::{
    DiagnosticKind, EditMode, EditPlan, SegmentDiagnostic, VerificationReport, VerificationStatus,
};

use crate::error::MediaResult;
use crate::filters::FilterGraph;
use crate::probe::MediaProbe;

/// Gap between consecutive kept spans above which a diagnostic is raised.
pub const DEFAULT_MAX_GAP_SECS: f64 = 30.0;

/// Verifier thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VerifierConfig {
    /// Largest accepted |expected - actual| duration
    pub tolerance_seconds: f64,
    pub max_gap_seconds: f64,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            tolerance_seconds: DEFAULT_TOLERANCE_SECS,
            max_gap_seconds: DEFAULT_MAX_GAP_SECS,
        }
    }
}

impl VerifierConfig {
    pub fn with_tolerance(mut self, tolerance_seconds: f64) -> Self {
        self.tolerance_seconds = tolerance_seconds.max(0.0);
        self
    }

    pub fn with_max_gap(mut self, max_gap_seconds: f64) -> Self {
        self.max_gap_seconds = max_gap_seconds;
        self
    }
}

/// Compares a produced file with what its plan should have produced.
///
/// A failed comparison is reported in the returned
/// [`VerificationReport`], never as an error.
#[derive(Clone)]
pub struct OutputVerifier {
    probe: Arc<dyn MediaProbe>,
    config: VerifierConfig,
}

impl OutputVerifier {
    pub fn new(probe: Arc<dyn MediaProbe>, config: VerifierConfig) -> Self {
        Self { probe, config }
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    /// Probe `output` and build the report.
    ///
    /// Only probe failures are errors.
    pub async fn verify(
        &self,
        plan: &EditPlan,
        graph: &FilterGraph,
        output: &Path,
    ) -> MediaResult<VerificationReport> {
        let actual = self.probe.duration(output).await?;
        Ok(self.report(plan, graph, actual))
    }

    /// Build the report for a known output duration.
    pub fn report(
        &self,
        plan: &EditPlan,
        graph: &FilterGraph,
        actual_duration_seconds: f64,
    ) -> VerificationReport {
        let expected = snap(graph.output_duration);
        let actual = snap(actual_duration_seconds);
        let delta = abs_delta(expected, actual);
        let tolerance = snap(self.config.tolerance_seconds);

        // Compared on the grid so a delta exactly at tolerance passes.
        let status = if to_micros(delta) <= to_micros(tolerance) {
            VerificationStatus::Pass
        } else {
            VerificationStatus::Fail
        };

        let expected_total = expected_keep_total(plan);
        let actual_total = aedit_models::segment::total_duration(&graph.source_spans());
        let segments_delta = abs_delta(expected_total, actual_total);

        let mut diagnostics = self.continuity_diagnostics(graph);
        if segments_delta > SUM_EPSILON {
            diagnostics.push(SegmentDiagnostic {
                kind: DiagnosticKind::SegmentTotalsMismatch,
                segment_index: None,
                gap_seconds: segments_delta,
                message: format!(
                    "planned spans total {}s but the plan implies {}s",
                    actual_total, expected_total
                ),
            });
        }

        if status.is_pass() {
            debug!(expected, actual, delta, tolerance, "Output verification passed");
        } else {
            warn!(expected, actual, delta, tolerance, "Output verification failed");
        }
        if !diagnostics.is_empty() {
            warn!(count = diagnostics.len(), "Segment continuity diagnostics raised");
        }

        VerificationReport {
            expected_duration_seconds: expected,
            actual_duration_seconds: actual,
            duration_delta_seconds: delta,
            keep_segments_expected_total: expected_total,
            keep_segments_actual_total: actual_total,
            segments_delta_seconds: segments_delta,
            status,
            tolerance_seconds: tolerance,
            diagnostics,
        }
    }

    /// Overlaps and oversized gaps between consecutive source spans.
    ///
    /// Regions are independent timelines and are not checked.
    fn continuity_diagnostics(&self, graph: &FilterGraph) -> Vec<SegmentDiagnostic> {
        if graph.mode == EditMode::Regions {
            return Vec::new();
        }

        let spans = graph.source_spans();
        spans
            .windows(2)
            .enumerate()
            .filter_map(|(i, pair)| {
                let gap = snap(pair[1].start - pair[0].end);
                if gap < 0.0 {
                    Some(SegmentDiagnostic {
                        kind: DiagnosticKind::Overlap,
                        segment_index: Some(i + 1),
                        gap_seconds: gap,
                        message: format!(
                            "segment {} starts {}s before segment {} ends",
                            i + 1,
                            -gap,
                            i
                        ),
                    })
                } else if gap > self.config.max_gap_seconds {
                    Some(SegmentDiagnostic {
                        kind: DiagnosticKind::LargeGap,
                        segment_index: Some(i + 1),
                        gap_seconds: gap,
                        message: format!(
                            "{}s gap between segment {} and segment {}",
                            gap,
                            i,
                            i + 1
                        ),
                    })
                } else {
                    None
                }
            })
            .collect()
    }
}

/// Source material the plan implies should survive, before tempo.
fn expected_keep_total(plan: &EditPlan) -> f64 {
    match plan.mode() {
        EditMode::Trim => plan.trim_duration(),
        EditMode::Invert => snap(plan.source_duration_seconds - plan.trim_duration()),
        EditMode::SilenceRemoval => match &plan.segments {
            Some(segments) if plan.invert => {
                snap(segments.region_duration() - segments.keep_total())
            }
            Some(segments) => snap(segments.region_duration() - segments.silence_total()),
            None => 0.0,
        },
        EditMode::Regions => snap(plan.regions.iter().map(|r| r.duration()).sum()),
    }
}
