//! Output verification report.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default duration tolerance in seconds.
pub const DEFAULT_TOLERANCE_SECS: f64 = 0.01;

/// Historical tolerance, kept for callers that still verify against it.
pub const LEGACY_TOLERANCE_SECS: f64 = 0.1;

/// Verification outcome. A `Fail` is informational, never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Pass,
    Fail,
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStatus::Pass => "pass",
            VerificationStatus::Fail => "fail",
        }
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, VerificationStatus::Pass)
    }
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kind of segment-continuity problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// Consecutive expected segments overlap (negative gap).
    Overlap,
    /// Consecutive expected segments are separated by an implausibly large gap.
    LargeGap,
    /// Planned keep total disagrees with region minus removed silence.
    SegmentTotalsMismatch,
}

/// A continuity problem found in the expected segment list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SegmentDiagnostic {
    pub kind: DiagnosticKind,
    /// Index of the later segment of the offending pair, when applicable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segment_index: Option<usize>,
    /// Gap (or delta) in seconds; negative for overlaps
    pub gap_seconds: f64,
    pub message: String,
}

/// Comparison of the plan's expected result against the produced output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerificationReport {
    pub expected_duration_seconds: f64,
    pub actual_duration_seconds: f64,
    pub duration_delta_seconds: f64,
    pub keep_segments_expected_total: f64,
    pub keep_segments_actual_total: f64,
    pub segments_delta_seconds: f64,
    pub status: VerificationStatus,
    pub tolerance_seconds: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<SegmentDiagnostic>,
}

impl VerificationReport {
    pub fn passed(&self) -> bool {
        self.status.is_pass()
    }

    pub fn has_diagnostics(&self) -> bool {
        !self.diagnostics.is_empty()
    }
}
