//! Validated edit plan.
//!
//! An [`EditPlan`] is only ever built by [`crate::normalize::normalize`]; all
//! numeric fields are range-checked and snapped to the precision grid.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::precision::snap;
use crate::segment::{KeepSegment, SilenceWindow};

/// Default silence merge epsilon (seconds).
pub const DEFAULT_MERGE_EPSILON_SECS: f64 = 0.01;
/// Default minimum keep segment (seconds).
pub const DEFAULT_MIN_SEGMENT_SECS: f64 = 0.0001;
/// Default detection noise floor (dB).
pub const DEFAULT_NOISE_THRESHOLD_DB: f64 = -30.0;
/// Default shortest silence reported by detection (seconds).
pub const DEFAULT_MIN_SILENCE_SECS: f64 = 0.5;

/// How the plan's output is assembled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EditMode {
    /// Keep `[trimStart, trimEnd)`
    Trim,
    /// Keep everything outside `[trimStart, trimEnd)`
    Invert,
    /// Keep the complement of detected silence inside the target region
    SilenceRemoval,
    /// Concatenate independently parameterized regions
    Regions,
}

impl EditMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            EditMode::Trim => "trim",
            EditMode::Invert => "invert",
            EditMode::SilenceRemoval => "silence_removal",
            EditMode::Regions => "regions",
        }
    }
}

/// Canonical, validated edit plan for one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EditPlan {
    pub source_duration_seconds: f64,
    pub trim_start: f64,
    pub trim_end: f64,
    pub fade_in_seconds: f64,
    pub fade_out_seconds: f64,
    pub tempo_multiplier: f64,
    pub pitch_semitones: f64,
    pub volume_multiplier: f64,
    pub invert: bool,
    pub regions: Vec<RegionPlan>,
    pub silence: Option<SilenceParams>,
    /// Keep segments computed from silence detection, once available
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segments: Option<SegmentPlan>,
}

impl EditPlan {
    /// A plan that keeps the whole source unchanged.
    pub fn passthrough(source_duration_seconds: f64) -> Self {
        let duration = snap(source_duration_seconds);
        Self {
            source_duration_seconds: duration,
            trim_start: 0.0,
            trim_end: duration,
            fade_in_seconds: 0.0,
            fade_out_seconds: 0.0,
            tempo_multiplier: 1.0,
            pitch_semitones: 0.0,
            volume_multiplier: 1.0,
            invert: false,
            regions: Vec::new(),
            silence: None,
            segments: None,
        }
    }

    pub fn mode(&self) -> EditMode {
        if !self.regions.is_empty() {
            EditMode::Regions
        } else if self.silence.is_some() {
            EditMode::SilenceRemoval
        } else if self.invert {
            EditMode::Invert
        } else {
            EditMode::Trim
        }
    }

    /// Length of the selected trim range in source seconds.
    pub fn trim_duration(&self) -> f64 {
        snap(self.trim_end - self.trim_start)
    }

    /// Attach the keep segments computed for this plan.
    pub fn with_segments(mut self, segments: SegmentPlan) -> Self {
        self.segments = Some(segments);
        self
    }
}

/// An independently parameterized sub-interval of the source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegionPlan {
    pub id: String,
    pub start: f64,
    pub end: f64,
    pub tempo_multiplier: f64,
    pub pitch_semitones: f64,
    pub volume_multiplier: f64,
    pub fade_in_seconds: f64,
    pub fade_out_seconds: f64,
}

impl RegionPlan {
    /// A region with no-op processing parameters.
    pub fn new(id: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            id: id.into(),
            start: snap(start),
            end: snap(end),
            tempo_multiplier: 1.0,
            pitch_semitones: 0.0,
            volume_multiplier: 1.0,
            fade_in_seconds: 0.0,
            fade_out_seconds: 0.0,
        }
    }

    /// Source length of the region.
    pub fn duration(&self) -> f64 {
        snap(self.end - self.start)
    }

    /// Length after the region's tempo change.
    pub fn output_duration(&self) -> f64 {
        snap(self.duration() / self.tempo_multiplier)
    }

    pub fn as_segment(&self) -> KeepSegment {
        KeepSegment::new(self.start, self.end)
    }
}

/// Resolved silence removal parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SilenceParams {
    /// Bounding region start; silence is only removed inside the region
    pub region_start: f64,
    pub region_end: f64,
    pub merge_epsilon_seconds: f64,
    pub min_segment_seconds: f64,
    pub noise_threshold_db: f64,
    pub min_silence_seconds: f64,
    /// Pre-detected windows supplied with the request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub windows: Option<Vec<SilenceWindow>>,
}

impl SilenceParams {
    pub fn region_duration(&self) -> f64 {
        snap(self.region_end - self.region_start)
    }
}

/// Defaults applied to silence settings the request leaves out.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SilenceDefaults {
    pub merge_epsilon_seconds: f64,
    pub min_segment_seconds: f64,
    pub noise_threshold_db: f64,
    pub min_silence_seconds: f64,
}

impl Default for SilenceDefaults {
    fn default() -> Self {
        Self {
            merge_epsilon_seconds: DEFAULT_MERGE_EPSILON_SECS,
            min_segment_seconds: DEFAULT_MIN_SEGMENT_SECS,
            noise_threshold_db: DEFAULT_NOISE_THRESHOLD_DB,
            min_silence_seconds: DEFAULT_MIN_SILENCE_SECS,
        }
    }
}

/// Result of interval algebra over detected silence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SegmentPlan {
    pub region_start: f64,
    pub region_end: f64,
    /// Merged, clipped silence windows, ascending
    pub merged_silence: Vec<SilenceWindow>,
    /// Material that survives, ascending and pairwise disjoint
    pub keep: Vec<KeepSegment>,
}

impl SegmentPlan {
    pub fn region_duration(&self) -> f64 {
        snap(self.region_end - self.region_start)
    }

    pub fn silence_total(&self) -> f64 {
        snap(self.merged_silence.iter().map(SilenceWindow::duration).sum())
    }

    pub fn keep_total(&self) -> f64 {
        crate::segment::total_duration(&self.keep)
    }
}
