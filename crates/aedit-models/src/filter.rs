//! Filter stage descriptors handed to the transcoding engine.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lowest multiplier a single tempo stage accepts.
pub const TEMPO_STAGE_MIN: f64 = 0.5;
/// Highest multiplier a single tempo stage accepts.
pub const TEMPO_STAGE_MAX: f64 = 2.0;

/// Kind of processing stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    Tempo,
    Fade,
    Volume,
    Pitch,
}

impl FilterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterKind::Tempo => "tempo",
            FilterKind::Fade => "fade",
            FilterKind::Volume => "volume",
            FilterKind::Pitch => "pitch",
        }
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Fade direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FadeDirection {
    In,
    Out,
}

impl FadeDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            FadeDirection::In => "in",
            FadeDirection::Out => "out",
        }
    }
}

/// One ordered instruction for the transcoding engine.
///
/// Serializes as `{"kind": "...", "params": ...}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", content = "params", rename_all = "snake_case")]
pub enum FilterStage {
    /// Playback speed change without pitch change; multiplier in `[0.5, 2.0]`.
    Tempo(f64),
    /// Amplitude fade.
    Fade {
        direction: FadeDirection,
        #[serde(rename = "startSeconds")]
        start_seconds: f64,
        #[serde(rename = "durationSeconds")]
        duration_seconds: f64,
    },
    /// Gain multiplier in `[0, 2.0]`.
    Volume(f64),
    /// Pitch shift in semitones.
    Pitch(f64),
}

impl FilterStage {
    pub fn kind(&self) -> FilterKind {
        match self {
            FilterStage::Tempo(_) => FilterKind::Tempo,
            FilterStage::Fade { .. } => FilterKind::Fade,
            FilterStage::Volume(_) => FilterKind::Volume,
            FilterStage::Pitch(_) => FilterKind::Pitch,
        }
    }

    /// Tempo multiplier if this is a tempo stage.
    pub fn tempo(&self) -> Option<f64> {
        match self {
            FilterStage::Tempo(m) => Some(*m),
            _ => None,
        }
    }
}
