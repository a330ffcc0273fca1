//! Raw, untrusted edit request as received from the HTTP layer.
//!
//! Every field is optional here; [`crate::normalize`] turns a request into a
//! validated [`crate::EditPlan`]. Unknown JSON fields are ignored.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::normalize::ValidationError;
use crate::SilenceWindow;

/// Edit request body.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct EditRequest {
    /// Start of the selected range (seconds); defaults to 0
    pub trim_start: Option<f64>,
    /// End of the selected range (seconds); defaults to the source duration
    pub trim_end: Option<f64>,
    pub fade_in_seconds: Option<f64>,
    pub fade_out_seconds: Option<f64>,
    pub tempo_multiplier: Option<f64>,
    pub pitch_semitones: Option<f64>,
    pub volume_multiplier: Option<f64>,
    /// Keep the material outside the selection instead of inside it
    pub invert: bool,
    /// Independently parameterized regions, concatenated in order
    pub regions: Vec<RegionRequest>,
    /// Silence removal settings; absent means no silence removal
    pub silence: Option<SilenceRequest>,
}

impl EditRequest {
    /// Parse a request body. Malformed JSON or wrong value types surface as a
    /// validation error on the `request` field.
    pub fn from_json(body: &str) -> Result<Self, ValidationError> {
        serde_json::from_str(body).map_err(|e| ValidationError::new("request", e.to_string()))
    }
}

/// One region of a multi-region request.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct RegionRequest {
    /// Region identifier; defaults to `region-<index>`
    pub id: Option<String>,
    pub start: Option<f64>,
    pub end: Option<f64>,
    pub tempo_multiplier: Option<f64>,
    pub pitch_semitones: Option<f64>,
    pub volume_multiplier: Option<f64>,
    pub fade_in_seconds: Option<f64>,
    pub fade_out_seconds: Option<f64>,
}

/// Silence removal settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct SilenceRequest {
    /// Optional sub-region bound; defaults to the trim range
    pub region_start: Option<f64>,
    pub region_end: Option<f64>,
    pub merge_epsilon_seconds: Option<f64>,
    pub min_segment_seconds: Option<f64>,
    /// Detection noise floor in dB (e.g. -30)
    pub noise_threshold_db: Option<f64>,
    /// Shortest silence the detection pass reports
    pub min_silence_seconds: Option<f64>,
    /// Pre-detected windows; when present the detection pass is skipped
    pub windows: Option<Vec<SilenceWindow>>,
}
