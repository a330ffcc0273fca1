//! Request normalization.
//!
//! Turns an untrusted [`EditRequest`] into a validated [`EditPlan`]. Checks run
//! in a fixed order and the first failure is returned, naming the offending
//! field by its request path (`tempoMultiplier`, `regions[1].end`, ...).
//! Pure: no I/O, no side effects.

use thiserror::Error;

use crate::plan::{EditPlan, RegionPlan, SilenceDefaults, SilenceParams};
use crate::precision::snap;
use crate::request::{EditRequest, RegionRequest, SilenceRequest};
use crate::segment::SilenceWindow;

/// Lowest accepted tempo multiplier.
pub const TEMPO_MIN: f64 = 0.25;
/// Highest accepted tempo multiplier.
pub const TEMPO_MAX: f64 = 4.0;
/// Pitch shift bounds in semitones.
pub const PITCH_MIN: f64 = -24.0;
pub const PITCH_MAX: f64 = 24.0;
/// Volume multiplier bounds.
pub const VOLUME_MIN: f64 = 0.0;
pub const VOLUME_MAX: f64 = 2.0;

/// A request value failed validation.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid {field}: {message}")]
pub struct ValidationError {
    /// Request path of the offending value
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Result type for validation.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validates raw requests against a known source duration.
#[derive(Debug, Clone, Default)]
pub struct RequestNormalizer {
    defaults: SilenceDefaults,
}

impl RequestNormalizer {
    pub fn new(defaults: SilenceDefaults) -> Self {
        Self { defaults }
    }

    /// Validate and coerce `request` into an [`EditPlan`].
    pub fn normalize(
        &self,
        request: &EditRequest,
        source_duration_seconds: f64,
    ) -> ValidationResult<EditPlan> {
        let duration = finite("sourceDurationSeconds", source_duration_seconds)?;
        if duration <= 0.0 {
            return Err(ValidationError::new(
                "sourceDurationSeconds",
                "must be greater than 0",
            ));
        }

        let trim_start = finite("trimStart", request.trim_start.unwrap_or(0.0))?;
        let trim_end = finite("trimEnd", request.trim_end.unwrap_or(duration))?;
        check_interval("trimStart", "trimEnd", trim_start, trim_end, duration)?;

        let tempo_multiplier = in_range(
            "tempoMultiplier",
            request.tempo_multiplier.unwrap_or(1.0),
            TEMPO_MIN,
            TEMPO_MAX,
        )?;
        let pitch_semitones = in_range(
            "pitchSemitones",
            request.pitch_semitones.unwrap_or(0.0),
            PITCH_MIN,
            PITCH_MAX,
        )?;
        let volume_multiplier = in_range(
            "volumeMultiplier",
            request.volume_multiplier.unwrap_or(1.0),
            VOLUME_MIN,
            VOLUME_MAX,
        )?;

        let regions = request
            .regions
            .iter()
            .enumerate()
            .map(|(index, region)| normalize_region(index, region, duration))
            .collect::<ValidationResult<Vec<_>>>()?;

        let fade_in_seconds = non_negative("fadeInSeconds", request.fade_in_seconds.unwrap_or(0.0))?;
        let fade_out_seconds =
            non_negative("fadeOutSeconds", request.fade_out_seconds.unwrap_or(0.0))?;

        if !regions.is_empty() {
            if request.invert {
                return Err(ValidationError::new(
                    "invert",
                    "cannot be combined with regions",
                ));
            }
            if request.silence.is_some() {
                return Err(ValidationError::new(
                    "silence",
                    "cannot be combined with regions",
                ));
            }
        }

        if request.invert
            && request.silence.is_none()
            && trim_start <= 0.0
            && trim_end >= duration
        {
            return Err(ValidationError::new(
                "invert",
                "selection covers the whole source; nothing would remain",
            ));
        }

        let silence = request
            .silence
            .as_ref()
            .map(|s| self.normalize_silence(s, trim_start, trim_end, duration))
            .transpose()?;

        // Span the top-level stages apply to, before the tempo change.
        let span = if !regions.is_empty() {
            snap(regions.iter().map(RegionPlan::output_duration).sum())
        } else if let Some(ref silence) = silence {
            silence.region_duration()
        } else if request.invert {
            snap(duration - (trim_end - trim_start))
        } else {
            snap(trim_end - trim_start)
        };
        check_fades(
            "fadeOutSeconds",
            fade_in_seconds,
            fade_out_seconds,
            snap(span / tempo_multiplier),
        )?;

        Ok(EditPlan {
            source_duration_seconds: duration,
            trim_start,
            trim_end,
            fade_in_seconds,
            fade_out_seconds,
            tempo_multiplier,
            pitch_semitones,
            volume_multiplier,
            invert: request.invert,
            regions,
            silence,
            segments: None,
        })
    }

    fn normalize_silence(
        &self,
        request: &SilenceRequest,
        trim_start: f64,
        trim_end: f64,
        duration: f64,
    ) -> ValidationResult<SilenceParams> {
        let region_start = finite(
            "silence.regionStart",
            request.region_start.unwrap_or(trim_start),
        )?;
        let region_end = finite("silence.regionEnd", request.region_end.unwrap_or(trim_end))?;
        check_interval(
            "silence.regionStart",
            "silence.regionEnd",
            region_start,
            region_end,
            duration,
        )?;

        // The target region is the sub-region intersected with the trim range.
        let bounded_start = region_start.max(trim_start);
        let bounded_end = region_end.min(trim_end);
        if bounded_start >= bounded_end {
            return Err(ValidationError::new(
                "silence.regionStart",
                format!(
                    "sub-region [{}, {}) does not overlap the trim range [{}, {})",
                    region_start, region_end, trim_start, trim_end
                ),
            ));
        }

        let merge_epsilon_seconds = non_negative(
            "silence.mergeEpsilonSeconds",
            request
                .merge_epsilon_seconds
                .unwrap_or(self.defaults.merge_epsilon_seconds),
        )?;
        let min_segment_seconds = non_negative(
            "silence.minSegmentSeconds",
            request
                .min_segment_seconds
                .unwrap_or(self.defaults.min_segment_seconds),
        )?;
        let noise_threshold_db = finite(
            "silence.noiseThresholdDb",
            request
                .noise_threshold_db
                .unwrap_or(self.defaults.noise_threshold_db),
        )?;
        if noise_threshold_db > 0.0 {
            return Err(ValidationError::new(
                "silence.noiseThresholdDb",
                "must be at most 0 dB",
            ));
        }
        let min_silence_seconds = finite(
            "silence.minSilenceSeconds",
            request
                .min_silence_seconds
                .unwrap_or(self.defaults.min_silence_seconds),
        )?;
        if min_silence_seconds <= 0.0 {
            return Err(ValidationError::new(
                "silence.minSilenceSeconds",
                "must be greater than 0",
            ));
        }

        let windows = request
            .windows
            .as_ref()
            .map(|windows| {
                windows
                    .iter()
                    .enumerate()
                    .map(|(i, w)| {
                        let field = format!("silence.windows[{}]", i);
                        let start = finite(&field, w.start)?;
                        let end = finite(&field, w.end)?;
                        if start < 0.0 || end > duration || start >= end {
                            return Err(ValidationError::new(
                                field,
                                format!("must satisfy 0 <= start < end <= {}", duration),
                            ));
                        }
                        Ok(SilenceWindow::new(start, end))
                    })
                    .collect::<ValidationResult<Vec<_>>>()
            })
            .transpose()?;

        Ok(SilenceParams {
            region_start: snap(bounded_start),
            region_end: snap(bounded_end),
            merge_epsilon_seconds,
            min_segment_seconds,
            noise_threshold_db,
            min_silence_seconds,
            windows,
        })
    }
}

/// Validate with default silence settings.
pub fn normalize(request: &EditRequest, source_duration_seconds: f64) -> ValidationResult<EditPlan> {
    RequestNormalizer::default().normalize(request, source_duration_seconds)
}

/// Re-check the top-level fades once keep segments are attached.
///
/// A silence request is first checked against its whole region; the
/// material that survives detection can be much shorter.
pub fn check_kept_fades(plan: &EditPlan) -> ValidationResult<()> {
    let Some(segments) = &plan.segments else {
        return Ok(());
    };
    let kept = if plan.invert {
        segments.silence_total()
    } else {
        segments.keep_total()
    };
    check_fades(
        "fadeOutSeconds",
        plan.fade_in_seconds,
        plan.fade_out_seconds,
        snap(kept / plan.tempo_multiplier),
    )
}

fn normalize_region(
    index: usize,
    region: &RegionRequest,
    duration: f64,
) -> ValidationResult<RegionPlan> {
    let field = |name: &str| format!("regions[{}].{}", index, name);

    let start = region
        .start
        .ok_or_else(|| ValidationError::new(field("start"), "is required"))?;
    let end = region
        .end
        .ok_or_else(|| ValidationError::new(field("end"), "is required"))?;
    let start = finite(&field("start"), start)?;
    let end = finite(&field("end"), end)?;
    check_interval(&field("start"), &field("end"), start, end, duration)?;

    let tempo_multiplier = in_range(
        &field("tempoMultiplier"),
        region.tempo_multiplier.unwrap_or(1.0),
        TEMPO_MIN,
        TEMPO_MAX,
    )?;
    let pitch_semitones = in_range(
        &field("pitchSemitones"),
        region.pitch_semitones.unwrap_or(0.0),
        PITCH_MIN,
        PITCH_MAX,
    )?;
    let volume_multiplier = in_range(
        &field("volumeMultiplier"),
        region.volume_multiplier.unwrap_or(1.0),
        VOLUME_MIN,
        VOLUME_MAX,
    )?;
    let fade_in_seconds = non_negative(&field("fadeInSeconds"), region.fade_in_seconds.unwrap_or(0.0))?;
    let fade_out_seconds =
        non_negative(&field("fadeOutSeconds"), region.fade_out_seconds.unwrap_or(0.0))?;

    let plan = RegionPlan {
        id: region
            .id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| format!("region-{}", index)),
        start,
        end,
        tempo_multiplier,
        pitch_semitones,
        volume_multiplier,
        fade_in_seconds,
        fade_out_seconds,
    };
    check_fades(
        &field("fadeOutSeconds"),
        fade_in_seconds,
        fade_out_seconds,
        plan.output_duration(),
    )?;
    Ok(plan)
}

fn finite(field: &str, value: f64) -> ValidationResult<f64> {
    if value.is_finite() {
        Ok(snap(value))
    } else {
        Err(ValidationError::new(field, "must be a finite number"))
    }
}

fn non_negative(field: &str, value: f64) -> ValidationResult<f64> {
    let value = finite(field, value)?;
    if value < 0.0 {
        return Err(ValidationError::new(field, "must not be negative"));
    }
    Ok(value)
}

fn in_range(field: &str, value: f64, min: f64, max: f64) -> ValidationResult<f64> {
    let value = finite(field, value)?;
    if value < min || value > max {
        return Err(ValidationError::new(
            field,
            format!("must be between {} and {} (got {})", min, max, value),
        ));
    }
    Ok(value)
}

fn check_interval(
    start_field: &str,
    end_field: &str,
    start: f64,
    end: f64,
    duration: f64,
) -> ValidationResult<()> {
    if start < 0.0 || start > duration {
        return Err(ValidationError::new(
            start_field,
            format!("must be within [0, {}] (got {})", duration, start),
        ));
    }
    if end < 0.0 || end > duration {
        return Err(ValidationError::new(
            end_field,
            format!("must be within [0, {}] (got {})", duration, end),
        ));
    }
    if start >= end {
        return Err(ValidationError::new(
            start_field,
            format!("must be less than {} ({} >= {})", end_field, start, end),
        ));
    }
    Ok(())
}

fn check_fades(field: &str, fade_in: f64, fade_out: f64, segment: f64) -> ValidationResult<()> {
    if snap(fade_in + fade_out) > segment {
        return Err(ValidationError::new(
            field,
            format!(
                "fade-in ({}) plus fade-out ({}) exceeds the segment length ({})",
                fade_in, fade_out, segment
            ),
        ));
    }
    Ok(())
}
