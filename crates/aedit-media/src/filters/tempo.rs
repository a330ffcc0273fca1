//! Tempo chaining for `atempo`, which only accepts factors in `[0.5, 2.0]`.

use aedit_models::filter::{TEMPO_STAGE_MAX, TEMPO_STAGE_MIN};
use aedit_models::precision::snap;

/// Remainders this close to 1.0 are treated as no-ops.
pub const TEMPO_NOOP_EPSILON: f64 = 1e-6;

/// Decompose `multiplier` into per-stage factors inside `[0.5, 2.0]`.
///
/// The product of the returned factors equals `multiplier`. A multiplier of
/// 1.0 yields no stages; non-positive or non-finite input yields none either.
///
/// ```
/// use aedit_media::filters::chain_tempo;
/// assert_eq!(chain_tempo(3.0), vec![2.0, 1.5]);
/// assert_eq!(chain_tempo(0.3), vec![0.5, 0.6]);
/// ```
pub fn chain_tempo(multiplier: f64) -> Vec<f64> {
    let mut stages = Vec::new();
    if !multiplier.is_finite() || multiplier <= 0.0 {
        return stages;
    }

    let mut remaining = multiplier;
    while remaining > TEMPO_STAGE_MAX {
        stages.push(TEMPO_STAGE_MAX);
        remaining /= TEMPO_STAGE_MAX;
    }
    while remaining < TEMPO_STAGE_MIN {
        stages.push(TEMPO_STAGE_MIN);
        remaining /= TEMPO_STAGE_MIN;
    }
    if (remaining - 1.0).abs() > TEMPO_NOOP_EPSILON {
        stages.push(snap(remaining));
    }

    stages
}
