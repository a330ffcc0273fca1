//! FFmpeg progress parsing.

use serde::{Deserialize, Serialize};

/// Progress information from FFmpeg.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FfmpegProgress {
    /// Output time in microseconds
    pub out_time_us: i64,
    /// Output time as string (HH:MM:SS.microseconds)
    pub out_time: String,
    /// Encoding speed (e.g., 1.5 = 1.5x realtime)
    pub speed: f64,
    /// Whether encoding is complete
    pub is_complete: bool,
}

impl FfmpegProgress {
    /// Output time in seconds.
    pub fn out_time_secs(&self) -> f64 {
        self.out_time_us.max(0) as f64 / 1_000_000.0
    }

    /// Calculate progress percentage given the expected output duration.
    pub fn percentage(&self, expected_secs: f64) -> f64 {
        if expected_secs <= 0.0 {
            return 0.0;
        }
        ((self.out_time_secs() / expected_secs) * 100.0).min(100.0)
    }

    /// Estimate time remaining in seconds.
    pub fn eta_seconds(&self, expected_secs: f64) -> Option<f64> {
        if self.speed <= 0.0 || self.out_time_us <= 0 {
            return None;
        }

        let remaining = expected_secs - self.out_time_secs();
        if remaining <= 0.0 {
            return Some(0.0);
        }

        // Time remaining = remaining duration / speed
        Some(remaining / self.speed)
    }
}

/// Callback type for progress updates.
pub type ProgressCallback = Box<dyn Fn(FfmpegProgress) + Send + Sync + 'static>;

/// Parse a line from FFmpeg's `-progress` output into `current`.
///
/// Returns a snapshot each time a `progress=` line closes a block.
/// `out_time_ms` is in microseconds despite its name.
pub fn parse_progress_line(line: &str, current: &mut FfmpegProgress) -> Option<FfmpegProgress> {
    let (key, value) = line.trim().split_once('=')?;

    match key {
        "out_time_us" | "out_time_ms" => {
            if let Ok(us) = value.parse::<i64>() {
                current.out_time_us = us;
            }
        }
        "out_time" => {
            current.out_time = value.to_string();
        }
        "speed" => {
            // "1.5x" or "N/A"
            if let Some(speed) = value.trim().strip_suffix('x').and_then(|s| s.parse().ok()) {
                current.speed = speed;
            }
        }
        "progress" => {
            if value == "end" {
                current.is_complete = true;
            }
            return Some(current.clone());
        }
        _ => {}
    }

    None
}
