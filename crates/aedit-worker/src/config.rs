//! Worker configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use aedit_media::verify::{VerifierConfig, DEFAULT_MAX_GAP_SECS};
use aedit_models::verification::DEFAULT_TOLERANCE_SECS;
use aedit_models::{AudioEncoding, SilenceDefaults};

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Work directory for temporary files
    pub work_dir: PathBuf,
    /// Verifier duration tolerance in seconds
    pub duration_tolerance_secs: f64,
    /// Gap between kept spans that the verifier flags
    pub max_segment_gap_secs: f64,
    /// Silence settings used when a request leaves them out
    pub silence_defaults: SilenceDefaults,
    /// Subprocess timeout
    pub job_timeout: Duration,
    /// Age at which temp files are swept
    pub file_ttl: Duration,
    /// Sweeper schedule
    pub sweep_interval: Duration,
    /// Output encoding
    pub encoding: AudioEncoding,
    /// Prometheus exporter address; no exporter when unset
    pub metrics_addr: Option<SocketAddr>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("/tmp/aedit"),
            duration_tolerance_secs: DEFAULT_TOLERANCE_SECS,
            max_segment_gap_secs: DEFAULT_MAX_GAP_SECS,
            silence_defaults: SilenceDefaults::default(),
            job_timeout: Duration::from_secs(3600), // 1 hour
            file_ttl: Duration::from_secs(3600),
            sweep_interval: Duration::from_secs(300),
            encoding: AudioEncoding::default(),
            metrics_addr: None,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let silence = defaults.silence_defaults;

        let mut encoding = AudioEncoding::default();
        if let Ok(codec) = std::env::var("AEDIT_AUDIO_CODEC") {
            encoding = encoding.with_codec(codec);
        }
        if let Ok(bitrate) = std::env::var("AEDIT_AUDIO_BITRATE") {
            encoding = encoding.with_bitrate(bitrate);
        }

        Self {
            work_dir: std::env::var("AEDIT_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            duration_tolerance_secs: env_or(
                "AEDIT_DURATION_TOLERANCE_SECS",
                defaults.duration_tolerance_secs,
            ),
            max_segment_gap_secs: env_or("AEDIT_MAX_SEGMENT_GAP_SECS", defaults.max_segment_gap_secs),
            silence_defaults: SilenceDefaults {
                merge_epsilon_seconds: env_or(
                    "AEDIT_MERGE_EPSILON_SECS",
                    silence.merge_epsilon_seconds,
                ),
                min_segment_seconds: env_or("AEDIT_MIN_SEGMENT_SECS", silence.min_segment_seconds),
                noise_threshold_db: env_or("AEDIT_SILENCE_NOISE_DB", silence.noise_threshold_db),
                min_silence_seconds: env_or("AEDIT_SILENCE_MIN_SECS", silence.min_silence_seconds),
            },
            job_timeout: Duration::from_secs(env_or("AEDIT_JOB_TIMEOUT_SECS", 3600)),
            file_ttl: Duration::from_secs(env_or("AEDIT_FILE_TTL_SECS", 3600)),
            sweep_interval: Duration::from_secs(env_or("AEDIT_SWEEP_INTERVAL_SECS", 300)),
            encoding,
            metrics_addr: std::env::var("AEDIT_METRICS_ADDR")
                .ok()
                .and_then(|s| s.parse().ok()),
        }
    }

    /// Verifier thresholds from this config.
    pub fn verifier_config(&self) -> VerifierConfig {
        VerifierConfig::default()
            .with_tolerance(self.duration_tolerance_secs)
            .with_max_gap(self.max_segment_gap_secs)
    }

    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = dir.into();
        self
    }

    pub fn with_tolerance(mut self, secs: f64) -> Self {
        self.duration_tolerance_secs = secs;
        self
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}
