//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur during media processing.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    /// Silence removal left nothing to keep inside the region.
    #[error("No audio remains in region [{region_start}, {region_end}) after silence removal")]
    EmptyResult { region_start: f64, region_end: f64 },

    #[error("Invalid edit plan: {0}")]
    InvalidPlan(String),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Invalid audio file: {0}")]
    InvalidAudio(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MediaError {
    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    pub fn empty_result(region_start: f64, region_end: f64) -> Self {
        Self::EmptyResult {
            region_start,
            region_end,
        }
    }

    pub fn invalid_plan(message: impl Into<String>) -> Self {
        Self::InvalidPlan(message.into())
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether the error came from a cancellation request.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, MediaError::Cancelled)
    }
}
