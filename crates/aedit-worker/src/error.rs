//! Worker error types.

use thiserror::Error;

use aedit_media::MediaError;
use aedit_models::{JobState, ValidationError};

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Nothing left to keep in [{region_start}, {region_end}) after silence removal")]
    EmptyResult { region_start: f64, region_end: f64 },

    #[error("Processing failed: {0}")]
    Processing(String),

    #[error("Job cancelled")]
    Cancelled,

    #[error("Job {job_id} cannot move from {from} to {to}")]
    InvalidTransition {
        job_id: String,
        from: JobState,
        to: JobState,
    },

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<MediaError> for WorkerError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::Cancelled => WorkerError::Cancelled,
            MediaError::EmptyResult {
                region_start,
                region_end,
            } => WorkerError::EmptyResult {
                region_start,
                region_end,
            },
            MediaError::FfmpegFailed {
                message,
                stderr: Some(stderr),
                ..
            } => WorkerError::Processing(format!("{}: {}", message, stderr)),
            other => WorkerError::Processing(other.to_string()),
        }
    }
}

impl WorkerError {
    pub fn processing(msg: impl Into<String>) -> Self {
        Self::Processing(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Message suitable for the end user.
    pub fn user_message(&self) -> String {
        match self {
            WorkerError::Validation(e) => format!("Invalid {}: {}", e.field, e.message),
            WorkerError::EmptyResult { .. } => {
                "Silence removal would remove all audio in the selected region".to_string()
            }
            WorkerError::Cancelled => "The edit was cancelled. Please try again.".to_string(),
            _ => "Audio processing failed. Please try again.".to_string(),
        }
    }

    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WorkerError::Processing(_) | WorkerError::Cancelled)
    }

    /// Stable label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            WorkerError::Validation(_) => "validation",
            WorkerError::EmptyResult { .. } => "empty_result",
            WorkerError::Processing(_) => "processing",
            WorkerError::Cancelled => "cancelled",
            WorkerError::InvalidTransition { .. } => "invalid_transition",
            WorkerError::JobNotFound(_) => "job_not_found",
            WorkerError::Config(_) => "config",
            WorkerError::Io(_) => "io",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_errors_are_classified() {
        assert!(matches!(
            WorkerError::from(MediaError::Cancelled),
            WorkerError::Cancelled
        ));
        assert!(matches!(
            WorkerError::from(MediaError::empty_result(0.0, 5.0)),
            WorkerError::EmptyResult { .. }
        ));
        assert!(matches!(
            WorkerError::from(MediaError::FfmpegNotFound),
            WorkerError::Processing(_)
        ));

        let err = WorkerError::from(MediaError::ffmpeg_failed(
            "FFmpeg exited with non-zero status",
            Some("Invalid data found".to_string()),
            Some(1),
        ));
        assert!(err.to_string().contains("Invalid data found"));
    }

    #[test]
    fn test_user_messages() {
        let err = WorkerError::from(ValidationError::new("tempoMultiplier", "must be between 0.25 and 4"));
        assert!(err.user_message().contains("tempoMultiplier"));
        assert!(!err.is_retryable());

        let err = WorkerError::processing("exit 1");
        assert!(err.is_retryable());
        assert!(!err.user_message().contains("exit 1"));

        assert!(WorkerError::Cancelled.is_retryable());
    }
}
