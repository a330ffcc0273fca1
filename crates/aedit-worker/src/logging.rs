//! Structured job logging.
//!
//! Every line carries the job id and the operation so one job can be
//! followed through the executor and the pipeline.

use std::time::Duration;

use tracing::{error, info, warn, Span};

use aedit_models::{JobId, VerificationReport};

use crate::error::WorkerError;

/// Job-scoped logger.
///
/// Cheap to clone. Holds no subscriber state, so it is safe to build one
/// per job even when nothing is listening.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    operation: String,
}

impl JobLogger {
    /// Create a logger for a job and operation (`"edit"`, `"detect"`).
    pub fn new(job_id: &JobId, operation: &str) -> Self {
        Self {
            job_id: job_id.as_str().to_string(),
            operation: operation.to_string(),
        }
    }

    /// The job has left the queue and is running in `mode`.
    pub fn log_start(&self, mode: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            mode,
            "Edit started"
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Edit progress: {}", message
        );
    }

    /// Something went wrong that did not fail the job.
    pub fn log_warning(&self, message: &str) {
        warn!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Edit warning: {}", message
        );
    }

    /// Log a terminal failure with its kind, so failures can be grouped
    /// without parsing the message.
    pub fn log_failure(&self, err: &WorkerError) {
        error!(
            job_id = %self.job_id,
            operation = %self.operation,
            kind = err.kind(),
            retryable = err.is_retryable(),
            "Edit failed: {}", err
        );
    }

    pub fn log_completion(&self, elapsed: Duration) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            elapsed_secs = elapsed.as_secs_f64(),
            "Edit completed in {:.2}s", elapsed.as_secs_f64()
        );
    }

    /// Log a verification report. A failed check is a warning, not an
    /// error: the output still exists and the report is returned.
    pub fn log_verification(&self, report: &VerificationReport) {
        if report.passed() {
            info!(
                job_id = %self.job_id,
                operation = %self.operation,
                actual = report.actual_duration_seconds,
                delta = report.duration_delta_seconds,
                "Output verified"
            );
        } else {
            warn!(
                job_id = %self.job_id,
                operation = %self.operation,
                expected = report.expected_duration_seconds,
                actual = report.actual_duration_seconds,
                delta = report.duration_delta_seconds,
                tolerance = report.tolerance_seconds,
                "Output duration outside tolerance"
            );
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Span carrying the job fields. Futures instrumented with it tag
    /// every event they emit, including ones from `aedit-media`.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "job",
            job_id = %self.job_id,
            operation = %self.operation
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aedit_models::VerificationStatus;

    #[test]
    fn test_job_logger_creation() {
        let job_id = JobId::new();
        let logger = JobLogger::new(&job_id, "edit");

        assert_eq!(logger.job_id(), job_id.as_str());
        assert_eq!(logger.operation(), "edit");
    }

    #[test]
    fn test_logging_without_subscriber() {
        let logger = JobLogger::new(&JobId::from_string("job-42"), "detect");
        assert_eq!(logger.job_id(), "job-42");

        // No subscriber installed; none of these may panic.
        logger.log_start("silence_removal");
        logger.log_warning("slow");
        logger.log_failure(&WorkerError::processing("exit 1"));
        logger.log_completion(Duration::from_millis(1500));
        logger.log_verification(&VerificationReport {
            expected_duration_seconds: 10.0,
            actual_duration_seconds: 9.5,
            duration_delta_seconds: 0.5,
            keep_segments_expected_total: 10.0,
            keep_segments_actual_total: 10.0,
            segments_delta_seconds: 0.0,
            status: VerificationStatus::Fail,
            tolerance_seconds: 0.05,
            diagnostics: Vec::new(),
        });
        let _span = logger.create_span();
    }
}
