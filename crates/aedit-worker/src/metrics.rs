//! Prometheus metrics for the worker.

use std::net::SocketAddr;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::{WorkerError, WorkerResult};

/// Metric names as constants for consistency.
pub mod names {
    // Job lifecycle
    pub const JOBS_STARTED_TOTAL: &str = "aedit_jobs_started_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "aedit_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "aedit_jobs_failed_total";
    pub const JOBS_CANCELLED_TOTAL: &str = "aedit_jobs_cancelled_total";
    pub const JOB_DURATION_SECONDS: &str = "aedit_job_duration_seconds";

    // Verification
    pub const VERIFICATION_TOTAL: &str = "aedit_verification_total";

    // Processing
    pub const FFMPEG_DURATION_SECONDS: &str = "aedit_ffmpeg_duration_seconds";
    pub const TEMP_FILES_SWEPT_TOTAL: &str = "aedit_temp_files_swept_total";
}

/// Install the Prometheus recorder.
///
/// With an address the exporter also serves `/metrics` there.
pub fn init_metrics(addr: Option<SocketAddr>) -> WorkerResult<()> {
    let builder = PrometheusBuilder::new();
    match addr {
        Some(addr) => builder
            .with_http_listener(addr)
            .install()
            .map_err(|e| WorkerError::config(format!("metrics exporter: {}", e))),
        None => builder
            .install_recorder()
            .map(|_| ())
            .map_err(|e| WorkerError::config(format!("metrics recorder: {}", e))),
    }
}

pub fn record_job_started(mode: &str) {
    let labels = [("mode", mode.to_string())];
    counter!(names::JOBS_STARTED_TOTAL, &labels).increment(1);
}

pub fn record_job_completed(duration_secs: f64) {
    counter!(names::JOBS_COMPLETED_TOTAL).increment(1);
    histogram!(names::JOB_DURATION_SECONDS).record(duration_secs);
}

pub fn record_job_failed(kind: &str) {
    let labels = [("kind", kind.to_string())];
    counter!(names::JOBS_FAILED_TOTAL, &labels).increment(1);
}

pub fn record_job_cancelled() {
    counter!(names::JOBS_CANCELLED_TOTAL).increment(1);
}

/// Record a verification outcome (`pass` / `fail`).
pub fn record_verification(status: &str) {
    let labels = [("status", status.to_string())];
    counter!(names::VERIFICATION_TOTAL, &labels).increment(1);
}

pub fn record_temp_files_swept(count: u64) {
    counter!(names::TEMP_FILES_SWEPT_TOTAL).increment(count);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_job_started("trim");
        record_job_completed(1.5);
        record_job_failed("processing");
        record_job_cancelled();
        record_verification("pass");
        record_temp_files_swept(3);
    }

    #[test]
    fn test_names_share_prefix() {
        for name in [
            names::JOBS_STARTED_TOTAL,
            names::JOBS_FAILED_TOTAL,
            names::VERIFICATION_TOTAL,
            names::FFMPEG_DURATION_SECONDS,
        ] {
            assert!(name.starts_with("aedit_"));
        }
    }
}
