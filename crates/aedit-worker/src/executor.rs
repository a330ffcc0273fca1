//! Processing executor.
//!
//! Owns the job state machine around one edit and drives the transcoding
//! subprocess through the [`Transcoder`] seam. Output is rendered into a
//! temp file beside the destination and renamed into place only on success.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::watch;
use tracing::{debug, Instrument};

use aedit_media::{build_edit_command, FfmpegProgress, FilterGraph, Transcoder};
use aedit_models::precision::format_seconds;
use aedit_models::{AudioEncoding, JobId, JobState};

use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::metrics;
use crate::progress::{processing_percent, ProgressSender, PROCESSING_START_PERCENT};
use crate::registry::JobRegistry;

/// Prefix of temp outputs. The sweeper only deletes files carrying it.
pub const TEMP_OUTPUT_PREFIX: &str = ".aedit-";

/// Executes jobs against a transcoder.
#[derive(Clone)]
pub struct ProcessingExecutor {
    transcoder: Arc<dyn Transcoder>,
    registry: JobRegistry,
}

impl ProcessingExecutor {
    pub fn new(transcoder: Arc<dyn Transcoder>, registry: JobRegistry) -> Self {
        Self {
            transcoder,
            registry,
        }
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    pub fn transcoder(&self) -> &Arc<dyn Transcoder> {
        &self.transcoder
    }

    /// Run `work` as the body of a registered job.
    ///
    /// Moves the job to `Running`, awaits `work`, then records the terminal
    /// state and sends the terminal progress event. The job must already be
    /// registered.
    pub async fn run_job<T, F>(
        &self,
        job_id: &JobId,
        mode: &str,
        progress: &ProgressSender,
        work: F,
    ) -> WorkerResult<T>
    where
        F: Future<Output = WorkerResult<T>>,
    {
        let logger = JobLogger::new(job_id, "edit");
        progress.initializing("Preparing edit");

        if let Err(e) = self.registry.begin(job_id).await {
            if matches!(e, WorkerError::Cancelled) {
                logger.log_warning("cancelled before start");
                metrics::record_job_cancelled();
                progress.cancelled("Edit cancelled");
            } else {
                progress.error(e.user_message());
            }
            return Err(e);
        }

        logger.log_start(mode);
        metrics::record_job_started(mode);
        let started = Instant::now();

        let result = work.instrument(logger.create_span()).await;

        match &result {
            Ok(_) => {
                if let Err(e) = self.registry.transition(job_id, JobState::Completed).await {
                    logger.log_warning(&format!("completion state not recorded: {}", e));
                }
                let elapsed = started.elapsed();
                metrics::record_job_completed(elapsed.as_secs_f64());
                logger.log_completion(elapsed);
                progress.complete("Edit complete");
            }
            Err(WorkerError::Cancelled) => {
                if let Err(e) = self.registry.transition(job_id, JobState::Cancelled).await {
                    logger.log_warning(&format!("cancel state not recorded: {}", e));
                }
                metrics::record_job_cancelled();
                logger.log_warning("cancelled");
                progress.cancelled("Edit cancelled");
            }
            Err(e) => {
                if let Err(state_err) = self.registry.fail(job_id, e.to_string()).await {
                    logger.log_warning(&format!("failure state not recorded: {}", state_err));
                }
                metrics::record_job_failed(e.kind());
                logger.log_failure(e);
                progress.error(e.user_message());
            }
        }

        result
    }

    /// Render `graph` from `input` into `output`.
    ///
    /// Progress ticks map onto the `[5, 95]` band. On any error the temp
    /// file is removed and `output` is left untouched.
    #[allow(clippy::too_many_arguments)]
    pub async fn transcode(
        &self,
        graph: &FilterGraph,
        input: &Path,
        output: &Path,
        encoding: &AudioEncoding,
        sample_rate: u32,
        progress: &ProgressSender,
        cancel: watch::Receiver<bool>,
    ) -> WorkerResult<()> {
        if *cancel.borrow() {
            return Err(WorkerError::Cancelled);
        }

        let dir = output
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let suffix = output
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();
        self.registry.record_temp_dir(dir).await;
        let temp = tempfile::Builder::new()
            .prefix(TEMP_OUTPUT_PREFIX)
            .suffix(&suffix)
            .tempfile_in(dir)?;

        let cmd = build_edit_command(graph, input, temp.path(), encoding, sample_rate);
        debug!(
            job_id = %progress.job_id(),
            temp = %temp.path().display(),
            chains = graph.chains.len(),
            "Starting transcode"
        );

        progress.processing(PROCESSING_START_PERCENT, "Transcoding started", None);

        let expected = graph.output_duration;
        let sender = progress.clone();
        let on_progress = Box::new(move |p: FfmpegProgress| {
            let out_time = p.out_time_secs();
            sender.processing(
                processing_percent(out_time, expected),
                format!("Processed {}", format_seconds(out_time)),
                p.eta_seconds(expected),
            );
        });

        // Dropping `temp` on the error path deletes the partial file.
        self.transcoder.transcode(&cmd, cancel, on_progress).await?;

        let written = tokio::fs::metadata(temp.path()).await?.len();
        if written == 0 {
            return Err(WorkerError::processing("engine produced no output"));
        }

        temp.persist(output).map_err(|e| WorkerError::Io(e.error))?;
        debug!(output = %output.display(), bytes = written, "Output published");
        Ok(())
    }
}
