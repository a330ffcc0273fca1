//! End-to-end edit pipeline.
//!
//! ```text
//! probe ─► normalize ─► detect silence ─► keep segments ─► filter graph
//!                                                              │
//!                       report ◄─ verify ◄─ publish ◄─ transcode
//! ```
//!
//! Validation and empty-result checks run before the transcoding
//! subprocess is spawned.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

use aedit_media::silence_removal::compute_segment_stats;
use aedit_media::{
    compute_keep_segments, detect_silence, FfmpegRunner, FfprobeProbe, FilterGraphBuilder,
    MediaProbe, OutputVerifier, Transcoder,
};
use aedit_models::{
    check_kept_fades, EditMode, EditPlan, EditRequest, JobId, JobState, RequestNormalizer,
    VerificationReport,
};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::executor::ProcessingExecutor;
use crate::logging::JobLogger;
use crate::metrics;
use crate::progress::{self, ProgressReceiver, ProgressSender};
use crate::registry::JobRegistry;

/// Result of a finished edit.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditOutcome {
    pub job_id: JobId,
    pub output_path: PathBuf,
    pub plan: EditPlan,
    pub report: VerificationReport,
}

/// A submitted job.
pub struct JobHandle {
    pub job_id: JobId,
    events: Option<ProgressReceiver>,
    task: JoinHandle<WorkerResult<EditOutcome>>,
}

impl JobHandle {
    /// Take the progress stream. Only the first call returns it.
    pub fn events(&mut self) -> Option<ProgressReceiver> {
        self.events.take()
    }

    /// Wait for the job to finish.
    pub async fn wait(self) -> WorkerResult<EditOutcome> {
        self.task
            .await
            .map_err(|e| WorkerError::processing(format!("job task failed: {}", e)))?
    }
}

/// Runs edit requests end to end.
#[derive(Clone)]
pub struct EditPipeline {
    config: Arc<WorkerConfig>,
    executor: ProcessingExecutor,
    probe: Arc<dyn MediaProbe>,
    normalizer: RequestNormalizer,
    verifier: Arc<OutputVerifier>,
}

impl EditPipeline {
    /// Pipeline backed by the `ffmpeg` and `ffprobe` binaries.
    pub fn new(config: WorkerConfig) -> Self {
        let runner = FfmpegRunner::new().with_timeout(config.job_timeout.as_secs());
        Self::with_engine(config, Arc::new(runner), Arc::new(FfprobeProbe))
    }

    /// Pipeline with explicit engine collaborators.
    pub fn with_engine(
        config: WorkerConfig,
        transcoder: Arc<dyn Transcoder>,
        probe: Arc<dyn MediaProbe>,
    ) -> Self {
        let verifier = OutputVerifier::new(probe.clone(), config.verifier_config());
        Self {
            normalizer: RequestNormalizer::new(config.silence_defaults),
            executor: ProcessingExecutor::new(transcoder, JobRegistry::new()),
            verifier: Arc::new(verifier),
            probe,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn registry(&self) -> &JobRegistry {
        self.executor.registry()
    }

    /// Run one job to completion on the current task.
    ///
    /// The job is registered under the sender's job id.
    pub async fn run(
        &self,
        request: &EditRequest,
        input: &Path,
        output: &Path,
        progress: &ProgressSender,
    ) -> WorkerResult<EditOutcome> {
        let cancel = self.registry().register(progress.job_id()).await;
        self.execute(request, input, output, progress, cancel).await
    }

    /// Register a job and run it in the background.
    pub async fn submit(
        &self,
        request: EditRequest,
        input: PathBuf,
        output: PathBuf,
    ) -> JobHandle {
        let job_id = JobId::new();
        let (tx, rx) = progress::channel(job_id.clone());
        let cancel = self.registry().register(&job_id).await;

        let pipeline = self.clone();
        let task = tokio::spawn(async move {
            pipeline
                .execute(&request, &input, &output, &tx, cancel)
                .await
        });

        JobHandle {
            job_id,
            events: Some(rx),
            task,
        }
    }

    /// Request cancellation of a queued or running job.
    pub async fn cancel(&self, job_id: &JobId) -> WorkerResult<JobState> {
        self.registry().cancel(job_id).await
    }

    async fn execute(
        &self,
        request: &EditRequest,
        input: &Path,
        output: &Path,
        progress: &ProgressSender,
        cancel: watch::Receiver<bool>,
    ) -> WorkerResult<EditOutcome> {
        let job_id = progress.job_id().clone();
        let mode = request_mode(request);
        self.executor
            .run_job(
                &job_id,
                mode.as_str(),
                progress,
                self.process(&job_id, request, input, output, progress, cancel),
            )
            .await
    }

    async fn process(
        &self,
        job_id: &JobId,
        request: &EditRequest,
        input: &Path,
        output: &Path,
        progress: &ProgressSender,
        cancel: watch::Receiver<bool>,
    ) -> WorkerResult<EditOutcome> {
        let logger = JobLogger::new(job_id, "edit");

        let info = self.probe.probe(input).await?;
        let mut plan = self.normalizer.normalize(request, info.duration)?;
        logger.log_progress(&format!(
            "{} plan over {:.3}s source",
            plan.mode().as_str(),
            plan.source_duration_seconds
        ));

        if let Some(silence) = plan.silence.clone() {
            let windows = match &silence.windows {
                Some(windows) => windows.clone(),
                None => {
                    progress.detecting("Detecting silence");
                    detect_silence(
                        self.executor.transcoder().as_ref(),
                        input,
                        &silence,
                        plan.source_duration_seconds,
                        cancel.clone(),
                    )
                    .await?
                }
            };

            let segments = compute_keep_segments(&windows, &silence)?;
            let stats = compute_segment_stats(&segments);
            info!(
                job_id = %job_id,
                segments = stats.keep_count,
                cuts = stats.cut_count,
                keep_seconds = stats.keep_duration,
                cut_seconds = stats.cut_duration,
                "Computed keep segments ({:.1}% kept)",
                stats.keep_ratio * 100.0
            );
            plan = plan.with_segments(segments);
            check_kept_fades(&plan)?;
        }

        let graph = FilterGraphBuilder::new().build(&plan)?;

        self.executor
            .transcode(
                &graph,
                input,
                output,
                &self.config.encoding,
                info.sample_rate,
                progress,
                cancel,
            )
            .await?;

        progress.verifying("Verifying output");
        let report = match self.verifier.verify(&plan, &graph, output).await {
            Ok(report) => report,
            Err(e) => {
                // No report means no usable result.
                if let Err(rm) = tokio::fs::remove_file(output).await {
                    logger.log_warning(&format!("could not remove unverified output: {}", rm));
                }
                return Err(e.into());
            }
        };

        metrics::record_verification(report.status.as_str());
        logger.log_verification(&report);

        Ok(EditOutcome {
            job_id: job_id.clone(),
            output_path: output.to_path_buf(),
            plan,
            report,
        })
    }
}

/// Mode label for a request that has not been validated yet.
fn request_mode(request: &EditRequest) -> EditMode {
    if !request.regions.is_empty() {
        EditMode::Regions
    } else if request.silence.is_some() {
        EditMode::SilenceRemoval
    } else if request.invert {
        EditMode::Invert
    } else {
        EditMode::Trim
    }
}
