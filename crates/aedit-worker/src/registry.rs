//! Process-wide job registry.
//!
//! Maps job ids to their state and cancellation flag. Locks are held only
//! for lookups, inserts and removals, never across a subprocess wait.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{watch, RwLock};
use tracing::{debug, info};

use aedit_models::{JobId, JobState};

use crate::error::{WorkerError, WorkerResult};

#[derive(Debug)]
struct JobEntry {
    state: JobState,
    cancel_tx: watch::Sender<bool>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    error: Option<String>,
}

/// Snapshot of one registered job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobSnapshot {
    pub job_id: JobId,
    pub state: JobState,
    pub cancel_requested: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub error: Option<String>,
}

/// Shared job registry.
#[derive(Debug, Clone, Default)]
pub struct JobRegistry {
    jobs: Arc<RwLock<HashMap<JobId, JobEntry>>>,
    temp_dirs: Arc<RwLock<BTreeSet<PathBuf>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job in `Queued` and return its cancellation flag.
    ///
    /// Re-registering an id replaces the previous entry.
    pub async fn register(&self, job_id: &JobId) -> watch::Receiver<bool> {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let now = Utc::now();
        let entry = JobEntry {
            state: JobState::Queued,
            cancel_tx,
            created_at: now,
            updated_at: now,
            error: None,
        };
        self.jobs.write().await.insert(job_id.clone(), entry);
        debug!(job_id = %job_id, "Job registered");
        cancel_rx
    }

    /// Move a queued job to `Running`.
    ///
    /// Fails with [`WorkerError::Cancelled`] when cancellation already won.
    pub async fn begin(&self, job_id: &JobId) -> WorkerResult<()> {
        let mut jobs = self.jobs.write().await;
        let entry = jobs
            .get_mut(job_id)
            .ok_or_else(|| WorkerError::JobNotFound(job_id.to_string()))?;

        if entry.state == JobState::Cancelled || *entry.cancel_tx.borrow() {
            return Err(WorkerError::Cancelled);
        }
        apply(job_id, entry, JobState::Running)
    }

    /// Validated state transition.
    pub async fn transition(&self, job_id: &JobId, next: JobState) -> WorkerResult<()> {
        let mut jobs = self.jobs.write().await;
        let entry = jobs
            .get_mut(job_id)
            .ok_or_else(|| WorkerError::JobNotFound(job_id.to_string()))?;
        apply(job_id, entry, next)
    }

    /// Mark a job `Failed` and keep the reason.
    pub async fn fail(&self, job_id: &JobId, reason: impl Into<String>) -> WorkerResult<()> {
        let mut jobs = self.jobs.write().await;
        let entry = jobs
            .get_mut(job_id)
            .ok_or_else(|| WorkerError::JobNotFound(job_id.to_string()))?;
        apply(job_id, entry, JobState::Failed)?;
        entry.error = Some(reason.into());
        Ok(())
    }

    /// Request cancellation.
    ///
    /// A queued job is cancelled immediately. A running job gets its flag
    /// raised; the executor reports `Cancelled` once the subprocess is gone.
    pub async fn cancel(&self, job_id: &JobId) -> WorkerResult<JobState> {
        let mut jobs = self.jobs.write().await;
        let entry = jobs
            .get_mut(job_id)
            .ok_or_else(|| WorkerError::JobNotFound(job_id.to_string()))?;

        if entry.state.is_terminal() {
            return Err(WorkerError::InvalidTransition {
                job_id: job_id.to_string(),
                from: entry.state,
                to: JobState::Cancelled,
            });
        }

        entry.cancel_tx.send_replace(true);
        if entry.state == JobState::Queued {
            apply(job_id, entry, JobState::Cancelled)?;
        }
        info!(job_id = %job_id, state = %entry.state, "Cancellation requested");
        Ok(entry.state)
    }

    pub async fn state(&self, job_id: &JobId) -> Option<JobState> {
        self.jobs.read().await.get(job_id).map(|e| e.state)
    }

    pub async fn snapshot(&self, job_id: &JobId) -> Option<JobSnapshot> {
        self.jobs.read().await.get(job_id).map(|e| JobSnapshot {
            job_id: job_id.clone(),
            state: e.state,
            cancel_requested: *e.cancel_tx.borrow(),
            created_at: e.created_at,
            updated_at: e.updated_at,
            error: e.error.clone(),
        })
    }

    /// Drop terminal jobs last updated at least `max_age` ago.
    pub async fn prune_finished(&self, max_age: Duration) -> usize {
        let cutoff = chrono::Duration::from_std(max_age)
            .ok()
            .and_then(|age| Utc::now().checked_sub_signed(age));
        let Some(cutoff) = cutoff else {
            return 0;
        };
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|_, e| !(e.state.is_terminal() && e.updated_at <= cutoff));
        before - jobs.len()
    }

    /// Number of jobs not yet terminal.
    pub async fn active_count(&self) -> usize {
        self.jobs
            .read()
            .await
            .values()
            .filter(|e| !e.state.is_terminal())
            .count()
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }

    /// Remember a directory that has held a temp output.
    pub async fn record_temp_dir(&self, dir: &Path) {
        if self.temp_dirs.read().await.contains(dir) {
            return;
        }
        if self.temp_dirs.write().await.insert(dir.to_path_buf()) {
            debug!(dir = %dir.display(), "Tracking temp output directory");
        }
    }

    /// Directories recorded by [`record_temp_dir`](Self::record_temp_dir).
    pub async fn temp_dirs(&self) -> Vec<PathBuf> {
        self.temp_dirs.read().await.iter().cloned().collect()
    }
}

fn apply(job_id: &JobId, entry: &mut JobEntry, next: JobState) -> WorkerResult<()> {
    if !entry.state.can_transition_to(next) {
        return Err(WorkerError::InvalidTransition {
            job_id: job_id.to_string(),
            from: entry.state,
            to: next,
        });
    }
    debug!(job_id = %job_id, from = %entry.state, to = %next, "Job state change");
    entry.state = next;
    entry.updated_at = Utc::now();
    Ok(())
}
