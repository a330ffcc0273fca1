//! Background removal of stale temp files.
//!
//! Runs on a fixed schedule, independent of any job. Each pass deletes
//! temp outputs whose modification age has reached the TTL and prunes
//! finished jobs from the registry. Only files named with
//! [`TEMP_OUTPUT_PREFIX`] are touched. Scanned directories are the work
//! directory plus every directory the executor has rendered into.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::WorkerConfig;
use crate::error::WorkerResult;
use crate::executor::TEMP_OUTPUT_PREFIX;
use crate::metrics;
use crate::registry::JobRegistry;

/// Counts from one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub scanned: usize,
    pub removed: usize,
    pub failed: usize,
    pub jobs_pruned: usize,
}

/// Temp-file sweeper service.
#[derive(Debug, Clone)]
pub struct TempFileSweeper {
    dir: PathBuf,
    ttl: Duration,
    interval: Duration,
    registry: Option<JobRegistry>,
}

impl TempFileSweeper {
    pub fn new(dir: impl Into<PathBuf>, ttl: Duration, interval: Duration) -> Self {
        Self {
            dir: dir.into(),
            ttl,
            interval,
            registry: None,
        }
    }

    pub fn from_config(config: &WorkerConfig) -> Self {
        Self::new(&config.work_dir, config.file_ttl, config.sweep_interval)
    }

    /// Also prune finished jobs older than the TTL.
    pub fn with_registry(mut self, registry: JobRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Sweep on every tick until `shutdown` flips to true.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            dir = %self.dir.display(),
            "Starting temp file sweeper (interval: {:?}, ttl: {:?})",
            self.interval, self.ttl
        );

        let mut ticker = interval(self.interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Temp file sweeper stopped");
                        return;
                    }
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep_once().await {
                        error!("Temp file sweep error: {}", e);
                    }
                }
            }
        }
    }

    /// Run a single sweep.
    pub async fn sweep_once(&self) -> WorkerResult<SweepStats> {
        let mut stats = SweepStats::default();

        if let Some(registry) = &self.registry {
            stats.jobs_pruned = registry.prune_finished(self.ttl).await;
        }

        let mut dirs = vec![self.dir.clone()];
        if let Some(registry) = &self.registry {
            for dir in registry.temp_dirs().await {
                if !dirs.contains(&dir) {
                    dirs.push(dir);
                }
            }
        }

        let now = SystemTime::now();
        for dir in &dirs {
            if let Err(e) = self.sweep_dir(dir, now, &mut stats).await {
                warn!(dir = %dir.display(), "Temp file sweep of directory failed: {}", e);
            }
        }

        if stats.removed > 0 || stats.jobs_pruned > 0 {
            info!(
                scanned = stats.scanned,
                removed = stats.removed,
                failed = stats.failed,
                jobs_pruned = stats.jobs_pruned,
                "Temp file sweep finished"
            );
        }
        metrics::record_temp_files_swept(stats.removed as u64);
        Ok(stats)
    }

    async fn sweep_dir(
        &self,
        dir: &Path,
        now: SystemTime,
        stats: &mut SweepStats,
    ) -> WorkerResult<()> {
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(dir = %dir.display(), "Directory missing, nothing to sweep");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            if !entry
                .file_name()
                .to_string_lossy()
                .starts_with(TEMP_OUTPUT_PREFIX)
            {
                continue;
            }
            let metadata = match entry.metadata().await {
                Ok(m) => m,
                // Removed between listing and stat.
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            if !metadata.is_file() {
                continue;
            }
            stats.scanned += 1;

            let age = metadata
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .unwrap_or_default();
            if age < self.ttl {
                continue;
            }

            let path = entry.path();
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    stats.removed += 1;
                    debug!(path = %path.display(), "Removed stale temp file");
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    stats.failed += 1;
                    warn!(path = %path.display(), "Failed to remove temp file: {}", e);
                }
            }
        }
        Ok(())
    }
}
