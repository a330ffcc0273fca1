//! Audio edit job worker.
//!
//! This crate provides:
//! - Job executor with the job state machine and atomic output publish
//! - Job registry for cancellation lookup
//! - Per-job progress channels and reporters
//! - The end-to-end edit pipeline
//! - Temp-file sweeper
//! - Metrics and structured job logging

pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod progress;
pub mod registry;
pub mod sweeper;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use executor::ProcessingExecutor;
pub use logging::JobLogger;
pub use pipeline::{EditOutcome, EditPipeline, JobHandle};
pub use progress::{ProgressReceiver, ProgressReporter, ProgressSender, TracingReporter};
pub use registry::JobRegistry;
pub use sweeper::{SweepStats, TempFileSweeper};
