//! Per-job progress channel.
//!
//! Each job gets its own [`ProgressSender`] / [`ProgressReceiver`] pair.
//! The sender enforces the stream contract: percent never decreases and
//! nothing follows a terminal event. The receiver side forwards events to a
//! [`ProgressReporter`], the seam to whatever transport the caller uses.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use aedit_models::{JobId, ProgressEvent, ProgressStage};

/// Percent reported when the subprocess starts.
pub const PROCESSING_START_PERCENT: u8 = 5;
/// Highest percent reported while the subprocess runs.
pub const PROCESSING_END_PERCENT: u8 = 95;

/// Map engine output time onto the `[5, 95]` processing band.
pub fn processing_percent(out_time_secs: f64, expected_output_secs: f64) -> u8 {
    let start = PROCESSING_START_PERCENT as f64;
    let end = PROCESSING_END_PERCENT as f64;
    if !(expected_output_secs > 0.0) || !out_time_secs.is_finite() {
        return PROCESSING_START_PERCENT;
    }
    let ratio = (out_time_secs / expected_output_secs).clamp(0.0, 1.0);
    (start + (end - start) * ratio).round().clamp(start, end) as u8
}

/// Sink for a job's progress events.
#[async_trait]
pub trait ProgressReporter: Send + Sync {
    async fn report(&self, event: &ProgressEvent);
}

/// Reporter that logs every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

#[async_trait]
impl ProgressReporter for TracingReporter {
    async fn report(&self, event: &ProgressEvent) {
        match event.stage {
            ProgressStage::Error => warn!(
                job_id = %event.job_id,
                stage = %event.stage,
                percent = event.percent,
                "{}", event.message
            ),
            _ => info!(
                job_id = %event.job_id,
                stage = %event.stage,
                percent = event.percent,
                time_remaining = ?event.time_remaining,
                "{}", event.message
            ),
        }
    }
}

#[derive(Debug, Default)]
struct StreamState {
    last_percent: u8,
    terminated: bool,
}

/// Sending half of a job's progress channel.
#[derive(Debug, Clone)]
pub struct ProgressSender {
    job_id: JobId,
    tx: mpsc::UnboundedSender<ProgressEvent>,
    state: Arc<Mutex<StreamState>>,
}

/// Receiving half of a job's progress channel.
#[derive(Debug)]
pub struct ProgressReceiver {
    rx: mpsc::UnboundedReceiver<ProgressEvent>,
}

/// Create the progress channel for one job.
///
/// Unbounded so the terminal event is never dropped.
pub fn channel(job_id: JobId) -> (ProgressSender, ProgressReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        ProgressSender {
            job_id,
            tx,
            state: Arc::new(Mutex::new(StreamState::default())),
        },
        ProgressReceiver { rx },
    )
}

impl ProgressSender {
    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    /// Whether a terminal event has been sent.
    pub fn is_terminated(&self) -> bool {
        self.state.lock().map(|s| s.terminated).unwrap_or(true)
    }

    /// Send one event. Returns false if the stream already ended.
    ///
    /// Percent is raised to the last sent value when lower.
    pub fn emit(
        &self,
        stage: ProgressStage,
        percent: u8,
        message: impl Into<String>,
        time_remaining: Option<f64>,
    ) -> bool {
        let Ok(mut state) = self.state.lock() else {
            return false;
        };
        if state.terminated {
            debug!(job_id = %self.job_id, stage = %stage, "Dropping event after terminal event");
            return false;
        }

        let percent = percent.min(100).max(state.last_percent);
        state.last_percent = percent;
        state.terminated = stage.is_terminal();

        let event = ProgressEvent::new(self.job_id.clone(), stage, percent, message)
            .with_time_remaining(time_remaining);
        // Sent under the lock so clones cannot reorder events.
        if self.tx.send(event).is_err() {
            debug!(job_id = %self.job_id, "Progress receiver dropped");
        }
        true
    }

    pub fn initializing(&self, message: impl Into<String>) -> bool {
        self.emit(ProgressStage::Initializing, 0, message, None)
    }

    pub fn detecting(&self, message: impl Into<String>) -> bool {
        self.emit(ProgressStage::Detecting, 2, message, None)
    }

    pub fn processing(
        &self,
        percent: u8,
        message: impl Into<String>,
        time_remaining: Option<f64>,
    ) -> bool {
        let percent = percent.clamp(PROCESSING_START_PERCENT, PROCESSING_END_PERCENT);
        self.emit(ProgressStage::Processing, percent, message, time_remaining)
    }

    pub fn verifying(&self, message: impl Into<String>) -> bool {
        self.emit(ProgressStage::Verifying, 97, message, None)
    }

    pub fn complete(&self, message: impl Into<String>) -> bool {
        self.emit(ProgressStage::Complete, 100, message, None)
    }

    pub fn error(&self, message: impl Into<String>) -> bool {
        self.emit(ProgressStage::Error, 0, message, None)
    }

    pub fn cancelled(&self, message: impl Into<String>) -> bool {
        self.emit(ProgressStage::Cancelled, 0, message, None)
    }
}

impl ProgressReceiver {
    pub async fn recv(&mut self) -> Option<ProgressEvent> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<ProgressEvent> {
        self.rx.try_recv().ok()
    }

    /// Everything buffered right now.
    pub fn drain(&mut self) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.try_recv() {
            events.push(event);
        }
        events
    }

    /// Forward events to `reporter` until the terminal event or until every
    /// sender is gone. Resolves to the number of events forwarded.
    pub fn forward_to(mut self, reporter: Arc<dyn ProgressReporter>) -> JoinHandle<usize> {
        tokio::spawn(async move {
            let mut forwarded = 0;
            while let Some(event) = self.recv().await {
                reporter.report(&event).await;
                forwarded += 1;
                if event.stage.is_terminal() {
                    break;
                }
            }
            forwarded
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_processing_percent_band() {
        assert_eq!(processing_percent(0.0, 100.0), 5);
        assert_eq!(processing_percent(50.0, 100.0), 50);
        assert_eq!(processing_percent(100.0, 100.0), 95);
        assert_eq!(processing_percent(250.0, 100.0), 95);
        assert_eq!(processing_percent(10.0, 0.0), 5);
        assert_eq!(processing_percent(f64::NAN, 10.0), 5);
    }

    #[test]
    fn test_percent_never_decreases() {
        let (tx, mut rx) = channel(JobId::from_string("job-1"));
        tx.initializing("start");
        tx.processing(40, "tick", Some(3.0));
        tx.processing(20, "late tick", None);
        tx.verifying("checking");

        let percents: Vec<u8> = rx.drain().iter().map(|e| e.percent).collect();
        assert_eq!(percents, vec![0, 40, 40, 97]);
    }

    #[test]
    fn test_nothing_after_terminal() {
        let (tx, mut rx) = channel(JobId::new());
        tx.processing(50, "tick", None);
        assert!(tx.error("boom"));
        assert!(!tx.complete("done"));
        assert!(!tx.processing(90, "tick", None));
        assert!(tx.is_terminated());

        let events = rx.drain();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].stage, ProgressStage::Error);
        // Terminal failure keeps the last percent.
        assert_eq!(events[1].percent, 50);
    }

    #[test]
    fn test_processing_is_clamped_to_band() {
        let (tx, mut rx) = channel(JobId::new());
        tx.processing(0, "start", None);
        tx.processing(100, "end", None);
        let percents: Vec<u8> = rx.drain().iter().map(|e| e.percent).collect();
        assert_eq!(percents, vec![5, 95]);
    }

    #[test]
    fn test_clones_share_stream_state() {
        let (tx, mut rx) = channel(JobId::new());
        let other = tx.clone();
        other.processing(60, "tick", None);
        tx.processing(30, "tick", None);
        other.cancelled("stop");
        assert!(!tx.complete("done"));

        let events = rx.drain();
        assert_eq!(events.len(), 3);
        assert_eq!(events[1].percent, 60);
        assert_eq!(events[2].stage, ProgressStage::Cancelled);
    }

    struct CountingReporter(Arc<Mutex<Vec<ProgressStage>>>);

    #[async_trait]
    impl ProgressReporter for CountingReporter {
        async fn report(&self, event: &ProgressEvent) {
            self.0.lock().unwrap().push(event.stage);
        }
    }

    #[tokio::test]
    async fn test_forward_stops_at_terminal() {
        let (tx, rx) = channel(JobId::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let handle = rx.forward_to(Arc::new(CountingReporter(seen.clone())));

        tx.initializing("start");
        tx.processing(10, "tick", None);
        tx.complete("done");

        let forwarded = handle.await.unwrap();
        assert_eq!(forwarded, 3);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                ProgressStage::Initializing,
                ProgressStage::Processing,
                ProgressStage::Complete
            ]
        );
    }

    #[tokio::test]
    async fn test_tracing_reporter_accepts_all_stages() {
        let reporter = TracingReporter;
        let event = ProgressEvent::new(JobId::new(), ProgressStage::Error, 10, "failed");
        reporter.report(&event).await;
    }
}
