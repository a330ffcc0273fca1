//! Progress events streamed to the transport collaborator.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::JobId;

/// Processing stage reported in a progress event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStage {
    /// Job accepted, plan being prepared
    Initializing,
    /// Silence-detection pass running
    Detecting,
    /// Transcoding subprocess running
    Processing,
    /// Output duration being checked
    Verifying,
    /// Output published (terminal)
    Complete,
    /// Job failed (terminal)
    Error,
    /// Job cancelled (terminal)
    Cancelled,
}

impl ProgressStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressStage::Initializing => "initializing",
            ProgressStage::Detecting => "detecting",
            ProgressStage::Processing => "processing",
            ProgressStage::Verifying => "verifying",
            ProgressStage::Complete => "complete",
            ProgressStage::Error => "error",
            ProgressStage::Cancelled => "cancelled",
        }
    }

    /// No event may follow a terminal one.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProgressStage::Complete | ProgressStage::Error | ProgressStage::Cancelled
        )
    }
}

impl fmt::Display for ProgressStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One progress update for a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub job_id: JobId,
    pub stage: ProgressStage,
    /// Percent complete, 0-100
    pub percent: u8,
    pub message: String,
    /// Estimated seconds remaining, when the engine reports a speed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_remaining: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl ProgressEvent {
    pub fn new(
        job_id: JobId,
        stage: ProgressStage,
        percent: u8,
        message: impl Into<String>,
    ) -> Self {
        Self {
            job_id,
            stage,
            percent: percent.min(100),
            message: message.into(),
            time_remaining: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_time_remaining(mut self, secs: Option<f64>) -> Self {
        self.time_remaining = secs;
        self
    }
}
