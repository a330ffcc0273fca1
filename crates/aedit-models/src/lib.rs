//! Shared data models for the audio edit engine.
//!
//! This crate provides Serde-serializable types for:
//! - Raw edit requests and their validated plans
//! - Silence windows and keep segments
//! - Filter stages handed to the transcoding engine
//! - Verification reports
//! - Jobs and progress events
//!
//! All time values are seconds on a 1e-6 grid (see [`precision`]).

pub mod encoding;
pub mod filter;
pub mod job;
pub mod normalize;
pub mod plan;
pub mod precision;
pub mod progress;
pub mod request;
pub mod segment;
pub mod verification;

// Re-export common types
pub use encoding::AudioEncoding;
pub use filter::{FadeDirection, FilterKind, FilterStage};
pub use job::{JobId, JobState};
pub use normalize::{check_kept_fades, normalize, RequestNormalizer, ValidationError, ValidationResult};
pub use plan::{EditMode, EditPlan, RegionPlan, SegmentPlan, SilenceDefaults, SilenceParams};
pub use progress::{ProgressEvent, ProgressStage};
pub use request::{EditRequest, RegionRequest, SilenceRequest};
pub use segment::{KeepSegment, SilenceWindow};
pub use verification::{
    DiagnosticKind, SegmentDiagnostic, VerificationReport, VerificationStatus,
};
