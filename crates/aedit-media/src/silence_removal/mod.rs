//! Silence removal: detection pass plus keep-segment algebra.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐    ┌────────────────┐    ┌────────────────┐
//! │ Audio Input  │───►│ silencedetect  │───►│ SegmentAlgebra │
//! │ (region)     │    │ (raw windows)  │    │ (merge / keep) │
//! └──────────────┘    └────────────────┘    └────────────────┘
//!                                                   │
//!                                                   ▼
//!                                           ┌────────────────┐
//!                                           │ FilterGraph    │
//!                                           │ (atrim+concat) │
//!                                           └────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use aedit_media::silence_removal::{compute_keep_segments, detect_silence};
//!
//! let windows = detect_silence(&runner, &input, &params, duration, cancel_rx).await?;
//! let segments = compute_keep_segments(&windows, &params)?;
//! ```

mod detect;
mod segments;

pub use detect::{
    build_detect_command, detect_silence, parse_silencedetect_output, silencedetect_filter,
};
pub use segments::{compute_keep_segments, compute_segment_stats, SegmentAlgebra, SegmentStats};
