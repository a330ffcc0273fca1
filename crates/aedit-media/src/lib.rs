//! FFmpeg CLI wrapper for audio edits.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building
//! - Progress parsing from `-progress pipe:2`
//! - Cancellation support via tokio
//! - Silence detection and keep-segment algebra
//! - Filter planning (tempo chaining, fades, pitch, volume) and rendering
//! - Output verification against the plan

pub mod command;
pub mod error;
pub mod filters;
pub mod probe;
pub mod progress;
pub mod silence_removal;
pub mod verify;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner, Transcoder};
pub use error::{MediaError, MediaResult};
pub use filters::{
    build_edit_command, chain_tempo, expected_output_duration, FilterGraph, FilterGraphBuilder,
    StageChain,
};
pub use probe::{probe_audio, AudioInfo, FfprobeProbe, MediaProbe};
pub use progress::{FfmpegProgress, ProgressCallback};
pub use silence_removal::{compute_keep_segments, detect_silence, SegmentAlgebra};
pub use verify::{OutputVerifier, VerifierConfig};
