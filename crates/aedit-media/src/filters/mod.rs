//! Filter planning and FFmpeg filter rendering.
//!
//! [`FilterGraphBuilder`] turns a validated plan into a [`FilterGraph`]
//! (ordered stages per source span); [`build_edit_command`] renders that graph
//! as FFmpeg arguments.

mod builder;
mod render;
mod tempo;

pub use builder::{
    expected_output_duration, FilterGraph, FilterGraphBuilder, StageChain, StageParams,
};
pub use render::{
    build_edit_command, pitch_ratio, render_chain, render_filter_complex, render_stage,
};
pub use tempo::{chain_tempo, TEMPO_NOOP_EPSILON};
