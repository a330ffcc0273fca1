//! Render a [`FilterGraph`] into FFmpeg arguments.

use std::path::Path;

use aedit_models::encoding::DEFAULT_SAMPLE_RATE;
use aedit_models::precision::snap;
use aedit_models::{AudioEncoding, FilterStage};

use super::builder::{FilterGraph, StageChain};
use super::tempo::chain_tempo;
use crate::command::FfmpegCommand;

/// Label of the final concatenated stream.
const OUTPUT_LABEL: &str = "out";

/// Pitch ratio for a shift in semitones.
pub fn pitch_ratio(semitones: f64) -> f64 {
    2f64.powf(semitones / 12.0)
}

/// FFmpeg filter expression for one stage.
///
/// Pitch is shifted by resampling and then re-timed with `atempo` so the
/// stage leaves duration unchanged.
pub fn render_stage(stage: &FilterStage, sample_rate: u32) -> String {
    match *stage {
        FilterStage::Volume(v) => format!("volume={}", v),
        FilterStage::Tempo(m) => format!("atempo={}", m),
        FilterStage::Fade {
            direction,
            start_seconds,
            duration_seconds,
        } => format!(
            "afade=t={}:st={}:d={}",
            direction.as_str(),
            start_seconds,
            duration_seconds
        ),
        FilterStage::Pitch(semitones) => {
            let shifted_rate = (sample_rate as f64 * pitch_ratio(semitones)).round();
            // Compensate with the ratio that was actually applied.
            let applied = shifted_rate / sample_rate as f64;
            let mut parts = vec![
                format!("asetrate={}", shifted_rate as u64),
                format!("aresample={}", sample_rate),
            ];
            parts.extend(
                chain_tempo(1.0 / applied)
                    .into_iter()
                    .map(|m| format!("atempo={}", m)),
            );
            parts.join(",")
        }
    }
}

/// Comma-joined filter chain for `stages`.
pub fn render_chain(stages: &[FilterStage], sample_rate: u32) -> String {
    stages
        .iter()
        .map(|s| render_stage(s, sample_rate))
        .collect::<Vec<_>>()
        .join(",")
}

/// `-filter_complex` graph that trims, processes and concatenates the chains.
pub fn render_filter_complex(graph: &FilterGraph, sample_rate: u32) -> String {
    let mut parts: Vec<String> = graph
        .chains
        .iter()
        .enumerate()
        .map(|(i, chain)| render_trimmed_chain(i, chain, sample_rate))
        .collect();

    let inputs: String = (0..graph.chains.len()).map(|i| format!("[a{}]", i)).collect();
    if graph.post_stages.is_empty() {
        parts.push(format!(
            "{}concat=n={}:v=0:a=1[{}]",
            inputs,
            graph.chains.len(),
            OUTPUT_LABEL
        ));
    } else {
        parts.push(format!(
            "{}concat=n={}:v=0:a=1[cat]",
            inputs,
            graph.chains.len()
        ));
        parts.push(format!(
            "[cat]{}[{}]",
            render_chain(&graph.post_stages, sample_rate),
            OUTPUT_LABEL
        ));
    }

    parts.join(";")
}

fn render_trimmed_chain(index: usize, chain: &StageChain, sample_rate: u32) -> String {
    let mut filters = format!(
        "[0:a]atrim=start={}:end={},asetpts=PTS-STARTPTS",
        snap(chain.source.start),
        snap(chain.source.end)
    );
    if !chain.stages.is_empty() {
        filters.push(',');
        filters.push_str(&render_chain(&chain.stages, sample_rate));
    }
    filters.push_str(&format!("[a{}]", index));
    filters
}

/// Build the transcode command for `graph`.
///
/// `sample_rate` is the source rate; 0 falls back to the default.
pub fn build_edit_command(
    graph: &FilterGraph,
    input: &Path,
    output: &Path,
    encoding: &AudioEncoding,
    sample_rate: u32,
) -> FfmpegCommand {
    let sample_rate = if sample_rate == 0 {
        DEFAULT_SAMPLE_RATE
    } else {
        sample_rate
    };

    let mut cmd = FfmpegCommand::new(input, output);

    cmd = if graph.is_single_chain() {
        let chain = &graph.chains[0];
        let cmd = cmd.seek(graph.seek_offset).duration(chain.source.duration());
        if chain.stages.is_empty() {
            cmd
        } else {
            cmd.audio_filter(render_chain(&chain.stages, sample_rate))
        }
    } else {
        cmd.filter_complex(render_filter_complex(graph, sample_rate))
            .map(format!("[{}]", OUTPUT_LABEL))
    };

    cmd = cmd.no_video();
    if let Some(codec) = &encoding.codec {
        cmd = cmd.audio_codec(codec.clone());
    }
    cmd.audio_bitrate(encoding.bitrate.clone())
        .output_args(encoding.extra_args.iter().cloned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::FilterGraphBuilder;
    use aedit_models::{EditPlan, FadeDirection, KeepSegment, RegionPlan};

    #[test]
    fn test_render_simple_stages() {
        assert_eq!(render_stage(&FilterStage::Volume(0.5), 44_100), "volume=0.5");
        assert_eq!(render_stage(&FilterStage::Tempo(1.5), 44_100), "atempo=1.5");
        assert_eq!(
            render_stage(
                &FilterStage::Fade {
                    direction: FadeDirection::Out,
                    start_seconds: 8.0,
                    duration_seconds: 2.0
                },
                44_100
            ),
            "afade=t=out:st=8:d=2"
        );
    }

    #[test]
    fn test_render_pitch_octave_up() {
        let rendered = render_stage(&FilterStage::Pitch(12.0), 44_100);
        assert_eq!(rendered, "asetrate=88200,aresample=44100,atempo=0.5");
    }

    #[test]
    fn test_render_pitch_keeps_tempo_in_range() {
        let rendered = render_stage(&FilterStage::Pitch(-24.0), 48_000);
        assert_eq!(
            rendered,
            "asetrate=12000,aresample=48000,atempo=2,atempo=2"
        );
    }

    #[test]
    fn test_trim_command_uses_seek() {
        let mut plan = EditPlan::passthrough(60.0);
        plan.trim_start = 5.0;
        plan.trim_end = 15.5;
        plan.volume_multiplier = 0.8;
        let graph = FilterGraphBuilder::new().build(&plan).unwrap();

        let args = build_edit_command(
            &graph,
            Path::new("in.wav"),
            Path::new("out.mp3"),
            &AudioEncoding::default().with_codec("libmp3lame"),
            44_100,
        )
        .build_args();

        assert!(args.contains(&"5.000000".to_string()));
        assert!(args.contains(&"10.500000".to_string()));
        assert!(args.contains(&"volume=0.8".to_string()));
        assert!(args.contains(&"libmp3lame".to_string()));
        assert!(args.contains(&"192k".to_string()));
        assert!(!args.contains(&"-filter_complex".to_string()));
    }

    #[test]
    fn test_concat_graph() {
        let mut plan = EditPlan::passthrough(60.0);
        plan.regions = vec![RegionPlan::new("a", 10.0, 20.0), {
            let mut r = RegionPlan::new("b", 0.0, 5.0);
            r.tempo_multiplier = 2.0;
            r
        }];
        plan.fade_in_seconds = 1.0;
        let graph = FilterGraphBuilder::new().build(&plan).unwrap();

        assert_eq!(
            render_filter_complex(&graph, 44_100),
            "[0:a]atrim=start=10:end=20,asetpts=PTS-STARTPTS[a0];\
             [0:a]atrim=start=0:end=5,asetpts=PTS-STARTPTS,atempo=2[a1];\
             [a0][a1]concat=n=2:v=0:a=1[cat];\
             [cat]afade=t=in:st=0:d=1[out]"
        );

        let args = build_edit_command(
            &graph,
            Path::new("in.wav"),
            Path::new("out.wav"),
            &AudioEncoding::default(),
            0,
        )
        .build_args();
        assert!(args.contains(&"[out]".to_string()));
        assert!(!args.contains(&"-ss".to_string()));
    }

    #[test]
    fn test_concat_without_post_stages() {
        let mut plan = EditPlan::passthrough(30.0);
        plan.trim_start = 10.0;
        plan.trim_end = 20.0;
        plan.invert = true;
        let graph = FilterGraphBuilder::new().build(&plan).unwrap();
        assert_eq!(graph.source_spans()[1], KeepSegment::new(20.0, 30.0));
        assert!(render_filter_complex(&graph, 44_100).ends_with("concat=n=2:v=0:a=1[out]"));
    }
}
