//! Translate an [`EditPlan`] into ordered filter stages.
//!
//! Stage order inside a chain is volume, pitch, tempo, then fades, so fade
//! positions always refer to the tempo-adjusted length.

use serde::{Deserialize, Serialize};

use aedit_models::precision::snap;
use aedit_models::{
    EditMode, EditPlan, FadeDirection, FilterStage, KeepSegment, RegionPlan,
};

use super::tempo::chain_tempo;
use crate::error::{MediaError, MediaResult};

const NOOP_EPSILON: f64 = 1e-6;

/// Processing parameters shared by plans and regions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageParams {
    pub volume_multiplier: f64,
    pub pitch_semitones: f64,
    pub tempo_multiplier: f64,
    pub fade_in_seconds: f64,
    pub fade_out_seconds: f64,
}

impl StageParams {
    pub fn from_plan(plan: &EditPlan) -> Self {
        Self {
            volume_multiplier: plan.volume_multiplier,
            pitch_semitones: plan.pitch_semitones,
            tempo_multiplier: plan.tempo_multiplier,
            fade_in_seconds: plan.fade_in_seconds,
            fade_out_seconds: plan.fade_out_seconds,
        }
    }

    pub fn from_region(region: &RegionPlan) -> Self {
        Self {
            volume_multiplier: region.volume_multiplier,
            pitch_semitones: region.pitch_semitones,
            tempo_multiplier: region.tempo_multiplier,
            fade_in_seconds: region.fade_in_seconds,
            fade_out_seconds: region.fade_out_seconds,
        }
    }

    /// Length after the tempo change.
    pub fn output_duration(&self, source_duration: f64) -> f64 {
        snap(source_duration / self.tempo_multiplier)
    }

    /// Ordered stages for a span of `source_duration` seconds.
    pub fn stages(&self, source_duration: f64) -> Vec<FilterStage> {
        let mut stages = Vec::new();

        if (self.volume_multiplier - 1.0).abs() > NOOP_EPSILON {
            stages.push(FilterStage::Volume(self.volume_multiplier));
        }
        if self.pitch_semitones.abs() > NOOP_EPSILON {
            stages.push(FilterStage::Pitch(self.pitch_semitones));
        }
        stages.extend(
            chain_tempo(self.tempo_multiplier)
                .into_iter()
                .map(FilterStage::Tempo),
        );

        // Fade-out wins the tail; fade-in gets what is left so the two never overlap.
        let length = self.output_duration(source_duration);
        let fade_out = snap(self.fade_out_seconds.max(0.0).min(length));
        let fade_in = snap(self.fade_in_seconds.max(0.0).min(length - fade_out));
        if fade_in > 0.0 {
            stages.push(FilterStage::Fade {
                direction: FadeDirection::In,
                start_seconds: 0.0,
                duration_seconds: fade_in,
            });
        }
        if fade_out > 0.0 {
            stages.push(FilterStage::Fade {
                direction: FadeDirection::Out,
                start_seconds: snap((length - fade_out).max(0.0)),
                duration_seconds: fade_out,
            });
        }

        stages
    }
}

/// One source span and the stages applied to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageChain {
    pub source: KeepSegment,
    pub stages: Vec<FilterStage>,
    pub output_duration: f64,
}

impl StageChain {
    fn plain(source: KeepSegment) -> Self {
        Self {
            source,
            stages: Vec::new(),
            output_duration: source.duration(),
        }
    }
}

/// Everything the executor needs to drive one transcode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterGraph {
    pub mode: EditMode,
    /// Input seek applied before decoding
    pub seek_offset: f64,
    /// Spans in output order
    pub chains: Vec<StageChain>,
    /// Stages applied after the chains are concatenated
    pub post_stages: Vec<FilterStage>,
    /// Expected length of the produced file
    pub output_duration: f64,
}

impl FilterGraph {
    /// Source spans in output order.
    pub fn source_spans(&self) -> Vec<KeepSegment> {
        self.chains.iter().map(|c| c.source).collect()
    }

    /// Whether the graph needs a concat filter.
    pub fn is_single_chain(&self) -> bool {
        self.chains.len() == 1 && self.post_stages.is_empty()
    }

    /// Every stage in the graph, chains first.
    pub fn stages(&self) -> impl Iterator<Item = &FilterStage> {
        self.chains
            .iter()
            .flat_map(|c| c.stages.iter())
            .chain(self.post_stages.iter())
    }
}

/// Builds [`FilterGraph`]s from validated plans.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterGraphBuilder;

impl FilterGraphBuilder {
    pub fn new() -> Self {
        Self
    }

    pub fn build(&self, plan: &EditPlan) -> MediaResult<FilterGraph> {
        match plan.mode() {
            EditMode::Trim => Ok(self.build_trim(plan)),
            EditMode::Invert => {
                let mut spans = Vec::with_capacity(2);
                if plan.trim_start > 0.0 {
                    spans.push(KeepSegment::new(0.0, plan.trim_start));
                }
                if plan.trim_end < plan.source_duration_seconds {
                    spans.push(KeepSegment::new(plan.trim_end, plan.source_duration_seconds));
                }
                self.build_concat(plan, EditMode::Invert, spans)
            }
            EditMode::SilenceRemoval => {
                let segments = plan.segments.as_ref().ok_or_else(|| {
                    MediaError::invalid_plan("silence removal plan has no computed keep segments")
                })?;
                let spans = if plan.invert {
                    segments
                        .merged_silence
                        .iter()
                        .map(|w| KeepSegment::new(w.start, w.end))
                        .collect()
                } else {
                    segments.keep.clone()
                };
                self.build_concat(plan, EditMode::SilenceRemoval, spans)
            }
            EditMode::Regions => Ok(self.build_regions(plan)),
        }
    }

    fn build_trim(&self, plan: &EditPlan) -> FilterGraph {
        let params = StageParams::from_plan(plan);
        let source = KeepSegment::new(plan.trim_start, plan.trim_end);
        let chain = StageChain {
            source,
            stages: params.stages(source.duration()),
            output_duration: params.output_duration(source.duration()),
        };
        FilterGraph {
            mode: EditMode::Trim,
            seek_offset: plan.trim_start,
            output_duration: chain.output_duration,
            chains: vec![chain],
            post_stages: Vec::new(),
        }
    }

    fn build_concat(
        &self,
        plan: &EditPlan,
        mode: EditMode,
        spans: Vec<KeepSegment>,
    ) -> MediaResult<FilterGraph> {
        let spans: Vec<_> = spans.into_iter().filter(|s| s.duration() > 0.0).collect();
        if spans.is_empty() {
            return Err(MediaError::empty_result(0.0, plan.source_duration_seconds));
        }

        let params = StageParams::from_plan(plan);
        let total = aedit_models::segment::total_duration(&spans);
        Ok(FilterGraph {
            mode,
            seek_offset: 0.0,
            chains: spans.into_iter().map(StageChain::plain).collect(),
            post_stages: params.stages(total),
            output_duration: params.output_duration(total),
        })
    }

    fn build_regions(&self, plan: &EditPlan) -> FilterGraph {
        let chains: Vec<_> = plan
            .regions
            .iter()
            .map(|region| {
                let params = StageParams::from_region(region);
                StageChain {
                    source: region.as_segment(),
                    stages: params.stages(region.duration()),
                    output_duration: region.output_duration(),
                }
            })
            .collect();

        // Top-level parameters apply to the concatenated regions.
        let params = StageParams::from_plan(plan);
        let total = snap(chains.iter().map(|c| c.output_duration).sum());
        FilterGraph {
            mode: EditMode::Regions,
            seek_offset: 0.0,
            chains,
            post_stages: params.stages(total),
            output_duration: params.output_duration(total),
        }
    }
}

/// Theoretical output length of `plan`.
pub fn expected_output_duration(plan: &EditPlan) -> MediaResult<f64> {
    Ok(FilterGraphBuilder::new().build(plan)?.output_duration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;
    use aedit_models::{SegmentPlan, SilenceParams, SilenceWindow};

    fn plan(duration: f64) -> EditPlan {
        EditPlan::passthrough(duration)
    }

    fn tempos(stages: &[FilterStage]) -> Vec<f64> {
        stages.iter().filter_map(FilterStage::tempo).collect()
    }

    #[test]
    fn test_trim_with_all_stages_in_order() {
        let mut p = plan(60.0);
        p.trim_start = 10.0;
        p.trim_end = 40.0;
        p.volume_multiplier = 1.5;
        p.pitch_semitones = 2.0;
        p.tempo_multiplier = 3.0;
        p.fade_in_seconds = 1.0;
        p.fade_out_seconds = 2.0;

        let graph = assert_ok!(FilterGraphBuilder::new().build(&p));
        assert_eq!(graph.mode, EditMode::Trim);
        assert_eq!(graph.seek_offset, 10.0);
        assert_eq!(graph.output_duration, 10.0);
        assert!(graph.is_single_chain());

        let stages = &graph.chains[0].stages;
        assert_eq!(stages[0], FilterStage::Volume(1.5));
        assert_eq!(stages[1], FilterStage::Pitch(2.0));
        assert_eq!(tempos(stages), vec![2.0, 1.5]);
        assert_eq!(
            stages[4],
            FilterStage::Fade {
                direction: FadeDirection::In,
                start_seconds: 0.0,
                duration_seconds: 1.0
            }
        );
        // Fade-out is placed against the tempo-adjusted length.
        assert_eq!(
            stages[5],
            FilterStage::Fade {
                direction: FadeDirection::Out,
                start_seconds: 8.0,
                duration_seconds: 2.0
            }
        );
    }

    #[test]
    fn test_passthrough_has_no_stages() {
        let graph = assert_ok!(FilterGraphBuilder::new().build(&plan(12.5)));
        assert_eq!(graph.stages().count(), 0);
        assert_eq!(graph.output_duration, 12.5);
    }

    #[test]
    fn test_slow_tempo_chain() {
        let mut p = plan(10.0);
        p.tempo_multiplier = 0.3;
        let graph = assert_ok!(FilterGraphBuilder::new().build(&p));
        assert_eq!(tempos(&graph.chains[0].stages), vec![0.5, 0.6]);
        assert_eq!(graph.output_duration, 33.333333);
    }

    #[test]
    fn test_invert_keeps_complement() {
        let mut p = plan(30.0);
        p.trim_start = 10.0;
        p.trim_end = 20.0;
        p.invert = true;
        p.fade_out_seconds = 1.0;

        let graph = assert_ok!(FilterGraphBuilder::new().build(&p));
        assert_eq!(graph.mode, EditMode::Invert);
        assert_eq!(
            graph.source_spans(),
            vec![KeepSegment::new(0.0, 10.0), KeepSegment::new(20.0, 30.0)]
        );
        assert_eq!(graph.output_duration, 20.0);
        assert_eq!(
            graph.post_stages,
            vec![FilterStage::Fade {
                direction: FadeDirection::Out,
                start_seconds: 19.0,
                duration_seconds: 1.0
            }]
        );
    }

    #[test]
    fn test_invert_at_source_edge() {
        let mut p = plan(30.0);
        p.trim_start = 0.0;
        p.trim_end = 5.0;
        p.invert = true;
        let graph = assert_ok!(FilterGraphBuilder::new().build(&p));
        assert_eq!(graph.source_spans(), vec![KeepSegment::new(5.0, 30.0)]);
    }

    fn silence_plan() -> EditPlan {
        let mut p = plan(10.0);
        p.silence = Some(SilenceParams {
            region_start: 0.0,
            region_end: 10.0,
            merge_epsilon_seconds: 0.01,
            min_segment_seconds: 0.0001,
            noise_threshold_db: -30.0,
            min_silence_seconds: 0.5,
            windows: None,
        });
        p
    }

    #[test]
    fn test_silence_requires_segments() {
        let result = FilterGraphBuilder::new().build(&silence_plan());
        assert!(matches!(result, Err(MediaError::InvalidPlan(_))));
    }

    #[test]
    fn test_silence_removal_uses_keep_segments() {
        let mut p = silence_plan().with_segments(SegmentPlan {
            region_start: 0.0,
            region_end: 10.0,
            merged_silence: vec![SilenceWindow::new(2.0, 4.0)],
            keep: vec![KeepSegment::new(0.0, 2.0), KeepSegment::new(4.0, 10.0)],
        });
        p.tempo_multiplier = 2.0;

        let graph = assert_ok!(FilterGraphBuilder::new().build(&p));
        assert_eq!(graph.chains.len(), 2);
        assert!(graph.chains.iter().all(|c| c.stages.is_empty()));
        assert_eq!(tempos(&graph.post_stages), vec![2.0]);
        assert_eq!(graph.output_duration, 4.0);

        // Inverted silence removal keeps the silence itself.
        p.invert = true;
        let graph = assert_ok!(FilterGraphBuilder::new().build(&p));
        assert_eq!(graph.source_spans(), vec![KeepSegment::new(2.0, 4.0)]);
        assert_eq!(graph.output_duration, 1.0);
    }

    #[test]
    fn test_regions_concatenate_in_order() {
        let mut p = plan(60.0);
        let mut intro = RegionPlan::new("intro", 30.0, 40.0);
        intro.tempo_multiplier = 2.0;
        intro.fade_in_seconds = 0.5;
        let mut outro = RegionPlan::new("outro", 0.0, 6.0);
        outro.pitch_semitones = -3.0;
        p.regions = vec![intro, outro];

        let graph = assert_ok!(FilterGraphBuilder::new().build(&p));
        assert_eq!(graph.mode, EditMode::Regions);
        assert_eq!(
            graph.source_spans(),
            vec![KeepSegment::new(30.0, 40.0), KeepSegment::new(0.0, 6.0)]
        );
        assert_eq!(graph.chains[0].output_duration, 5.0);
        assert_eq!(graph.chains[1].stages, vec![FilterStage::Pitch(-3.0)]);
        assert!(graph.post_stages.is_empty());
        assert_eq!(graph.output_duration, 11.0);
    }

    #[test]
    fn test_fade_longer_than_segment_is_clamped() {
        let params = StageParams {
            volume_multiplier: 1.0,
            pitch_semitones: 0.0,
            tempo_multiplier: 1.0,
            fade_in_seconds: 0.0,
            fade_out_seconds: 5.0,
        };
        let stages = params.stages(3.0);
        assert_eq!(
            stages,
            vec![FilterStage::Fade {
                direction: FadeDirection::Out,
                start_seconds: 0.0,
                duration_seconds: 3.0
            }]
        );
    }

    #[test]
    fn test_fades_never_overlap_on_short_keep() {
        let mut p = silence_plan().with_segments(SegmentPlan {
            region_start: 0.0,
            region_end: 10.0,
            merged_silence: vec![SilenceWindow::new(1.0, 9.0)],
            keep: vec![KeepSegment::new(0.0, 1.0), KeepSegment::new(9.0, 10.0)],
        });
        p.fade_in_seconds = 3.0;
        p.fade_out_seconds = 3.0;

        let graph = assert_ok!(FilterGraphBuilder::new().build(&p));
        assert_eq!(graph.output_duration, 2.0);
        let faded: f64 = graph
            .post_stages
            .iter()
            .map(|stage| match stage {
                FilterStage::Fade {
                    duration_seconds, ..
                } => *duration_seconds,
                _ => 0.0,
            })
            .sum();
        assert!(faded <= graph.output_duration);
        assert_eq!(
            graph.post_stages,
            vec![FilterStage::Fade {
                direction: FadeDirection::Out,
                start_seconds: 0.0,
                duration_seconds: 2.0
            }]
        );
    }

    #[test]
    fn test_fade_in_yields_to_fade_out() {
        let params = StageParams {
            volume_multiplier: 1.0,
            pitch_semitones: 0.0,
            tempo_multiplier: 1.0,
            fade_in_seconds: 2.5,
            fade_out_seconds: 1.5,
        };
        let stages = params.stages(3.0);
        assert_eq!(
            stages,
            vec![
                FilterStage::Fade {
                    direction: FadeDirection::In,
                    start_seconds: 0.0,
                    duration_seconds: 1.5
                },
                FilterStage::Fade {
                    direction: FadeDirection::Out,
                    start_seconds: 1.5,
                    duration_seconds: 1.5
                },
            ]
        );
    }

    #[test]
    fn test_expected_output_duration() {
        let mut p = plan(116.523);
        p.tempo_multiplier = 1.5;
        assert_eq!(assert_ok!(expected_output_duration(&p)), 77.682);
    }
}
