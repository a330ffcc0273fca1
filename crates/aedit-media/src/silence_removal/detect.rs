//! Silence detection pass using FFmpeg's `silencedetect` filter.

use std::path::Path;

use tokio::sync::watch;
use tracing::{debug, info};

use aedit_models::precision::snap;
use aedit_models::{SilenceParams, SilenceWindow};

use crate::command::{FfmpegCommand, Transcoder};
use crate::error::MediaResult;

/// `silencedetect` filter expression.
pub fn silencedetect_filter(noise_threshold_db: f64, min_silence_seconds: f64) -> String {
    format!(
        "silencedetect=noise={}dB:d={}",
        noise_threshold_db, min_silence_seconds
    )
}

/// Build the analysis command for the silence region of `params`.
///
/// Only the region is decoded; reported timestamps are relative to its start.
pub fn build_detect_command(input: &Path, params: &SilenceParams) -> FfmpegCommand {
    FfmpegCommand::analysis(input)
        .seek(params.region_start)
        .duration(params.region_duration())
        .no_video()
        .audio_filter(silencedetect_filter(
            params.noise_threshold_db,
            params.min_silence_seconds,
        ))
}

/// Run the detection pass and return raw windows on the source timeline.
pub async fn detect_silence(
    transcoder: &dyn Transcoder,
    input: &Path,
    params: &SilenceParams,
    source_duration: f64,
    cancel: watch::Receiver<bool>,
) -> MediaResult<Vec<SilenceWindow>> {
    let cmd = build_detect_command(input, params);
    debug!(
        region_start = params.region_start,
        region_end = params.region_end,
        "Running silence detection"
    );

    let lines = transcoder.transcode(&cmd, cancel, Box::new(|_| {})).await?;
    let end_bound = params.region_end.min(source_duration);
    let windows = parse_silencedetect_output(&lines, params.region_start, end_bound);

    info!(
        windows = windows.len(),
        "Silence detection found {} window(s)",
        windows.len()
    );
    Ok(windows)
}

/// Parse `silencedetect` log lines into windows.
///
/// `offset` is added to every timestamp. A `silence_start` with no matching
/// `silence_end` runs to `end_bound`. Results are clipped to
/// `[0, end_bound]` and empty windows are dropped.
pub fn parse_silencedetect_output<S: AsRef<str>>(
    lines: &[S],
    offset: f64,
    end_bound: f64,
) -> Vec<SilenceWindow> {
    let mut windows = Vec::new();
    let mut pending_start: Option<f64> = None;

    let mut push = |start: f64, end: f64| {
        let start = snap((start + offset).max(0.0));
        let end = snap((end + offset).min(end_bound));
        if end > start {
            windows.push(SilenceWindow::new(start, end));
        }
    };

    for line in lines {
        let line = line.as_ref();
        if let Some(start) = value_after(line, "silence_start:") {
            pending_start = Some(start);
        } else if let Some(end) = value_after(line, "silence_end:") {
            // An end without a start means the input began silent.
            let start = pending_start.take().unwrap_or(0.0);
            push(start, end);
        }
    }

    if let Some(start) = pending_start {
        push(start, end_bound - offset);
    }

    windows
}

fn value_after(line: &str, marker: &str) -> Option<f64> {
    let rest = &line[line.find(marker)? + marker.len()..];
    rest.split(|c: char| c.is_whitespace() || c == '|')
        .find(|s| !s.is_empty())
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pairs() {
        let lines = [
            "[silencedetect @ 0x5581] silence_start: 1.5",
            "[silencedetect @ 0x5581] silence_end: 2.75 | silence_duration: 1.25",
            "size=N/A time=00:00:05.00 bitrate=N/A speed= 500x",
            "[silencedetect @ 0x5581] silence_start: 4",
            "[silencedetect @ 0x5581] silence_end: 4.6 | silence_duration: 0.6",
        ];
        let windows = parse_silencedetect_output(&lines, 0.0, 10.0);
        assert_eq!(
            windows,
            vec![SilenceWindow::new(1.5, 2.75), SilenceWindow::new(4.0, 4.6)]
        );
    }

    #[test]
    fn test_offset_and_trailing_silence() {
        let lines = [
            "[silencedetect @ 0x1] silence_start: 0.5",
            "[silencedetect @ 0x1] silence_end: 1 | silence_duration: 0.5",
            "[silencedetect @ 0x1] silence_start: 7.25",
        ];
        let windows = parse_silencedetect_output(&lines, 2.0, 10.0);
        assert_eq!(
            windows,
            vec![SilenceWindow::new(2.5, 3.0), SilenceWindow::new(9.25, 10.0)]
        );
    }

    #[test]
    fn test_negative_start_and_orphan_end() {
        let lines = [
            "[silencedetect @ 0x1] silence_end: 0.8 | silence_duration: 0.8",
            "[silencedetect @ 0x1] silence_start: -0.00133",
            "[silencedetect @ 0x1] silence_end: 0 | silence_duration: 0.0013",
        ];
        let windows = parse_silencedetect_output(&lines, 0.0, 5.0);
        assert_eq!(windows, vec![SilenceWindow::new(0.0, 0.8)]);
    }

    #[test]
    fn test_detect_command_args() {
        let params = SilenceParams {
            region_start: 2.0,
            region_end: 12.0,
            merge_epsilon_seconds: 0.01,
            min_segment_seconds: 0.0001,
            noise_threshold_db: -35.0,
            min_silence_seconds: 0.5,
            windows: None,
        };
        let args = build_detect_command(Path::new("in.wav"), &params).build_args();
        assert!(args.contains(&"silencedetect=noise=-35dB:d=0.5".to_string()));
        assert!(args.contains(&"2.000000".to_string()));
        assert!(args.contains(&"10.000000".to_string()));
        assert!(args.contains(&"-vn".to_string()));
    }
}
