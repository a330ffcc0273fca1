//! FFmpeg command builder and runner.

use async_trait::async_trait;
use std::future::pending;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::{MediaError, MediaResult};
use crate::progress::{parse_progress_line, FfmpegProgress, ProgressCallback};

/// Output target that discards encoded data (analysis passes).
pub const NULL_OUTPUT: &str = "-";

/// Stand-in deadline when no timeout is configured.
const NO_DEADLINE: Duration = Duration::from_secs(60 * 60 * 24 * 365);

/// Builder for FFmpeg commands.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Input file path
    input: PathBuf,
    /// Output file path
    output: PathBuf,
    /// Input arguments (before -i)
    input_args: Vec<String>,
    /// Output arguments (after -i)
    output_args: Vec<String>,
    /// Whether to overwrite output
    overwrite: bool,
    /// Log level
    log_level: String,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command.
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            output: output.as_ref().to_path_buf(),
            input_args: Vec::new(),
            output_args: Vec::new(),
            overwrite: true,
            log_level: "error".to_string(),
        }
    }

    /// Command that decodes `input` and discards the result.
    pub fn analysis(input: impl AsRef<Path>) -> Self {
        Self::new(input, NULL_OUTPUT).log_level("info")
    }

    /// Add input arguments (before -i).
    pub fn input_arg(mut self, arg: impl Into<String>) -> Self {
        self.input_args.push(arg.into());
        self
    }

    /// Add output arguments (after -i).
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set seek position (before input).
    pub fn seek(self, seconds: f64) -> Self {
        self.input_arg("-ss").input_arg(format!("{:.6}", seconds))
    }

    /// Limit how much input is read.
    pub fn duration(self, seconds: f64) -> Self {
        self.input_arg("-t").input_arg(format!("{:.6}", seconds))
    }

    /// Set a simple audio filter chain.
    pub fn audio_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-af").output_arg(filter)
    }

    /// Set filter complex.
    pub fn filter_complex(self, filter: impl Into<String>) -> Self {
        self.output_arg("-filter_complex").output_arg(filter)
    }

    /// Map a filter graph label or stream to the output.
    pub fn map(self, label: impl Into<String>) -> Self {
        self.output_arg("-map").output_arg(label)
    }

    /// Drop any video streams.
    pub fn no_video(self) -> Self {
        self.output_arg("-vn")
    }

    /// Set audio codec.
    pub fn audio_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:a").output_arg(codec)
    }

    /// Set audio bitrate.
    pub fn audio_bitrate(self, bitrate: impl Into<String>) -> Self {
        self.output_arg("-b:a").output_arg(bitrate)
    }

    /// Set log level.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Whether the command discards its output.
    pub fn is_analysis(&self) -> bool {
        self.output == Path::new(NULL_OUTPUT)
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.overwrite {
            args.push("-y".to_string());
        }

        args.push("-v".to_string());
        args.push(self.log_level.clone());

        // Progress output to stderr
        args.push("-progress".to_string());
        args.push("pipe:2".to_string());
        args.push("-nostats".to_string());

        args.extend(self.input_args.clone());

        args.push("-i".to_string());
        args.push(self.input.to_string_lossy().to_string());

        args.extend(self.output_args.clone());

        if self.is_analysis() && !self.output_args.iter().any(|a| a == "-f") {
            args.push("-f".to_string());
            args.push("null".to_string());
        }

        args.push(self.output.to_string_lossy().to_string());

        args
    }
}

/// Something that can execute an FFmpeg command.
///
/// [`FfmpegRunner`] spawns the real binary; tests substitute fakes.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Run `cmd` until it exits, is cancelled, or times out.
    ///
    /// Returns the non-progress stderr lines (filter diagnostics, errors).
    async fn transcode(
        &self,
        cmd: &FfmpegCommand,
        cancel: watch::Receiver<bool>,
        on_progress: ProgressCallback,
    ) -> MediaResult<Vec<String>>;
}

/// Runner for FFmpeg commands with progress tracking and cancellation.
#[derive(Debug, Clone, Default)]
pub struct FfmpegRunner {
    /// Cancellation signal receiver
    cancel_rx: Option<watch::Receiver<bool>>,
    /// Timeout in seconds
    timeout_secs: Option<u64>,
}

impl FfmpegRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set cancellation signal.
    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    /// Set timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Run `cmd` to completion and return its non-progress stderr lines.
    async fn execute<F>(&self, cmd: &FfmpegCommand, progress_callback: F) -> MediaResult<Vec<String>>
    where
        F: Fn(FfmpegProgress) + Send,
    {
        let ffmpeg = check_ffmpeg()?;

        let args = cmd.build_args();
        debug!("Running FFmpeg: ffmpeg {}", args.join(" "));
        let started = std::time::Instant::now();

        let mut child = Command::new(ffmpeg)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::internal("FFmpeg stderr was not captured"))?;
        let mut lines = BufReader::new(stderr).lines();

        let mut cancel_rx = self.cancel_rx.clone();
        let deadline = tokio::time::sleep(
            self.timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(NO_DEADLINE),
        );
        tokio::pin!(deadline);

        let mut current = FfmpegProgress::default();
        let mut captured = Vec::new();

        loop {
            tokio::select! {
                line = lines.next_line() => match line? {
                    Some(line) => {
                        if let Some(progress) = parse_progress_line(&line, &mut current) {
                            progress_callback(progress);
                        } else if !is_progress_field(&line) {
                            captured.push(line);
                        }
                    }
                    None => break,
                },
                _ = cancelled(&mut cancel_rx) => {
                    info!("FFmpeg cancelled, killing process");
                    kill(&mut child).await;
                    return Err(MediaError::Cancelled);
                }
                _ = &mut deadline => {
                    return Err(self.timed_out(&mut child).await);
                }
            }
        }

        let status = tokio::select! {
            status = child.wait() => status?,
            _ = cancelled(&mut cancel_rx) => {
                info!("FFmpeg cancelled, killing process");
                kill(&mut child).await;
                return Err(MediaError::Cancelled);
            }
            _ = &mut deadline => {
                return Err(self.timed_out(&mut child).await);
            }
        };

        metrics::histogram!("aedit_ffmpeg_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        if status.success() {
            Ok(captured)
        } else {
            let tail = captured
                .iter()
                .rev()
                .take(20)
                .rev()
                .cloned()
                .collect::<Vec<_>>()
                .join("\n");
            Err(MediaError::ffmpeg_failed(
                "FFmpeg exited with non-zero status",
                (!tail.is_empty()).then_some(tail),
                status.code(),
            ))
        }
    }

    async fn timed_out(&self, child: &mut Child) -> MediaError {
        let secs = self.timeout_secs.unwrap_or_default();
        warn!("FFmpeg timed out after {} seconds, killing process", secs);
        kill(child).await;
        MediaError::Timeout(secs)
    }
}

#[async_trait]
impl Transcoder for FfmpegRunner {
    async fn transcode(
        &self,
        cmd: &FfmpegCommand,
        cancel: watch::Receiver<bool>,
        on_progress: ProgressCallback,
    ) -> MediaResult<Vec<String>> {
        let runner = self.clone().with_cancel(cancel);
        runner.execute(cmd, move |p| on_progress(p)).await
    }
}

/// Resolves once the cancel flag is raised; never if there is no flag.
async fn cancelled(cancel_rx: &mut Option<watch::Receiver<bool>>) {
    let Some(rx) = cancel_rx else {
        return pending().await;
    };
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            // Sender gone; nobody can cancel any more.
            return pending().await;
        }
    }
}

async fn kill(child: &mut Child) {
    if let Err(e) = child.kill().await {
        warn!("Failed to kill FFmpeg process: {}", e);
    }
}

/// `key=value` lines emitted by `-progress` that carry nothing we track.
fn is_progress_field(line: &str) -> bool {
    line.trim()
        .split_once('=')
        .map(|(key, _)| {
            !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
        .unwrap_or(false)
}

/// Check if FFmpeg is available.
pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)
}

/// Check if FFprobe is available.
pub fn check_ffprobe() -> MediaResult<PathBuf> {
    which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_builder() {
        let cmd = FfmpegCommand::new("input.wav", "output.mp3")
            .seek(10.0)
            .duration(30.5)
            .audio_filter("volume=0.5")
            .audio_codec("libmp3lame")
            .audio_bitrate("192k");

        let args = cmd.build_args();
        assert!(args.contains(&"-ss".to_string()));
        assert!(args.contains(&"10.000000".to_string()));
        assert!(args.contains(&"30.500000".to_string()));
        assert!(args.contains(&"-af".to_string()));
        assert!(args.contains(&"libmp3lame".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("output.mp3"));

        // Seek goes before the input.
        let ss = args.iter().position(|a| a == "-ss").unwrap();
        let i = args.iter().position(|a| a == "-i").unwrap();
        assert!(ss < i);
    }

    #[test]
    fn test_analysis_command_discards_output() {
        let cmd = FfmpegCommand::analysis("input.wav").audio_filter("silencedetect=noise=-30dB:d=0.5");
        assert!(cmd.is_analysis());

        let args = cmd.build_args();
        let n = args.len();
        assert_eq!(&args[n - 3..], &["-f".to_string(), "null".to_string(), "-".to_string()]);
        assert!(args.contains(&"info".to_string()));
    }

    #[test]
    fn test_is_progress_field() {
        assert!(is_progress_field("total_size=1024"));
        assert!(is_progress_field("stream_0_0_q=-1.0"));
        assert!(!is_progress_field("[silencedetect @ 0x55] silence_start: 1.5"));
        assert!(!is_progress_field("Error opening input"));
    }

    #[tokio::test]
    async fn test_cancelled_waits_for_flag() {
        let (tx, rx) = watch::channel(false);
        let mut rx = Some(rx);
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), cancelled(&mut rx))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_no_cancel_flag_never_resolves() {
        let mut rx: Option<watch::Receiver<bool>> = None;
        let result = tokio::time::timeout(Duration::from_millis(20), cancelled(&mut rx)).await;
        assert!(result.is_err());
    }
}
