//! FFprobe audio information.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::command::check_ffprobe;
use crate::error::{MediaError, MediaResult};

/// Audio file information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioInfo {
    /// Duration in seconds
    pub duration: f64,
    /// Sample rate in Hz
    pub sample_rate: u32,
    pub channels: u32,
    /// Audio codec
    pub codec: String,
    /// Bitrate in bits/second
    pub bitrate: u64,
}

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    bit_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    codec_name: Option<String>,
    sample_rate: Option<String>,
    channels: Option<u32>,
    duration: Option<String>,
}

/// Source of media durations.
#[async_trait]
pub trait MediaProbe: Send + Sync {
    async fn probe(&self, path: &Path) -> MediaResult<AudioInfo>;

    /// Duration in seconds.
    async fn duration(&self, path: &Path) -> MediaResult<f64> {
        Ok(self.probe(path).await?.duration)
    }
}

/// [`MediaProbe`] backed by the `ffprobe` binary.
#[derive(Debug, Clone, Copy, Default)]
pub struct FfprobeProbe;

#[async_trait]
impl MediaProbe for FfprobeProbe {
    async fn probe(&self, path: &Path) -> MediaResult<AudioInfo> {
        probe_audio(path).await
    }
}

/// Probe an audio (or audio-bearing) file for information.
pub async fn probe_audio(path: impl AsRef<Path>) -> MediaResult<AudioInfo> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    let ffprobe = check_ffprobe()?;

    let output = Command::new(ffprobe)
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::FfprobeFailed {
            message: "FFprobe failed".to_string(),
            stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
        });
    }

    parse_probe_output(&output.stdout)
}

/// Get audio duration in seconds.
pub async fn get_duration(path: impl AsRef<Path>) -> MediaResult<f64> {
    let info = probe_audio(path).await?;
    Ok(info.duration)
}

fn parse_probe_output(stdout: &[u8]) -> MediaResult<AudioInfo> {
    let probe: FfprobeOutput = serde_json::from_slice(stdout)?;

    let audio_stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type == "audio")
        .ok_or_else(|| MediaError::InvalidAudio("No audio stream found".to_string()))?;

    // Container duration first, stream duration as fallback.
    let duration = probe
        .format
        .duration
        .as_deref()
        .or(audio_stream.duration.as_deref())
        .and_then(|d| d.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
        .ok_or_else(|| MediaError::InvalidAudio("Duration could not be determined".to_string()))?;

    let bitrate = probe
        .format
        .bit_rate
        .as_deref()
        .and_then(|b| b.parse::<u64>().ok())
        .unwrap_or(0);

    let sample_rate = audio_stream
        .sample_rate
        .as_deref()
        .and_then(|r| r.parse::<u32>().ok())
        .unwrap_or(0);

    Ok(AudioInfo {
        duration,
        sample_rate,
        channels: audio_stream.channels.unwrap_or(0),
        codec: audio_stream.codec_name.clone().unwrap_or_default(),
        bitrate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    #[test]
    fn test_parse_probe_output() {
        let json = br#"{
            "streams": [
                {"codec_type": "video", "codec_name": "mjpeg"},
                {"codec_type": "audio", "codec_name": "mp3", "sample_rate": "44100", "channels": 2}
            ],
            "format": {"duration": "116.523000", "bit_rate": "192000"}
        }"#;
        let info = assert_ok!(parse_probe_output(json));
        assert!((info.duration - 116.523).abs() < 1e-9);
        assert_eq!(info.sample_rate, 44_100);
        assert_eq!(info.channels, 2);
        assert_eq!(info.codec, "mp3");
        assert_eq!(info.bitrate, 192_000);
    }

    #[test]
    fn test_stream_duration_fallback() {
        let json = br#"{
            "streams": [{"codec_type": "audio", "duration": "3.5"}],
            "format": {}
        }"#;
        let info = assert_ok!(parse_probe_output(json));
        assert_eq!(info.duration, 3.5);
    }

    #[test]
    fn test_missing_audio_stream() {
        let json = br#"{"streams": [{"codec_type": "video"}], "format": {"duration": "1.0"}}"#;
        assert!(matches!(
            parse_probe_output(json),
            Err(MediaError::InvalidAudio(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_file() {
        let result = FfprobeProbe.duration(Path::new("/nonexistent/input.wav")).await;
        assert!(matches!(result, Err(MediaError::FileNotFound(_))));
    }
}
