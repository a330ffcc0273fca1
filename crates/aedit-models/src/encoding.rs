//! Audio output encoding configuration.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Default audio bitrate
pub const DEFAULT_AUDIO_BITRATE: &str = "192k";

/// Sample rate assumed when the source cannot be probed
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// Audio encoding configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AudioEncoding {
    /// Audio codec (e.g., "libmp3lame", "aac"); `None` lets the engine pick
    /// from the output extension
    #[serde(default)]
    pub codec: Option<String>,

    /// Audio bitrate
    #[serde(default = "default_audio_bitrate")]
    pub bitrate: String,

    /// Additional FFmpeg output arguments
    #[serde(default)]
    pub extra_args: Vec<String>,
}

fn default_audio_bitrate() -> String {
    DEFAULT_AUDIO_BITRATE.to_string()
}

impl Default for AudioEncoding {
    fn default() -> Self {
        Self {
            codec: None,
            bitrate: default_audio_bitrate(),
            extra_args: Vec::new(),
        }
    }
}

impl AudioEncoding {
    pub fn with_codec(mut self, codec: impl Into<String>) -> Self {
        self.codec = Some(codec.into());
        self
    }

    pub fn with_bitrate(mut self, bitrate: impl Into<String>) -> Self {
        self.bitrate = bitrate.into();
        self
    }
}
