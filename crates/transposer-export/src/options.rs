//! Export options.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    #[default]
    Wav,
    /// Opus in Ogg, falling back to WebM.
    Opus,
}

impl AudioFormat {
    /// File extension (without dot). Opus reports its preferred container;
    /// the actual one comes from the transcode result.
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Wav => "wav",
            AudioFormat::Opus => "ogg",
        }
    }
}

/// Transcoding options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscodeOptions {
    /// Target bitrate in kbps (default: 128)
    pub bitrate_kbps: u32,
    /// ffmpeg executable (default: "ffmpeg" from PATH)
    pub ffmpeg_path: PathBuf,
    /// Diagnostic lines kept for error reports (default: 14)
    pub log_tail: usize,
    /// Output sample rate (default: 48000, the Opus native rate)
    pub sample_rate: u32,
}

impl Default for TranscodeOptions {
    fn default() -> Self {
        Self {
            bitrate_kbps: 128,
            ffmpeg_path: PathBuf::from("ffmpeg"),
            log_tail: 14,
            sample_rate: 48000,
        }
    }
}

impl TranscodeOptions {
    pub fn bitrate_kbps(mut self, kbps: u32) -> Self {
        self.bitrate_kbps = kbps;
        self
    }

    pub fn ffmpeg_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ffmpeg_path = path.into();
        self
    }

    pub fn log_tail(mut self, lines: usize) -> Self {
        self.log_tail = lines;
        self
    }

    /// ffmpeg bitrate argument, e.g. `128k`.
    pub fn bitrate_arg(&self) -> String {
        format!("{}k", self.bitrate_kbps)
    }
}
