//! Opus transcoding with container/channel-layout fallback.
//!
//! A [`Transcoder`] walks an ordered list of [`TranscodeVariant`]s against a
//! [`TranscodeService`]. A failed attempt tears the service down entirely
//! (it may be left in a bad state) and the next variant starts on a fresh
//! one. Only when every variant has failed does the caller see an error,
//! carrying the last failure and the tail of the service's diagnostic log.

mod ffmpeg;
mod policy;
mod service;

pub use ffmpeg::{FfmpegFactory, FfmpegService};
pub use policy::Transcoder;
pub use service::{ServiceFactory, TranscodeService};

use std::collections::VecDeque;
use std::fmt;

/// Working-directory name the source WAV is written to.
pub const INPUT_NAME: &str = "input.wav";

/// Output container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    Ogg,
    WebM,
}

impl Container {
    /// ffmpeg muxer name, also used as the file extension.
    pub fn format_name(&self) -> &'static str {
        match self {
            Container::Ogg => "ogg",
            Container::WebM => "webm",
        }
    }

    pub fn extension(&self) -> &'static str {
        self.format_name()
    }
}

/// Output channel layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelLayout {
    Stereo,
    Mono,
}

impl ChannelLayout {
    pub fn channels(&self) -> u16 {
        match self {
            ChannelLayout::Stereo => 2,
            ChannelLayout::Mono => 1,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ChannelLayout::Stereo => "stereo",
            ChannelLayout::Mono => "mono",
        }
    }
}

/// One candidate encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranscodeVariant {
    pub container: Container,
    pub layout: ChannelLayout,
    /// ffmpeg audio encoder
    pub codec: &'static str,
}

impl TranscodeVariant {
    pub const fn opus(container: Container, layout: ChannelLayout) -> Self {
        Self {
            container,
            layout,
            codec: "libopus",
        }
    }

    /// e.g. `ogg/stereo/libopus`
    pub fn label(&self) -> String {
        format!(
            "{}/{}/{}",
            self.container.format_name(),
            self.layout.name(),
            self.codec
        )
    }

    pub fn output_name(&self) -> String {
        format!("output.{}", self.container.extension())
    }

    pub fn mime_type(&self) -> String {
        format!("audio/{}; codecs=opus", self.container.format_name())
    }

    /// ffmpeg arguments reading [`INPUT_NAME`] and writing
    /// [`output_name()`](Self::output_name), single-threaded.
    pub fn args(&self, bitrate: &str, sample_rate: u32) -> Vec<String> {
        [
            "-i",
            INPUT_NAME,
            "-vn",
            "-ar",
            sample_rate.to_string().as_str(),
            "-threads",
            "1",
            "-ac",
            self.layout.channels().to_string().as_str(),
            "-c:a",
            self.codec,
            "-b:a",
            bitrate,
            "-vbr",
            "on",
            "-f",
            self.container.format_name(),
            self.output_name().as_str(),
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }
}

impl fmt::Display for TranscodeVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Default fallback order: Ogg before WebM, stereo before mono.
pub const OPUS_VARIANTS: [TranscodeVariant; 4] = [
    TranscodeVariant::opus(Container::Ogg, ChannelLayout::Stereo),
    TranscodeVariant::opus(Container::Ogg, ChannelLayout::Mono),
    TranscodeVariant::opus(Container::WebM, ChannelLayout::Stereo),
    TranscodeVariant::opus(Container::WebM, ChannelLayout::Mono),
];

/// A successfully transcoded artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeOutput {
    pub bytes: Vec<u8>,
    pub extension: &'static str,
    pub mime_type: String,
    /// Variant that produced the artifact.
    pub variant: TranscodeVariant,
}

/// Bounded buffer of the most recent diagnostic lines.
#[derive(Debug, Clone)]
pub struct LogTail {
    lines: VecDeque<String>,
    capacity: usize,
}

impl LogTail {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, line: &str) {
        if self.capacity == 0 {
            return;
        }
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line.to_string());
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn into_lines(self) -> Vec<String> {
        self.lines.into()
    }
}
