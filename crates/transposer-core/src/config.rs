//! Pipeline and engine configuration.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// FFT size presets for the phase vocoder.
///
/// Larger sizes give better frequency resolution on tonal material at the
/// cost of more latency and smeared transients.
///
/// The synthesis hop is a whole number of samples, so the realised pitch
/// ratio is `round(hop * scale) / hop` rather than the exact `2^(n/12)`.
/// The per-variant figures are the worst pitch error over -12..=12
/// semitones. Output length is unaffected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FftSize {
    /// 1024-point FFT, within 9.4 cents
    Small,
    /// 2048-point FFT, within 5.0 cents
    Medium,
    /// 4096-point FFT, within 2.5 cents - Default
    #[default]
    Large,
    /// 8192-point FFT, within 1.5 cents
    XLarge,
}

impl FftSize {
    pub fn size(&self) -> usize {
        match self {
            FftSize::Small => 1024,
            FftSize::Medium => 2048,
            FftSize::Large => 4096,
            FftSize::XLarge => 8192,
        }
    }

    /// Analysis hop (FFT size / 8). Keeps at least 4x synthesis overlap up
    /// to a stretch of 2.0.
    pub fn analysis_hop(&self) -> usize {
        self.size() / 8
    }
}

/// Configuration for the chunked pitch-shift pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Frames staged per study/process call (default: 1024)
    pub chunk_size: usize,
    /// Maximum frames the engine may hand back per call (default: 8192)
    pub max_output_size: usize,
    /// Phase vocoder FFT size (default: 4096)
    pub fft_size: FftSize,
    /// Emit progress every N chunks (default: 32)
    pub progress_interval: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1024,
            max_output_size: 8192,
            fft_size: FftSize::default(),
            progress_interval: 32,
        }
    }
}

impl PipelineConfig {
    pub fn chunk_size(mut self, frames: usize) -> Self {
        self.chunk_size = frames;
        self
    }

    pub fn max_output_size(mut self, frames: usize) -> Self {
        self.max_output_size = frames;
        self
    }

    pub fn fft_size(mut self, size: FftSize) -> Self {
        self.fft_size = size;
        self
    }

    pub fn progress_interval(mut self, chunks: usize) -> Self {
        self.progress_interval = chunks;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::InvalidConfig("chunk_size must be > 0".into()));
        }
        if self.max_output_size == 0 {
            return Err(Error::InvalidConfig("max_output_size must be > 0".into()));
        }
        if self.progress_interval == 0 {
            return Err(Error::InvalidConfig("progress_interval must be > 0".into()));
        }
        Ok(())
    }
}
