//! Builder for configuring and constructing a `Transposer`.

use crate::config::TransposerConfig;
use crate::worker::ShiftWorker;
use crate::{Result, Transposer};
use std::path::PathBuf;
use transposer_core::{EngineFactory, FftSize, PhaseVocoderFactory, PipelineConfig};
use transposer_export::{FfmpegFactory, ServiceFactory, TranscodeOptions, Transcoder};

/// The default build uses the phase vocoder engine and the ffmpeg executable
/// named in the transcode options. [`build_with`](Self::build_with) swaps
/// either for another implementation.
///
/// # Example
///
/// ```ignore
/// use transposer::prelude::*;
///
/// let transposer = Transposer::builder()
///     .fft_size(FftSize::Medium)
///     .bitrate_kbps(96)
///     .build()?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct TransposerBuilder {
    config: TransposerConfig,
}

impl TransposerBuilder {
    /// Start from a full configuration, e.g. one loaded from TOML.
    pub fn config(mut self, config: TransposerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn pipeline(mut self, pipeline: PipelineConfig) -> Self {
        self.config.pipeline = pipeline;
        self
    }

    pub fn transcode(mut self, options: TranscodeOptions) -> Self {
        self.config.transcode = options;
        self
    }

    pub fn chunk_size(mut self, frames: usize) -> Self {
        self.config.pipeline.chunk_size = frames;
        self
    }

    pub fn fft_size(mut self, size: FftSize) -> Self {
        self.config.pipeline.fft_size = size;
        self
    }

    pub fn bitrate_kbps(mut self, kbps: u32) -> Self {
        self.config.transcode.bitrate_kbps = kbps;
        self
    }

    pub fn ffmpeg_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.transcode.ffmpeg_path = path.into();
        self
    }

    /// Build with the phase vocoder engine and ffmpeg.
    pub fn build(self) -> Result<Transposer<FfmpegFactory>> {
        let engine_factory = PhaseVocoderFactory::new(self.config.pipeline);
        let service_factory = FfmpegFactory::from_options(&self.config.transcode);
        self.build_with(engine_factory, service_factory)
    }

    /// Build with custom engine and transcoding service factories.
    pub fn build_with<E, S>(self, engine_factory: E, service_factory: S) -> Result<Transposer<S>>
    where
        E: EngineFactory + 'static,
        S: ServiceFactory,
    {
        self.config.validate()?;
        let worker = ShiftWorker::spawn(engine_factory, &self.config.pipeline)?;
        let transcoder = Transcoder::new(service_factory, self.config.transcode.clone());
        tracing::info!(
            chunk_size = self.config.pipeline.chunk_size,
            fft_size = self.config.pipeline.fft_size.size(),
            bitrate_kbps = self.config.transcode.bitrate_kbps,
            "Transposer ready"
        );
        Ok(Transposer::from_parts(worker, transcoder, self.config))
    }
}
