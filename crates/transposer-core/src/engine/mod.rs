//! Time-stretch engine binding.
//!
//! An engine is a stateful pitch-shift session driven through a two-pass
//! protocol: every input chunk is first fed to [`StretchEngine::study`], then
//! [`StretchEngine::calculate_stretch`] is called once, then every chunk is fed
//! again to [`StretchEngine::process`]. Sample data crosses the boundary only
//! through the typed staging calls [`StretchEngine::write_input_chunk`] and
//! [`StretchEngine::read_output_chunk`]; the engine owns and reuses the staging
//! buffers.
//!
//! Sessions are released by dropping them. [`EngineSession`] owns the engine
//! for the duration of one request so every exit path releases it.

mod phase_vocoder;
mod session;
mod vocoder_engine;

pub use phase_vocoder::PhaseVocoderProcessor;
pub use session::{EngineSession, PipelineState};
pub use vocoder_engine::{PhaseVocoderEngine, PhaseVocoderFactory};

use crate::error::Result;

/// One pitch-shift session bound to a sample rate and channel count.
pub trait StretchEngine: Send {
    fn channel_count(&self) -> usize;

    /// Set the pitch scale and the total number of input frames.
    ///
    /// Must be called before any study or process call.
    fn configure(&mut self, pitch_scale: f64, expected_total_frames: usize) -> Result<()>;

    /// Frames accepted per study/process call.
    fn chunk_size(&self) -> usize;

    /// Upper bound on frames returned by a single process call.
    fn max_output_size(&self) -> usize;

    /// Copy up to `chunk_size` samples into the channel's input staging.
    /// The unused tail is zero-filled.
    fn write_input_chunk(&mut self, channel: usize, samples: &[f32]) -> Result<()>;

    /// Analyse `frames` staged frames.
    fn study(&mut self, frames: usize, is_final: bool) -> Result<()>;

    /// Finish analysis and switch to synthesis. Called exactly once.
    fn calculate_stretch(&mut self) -> Result<()>;

    /// Synthesise from `frames` staged frames, returning the number of
    /// frames now available in output staging.
    ///
    /// After the final chunk, calling with `frames == 0` and `is_final` set
    /// flushes buffered output; a return of 0 means nothing is left.
    fn process(&mut self, frames: usize, is_final: bool) -> Result<usize>;

    /// The first `count` frames of the channel's output staging.
    fn read_output_chunk(&self, channel: usize, count: usize) -> Result<&[f32]>;

    /// Leading output frames that are algorithmic latency.
    fn start_delay(&self) -> usize;
}

/// Creates engine sessions.
pub trait EngineFactory: Send {
    type Engine: StretchEngine;

    /// Allocate a session. Fails with [`Error::EngineInit`](crate::Error::EngineInit)
    /// when the capability cannot provide one.
    fn create(&self, sample_rate: u32, channels: usize) -> Result<Self::Engine>;
}
