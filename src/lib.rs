//! # Transposer - Duration-Preserving Pitch Shifter
//!
//! Shifts the pitch of a recording by whole semitones while keeping its
//! length sample-accurate, then renders WAV or transcodes to Opus.
//!
//! ## Architecture
//!
//! Transposer is an umbrella crate that coordinates:
//! - **transposer-core** - Engine binding, chunked study/process pipeline, output reassembly
//! - **transposer-export** - WAV I/O and ffmpeg transcoding with variant fallback
//!
//! and adds the shift worker thread, the [`Transposer`] facade with its render
//! cache, configuration loading and output naming.
//!
//! ## Quick Start
//!
//! ```ignore
//! use transposer::prelude::*;
//!
//! let mut transposer = Transposer::builder().build()?;
//! transposer.load_wav_file("take.wav")?;
//!
//! let wav = transposer.render_wav(Semitones::new(-2)?, |status| println!("{}", status))?;
//! std::fs::write(transposer.output_file_name("wav")?, wav)?;
//! ```
//!
//! ## Feature Flags
//!
//! - `wav` (default) - WAV rendering, WAV input and Opus export

/// Re-export of transposer-core for direct access
pub use transposer_core as core;

/// Re-export of transposer-export for direct access
pub use transposer_export as export;

// Core types
pub use transposer_core::{
    pitch_scale, AudioBuffer, EngineFactory, FftSize, PhaseVocoderFactory, PipelineConfig,
    PitchRequest, Semitones, ShiftPhase, ShiftPipeline, ShiftProgress, StretchEngine,
};

// Export types
pub use transposer_export::{
    AudioFormat, ExportError, FfmpegFactory, ServiceFactory, TranscodeOptions, TranscodeOutput,
    TranscodeService, Transcoder,
};

mod builder;
mod config;
mod engine;
mod error;
mod naming;
pub mod worker;

pub use builder::TransposerBuilder;
pub use config::TransposerConfig;
pub use engine::{SourceId, Transposer};
pub use error::{Error, Result};
pub use naming::{output_file_name, DEFAULT_STEM};
pub use worker::{PendingShift, RequestId, ShiftWorker, WorkerStatus};

pub mod prelude {
    pub use crate::{
        AudioBuffer, AudioFormat, Error, FftSize, PipelineConfig, Result, Semitones,
        TranscodeOptions, Transposer, TransposerBuilder, TransposerConfig, WorkerStatus,
    };
}
