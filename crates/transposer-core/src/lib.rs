//! # Transposer Core
//!
//! Streaming pitch-shift pipeline: drives a time-stretch engine through a
//! chunked study/process protocol and reassembles a sample-accurate output of
//! the same length as the input.
//!
//! ```ignore
//! use transposer_core::{AudioBuffer, PhaseVocoderFactory, PitchRequest, Semitones, ShiftPipeline};
//!
//! let pipeline = ShiftPipeline::new(PhaseVocoderFactory::default(), 32);
//! let request = PitchRequest::new(buffer, Semitones::new(3)?);
//! let shifted = pipeline.run(request, |progress| println!("{}", progress))?;
//! assert_eq!(shifted.frame_count(), original_frames);
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod pipeline;
pub mod progress;
pub mod reassemble;
pub mod types;

pub use config::{FftSize, PipelineConfig};
pub use engine::{
    EngineFactory, EngineSession, PhaseVocoderEngine, PhaseVocoderFactory, PipelineState,
    StretchEngine,
};
pub use error::{Error, Result};
pub use pipeline::{chunk_spans, ChunkSpan, ShiftPipeline};
pub use progress::{ShiftPhase, ShiftProgress};
pub use reassemble::OutputAccumulator;
pub use types::{pitch_scale, AudioBuffer, PitchRequest, Semitones};
