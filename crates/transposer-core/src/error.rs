//! Error types for the pitch-shift pipeline.

use thiserror::Error;

/// Error type.
#[derive(Error, Debug)]
pub enum Error {
    /// The engine could not allocate a session.
    #[error("Engine init failed: {0}")]
    EngineInit(String),

    /// The engine reported an unusable chunk or output size.
    #[error("Invalid engine sizing: chunk size {chunk_size}, max output {max_output}")]
    EngineSizing {
        chunk_size: usize,
        max_output: usize,
    },

    /// The engine produced more frames than its declared maximum.
    #[error("Engine output overrun: produced {produced} frames, maximum is {max_output}")]
    EngineOverrun { produced: usize, max_output: usize },

    /// An engine call was made in the wrong session state.
    #[error("Engine protocol violation: {0}")]
    Protocol(String),

    /// The engine failed while processing.
    #[error("Engine error: {0}")]
    Engine(String),

    /// Channel index outside the session's channel count.
    #[error("Channel {channel} out of range (session has {channels} channels)")]
    ChannelOutOfRange { channel: usize, channels: usize },

    /// Audio buffer violates the equal-length invariant.
    #[error("Invalid audio buffer: {0}")]
    InvalidBuffer(String),

    /// Semitone shift outside [-12, +12].
    #[error("Semitone shift {0} outside the supported range [-12, 12]")]
    InvalidSemitones(i32),

    /// Invalid pipeline configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type.
pub type Result<T> = std::result::Result<T, Error>;

impl From<rubato::ResamplerConstructionError> for Error {
    fn from(e: rubato::ResamplerConstructionError) -> Self {
        Error::EngineInit(e.to_string())
    }
}

impl From<rubato::ResampleError> for Error {
    fn from(e: rubato::ResampleError) -> Self {
        Error::Engine(e.to_string())
    }
}
