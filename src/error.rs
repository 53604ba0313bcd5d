//! Centralized error type for the transposer umbrella crate.
//!
//! Wraps all subsystem errors so `?` propagates naturally across crate boundaries.

use crate::worker::RequestId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] transposer_core::Error),

    #[error("Export: {0}")]
    Export(#[from] transposer_export::ExportError),

    /// A shift is already in flight on the worker.
    #[error("Worker busy: a pitch shift is already in progress")]
    WorkerBusy,

    #[error("Failed to spawn worker thread: {0}")]
    WorkerSpawn(String),

    #[error("Failed to send request to worker thread")]
    WorkerSend,

    #[error("Worker thread stopped before replying")]
    WorkerRecv,

    #[error("Reply for request {got} while waiting for {expected}")]
    ReplyMismatch { expected: RequestId, got: RequestId },

    /// An operation needs a loaded source or rendered result.
    #[error("{0}")]
    NotReady(&'static str),

    #[error("Config: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}
