//! Error types for transposer-export

use std::io;
use thiserror::Error;

/// Export error type
#[derive(Error, Debug)]
pub enum ExportError {
    /// I/O error during file operations
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Unsupported format or feature not enabled
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Invalid export options
    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    /// Invalid audio data
    #[error("Invalid audio data: {0}")]
    InvalidData(String),

    /// The transcoding service could not be started.
    #[error("Transcoder load failed: {0}")]
    ServiceLoad(String),

    /// One transcoding variant failed. Recovered by trying the next one.
    #[error("{reason}")]
    TranscodeAttempt { label: String, reason: String },

    /// Every transcoding variant failed.
    #[error("{}", render_exhausted(.last_error, .log_tail))]
    TranscodeExhausted {
        last_error: String,
        log_tail: Vec<String>,
    },
}

/// `<last error> | ffmpeg: l1 || l2 ...`, without the suffix when no log
/// lines were captured.
fn render_exhausted(last_error: &str, log_tail: &[String]) -> String {
    if log_tail.is_empty() {
        last_error.to_string()
    } else {
        format!("{} | ffmpeg: {}", last_error, log_tail.join(" || "))
    }
}

/// Result type for export operations
pub type Result<T> = std::result::Result<T, ExportError>;

// From trait implementations for external library errors at API boundary

#[cfg(feature = "wav")]
impl From<hound::Error> for ExportError {
    fn from(e: hound::Error) -> Self {
        match e {
            hound::Error::IoError(io) => ExportError::Io(io),
            hound::Error::Unsupported => {
                ExportError::UnsupportedFormat("WAV variant not supported".into())
            }
            other => ExportError::InvalidData(other.to_string()),
        }
    }
}

impl From<transposer_core::Error> for ExportError {
    fn from(e: transposer_core::Error) -> Self {
        ExportError::InvalidData(e.to_string())
    }
}
