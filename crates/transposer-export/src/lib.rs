//! # Transposer Export
//!
//! Container I/O around the pitch-shift pipeline:
//! - **WAV**: 16-bit PCM encoding and multi-format decoding via hound
//! - **Opus**: transcoding through ffmpeg with container/channel-layout fallback
//!
//! ```ignore
//! use transposer_export::{encode_wav_memory, FfmpegFactory, TranscodeOptions, Transcoder};
//!
//! let wav = encode_wav_memory(&shifted)?;
//! let options = TranscodeOptions::default();
//! let mut transcoder = Transcoder::new(FfmpegFactory::from_options(&options), options);
//! let opus = transcoder.transcode(&wav, None)?;
//! std::fs::write(format!("out.{}", opus.extension), &opus.bytes)?;
//! ```
//!
//! ## Feature Flags
//!
//! - `wav` (default): WAV support via hound (pure Rust)

// Core modules
pub mod error;
mod options;

pub mod format;
pub mod transcode;

// Re-exports
pub use error::{ExportError, Result};
pub use options::{AudioFormat, TranscodeOptions};
pub use transcode::{
    ChannelLayout, Container, FfmpegFactory, FfmpegService, ServiceFactory, TranscodeOutput,
    TranscodeService, TranscodeVariant, Transcoder, OPUS_VARIANTS,
};

// Format-specific exports
#[cfg(feature = "wav")]
pub use format::wav::{decode_wav, encode_wav_file, encode_wav_memory, read_wav, wav_size};
