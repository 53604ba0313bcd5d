//! Top-level configuration, loadable from TOML.
//!
//! ```toml
//! [pipeline]
//! chunk_size = 1024
//! fft_size = "large"
//!
//! [transcode]
//! bitrate_kbps = 96
//! ffmpeg_path = "/usr/local/bin/ffmpeg"
//! ```
//!
//! Missing tables and keys fall back to their defaults.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use transposer_core::PipelineConfig;
use transposer_export::TranscodeOptions;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransposerConfig {
    pub pipeline: PipelineConfig,
    pub transcode: TranscodeOptions,
}

impl TransposerConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        tracing::debug!(path = %path.display(), "Loading configuration");
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        self.pipeline.validate()?;
        if self.transcode.bitrate_kbps == 0 {
            return Err(Error::Config("transcode.bitrate_kbps must be > 0".into()));
        }
        if self.transcode.sample_rate == 0 {
            return Err(Error::Config("transcode.sample_rate must be > 0".into()));
        }
        Ok(())
    }
}
