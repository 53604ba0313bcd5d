//! Retry-over-variants transcoding policy.

use super::service::{ServiceFactory, TranscodeService};
use super::{LogTail, TranscodeOutput, TranscodeVariant, INPUT_NAME, OPUS_VARIANTS};
use crate::error::{ExportError, Result};
use crate::options::TranscodeOptions;
use log::{debug, info, warn};

/// Transcodes WAV bytes, falling back through variants on failure.
///
/// The service is created lazily on the first attempt and kept for later
/// calls while it keeps succeeding.
pub struct Transcoder<F: ServiceFactory> {
    factory: F,
    service: Option<F::Service>,
    options: TranscodeOptions,
    variants: Vec<TranscodeVariant>,
}

impl<F: ServiceFactory> Transcoder<F> {
    pub fn new(factory: F, options: TranscodeOptions) -> Self {
        Self {
            factory,
            service: None,
            options,
            variants: OPUS_VARIANTS.to_vec(),
        }
    }

    /// Replace the fallback order.
    pub fn with_variants(mut self, variants: Vec<TranscodeVariant>) -> Self {
        self.variants = variants;
        self
    }

    pub fn options(&self) -> &TranscodeOptions {
        &self.options
    }

    pub fn variants(&self) -> &[TranscodeVariant] {
        &self.variants
    }

    /// Whether a loaded service is currently held.
    pub fn is_loaded(&self) -> bool {
        self.service.is_some()
    }

    /// Transcode at the configured bitrate.
    pub fn transcode(
        &mut self,
        input: &[u8],
        log_sink: Option<&mut dyn FnMut(&str)>,
    ) -> Result<TranscodeOutput> {
        self.transcode_with_bitrate(input, self.options.bitrate_kbps, log_sink)
    }

    /// Try each variant in order until one succeeds.
    ///
    /// Every diagnostic line, including the `ffmpeg attempt: <label>` marker
    /// written before each attempt, goes to `log_sink` and into the bounded
    /// tail reported by [`ExportError::TranscodeExhausted`].
    pub fn transcode_with_bitrate(
        &mut self,
        input: &[u8],
        bitrate_kbps: u32,
        mut log_sink: Option<&mut dyn FnMut(&str)>,
    ) -> Result<TranscodeOutput> {
        if bitrate_kbps == 0 {
            return Err(ExportError::InvalidOptions("bitrate must be > 0".into()));
        }
        let bitrate = format!("{}k", bitrate_kbps);
        let mut tail = LogTail::new(self.options.log_tail);
        let mut last_error: Option<ExportError> = None;

        let variants = self.variants.clone();
        for variant in variants {
            let label = variant.label();
            let mut on_log = |line: &str| {
                tail.push(line);
                if let Some(sink) = log_sink.as_mut() {
                    sink(line);
                }
            };
            on_log(&format!("ffmpeg attempt: {}", label));
            info!("ffmpeg attempt: {}", label);

            match self.attempt(&variant, input, &bitrate, &mut on_log) {
                Ok(output) => {
                    info!(
                        "Transcoded with {}: {} bytes ({})",
                        label,
                        output.bytes.len(),
                        output.mime_type
                    );
                    return Ok(output);
                }
                Err(e) => {
                    warn!("ffmpeg attempt {} failed: {}", label, e);
                    // The service may be in a bad state; start the next
                    // variant on a fresh one.
                    self.service = None;
                    last_error = Some(e);
                }
            }
        }

        let last_error = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no transcoding variants configured".to_string());
        Err(ExportError::TranscodeExhausted {
            last_error,
            log_tail: tail.into_lines(),
        })
    }

    fn attempt(
        &mut self,
        variant: &TranscodeVariant,
        input: &[u8],
        bitrate: &str,
        log: &mut dyn FnMut(&str),
    ) -> Result<TranscodeOutput> {
        let sample_rate = self.options.sample_rate;
        let service = self.ensure_loaded()?;
        let output_name = variant.output_name();

        service.write_file(INPUT_NAME, input)?;
        service.delete_file(&output_name)?;

        let code = service.exec(&variant.args(bitrate, sample_rate), log)?;
        if code != 0 {
            return Err(ExportError::TranscodeAttempt {
                label: variant.label(),
                reason: format!("ffmpeg exited with code {}", code),
            });
        }

        let bytes = service.read_file(&output_name)?;
        for name in [INPUT_NAME, output_name.as_str()] {
            if let Err(e) = service.delete_file(name) {
                debug!("Failed to clean up {}: {}", name, e);
            }
        }

        Ok(TranscodeOutput {
            bytes,
            extension: variant.container.extension(),
            mime_type: variant.mime_type(),
            variant: *variant,
        })
    }

    fn ensure_loaded(&mut self) -> Result<&mut F::Service> {
        let service = match self.service.take() {
            Some(service) => service,
            None => {
                let mut service = self.factory.create()?;
                service.load()?;
                service
            }
        };
        Ok(self.service.insert(service))
    }
}
