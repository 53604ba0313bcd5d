//! Top-level pitch-shift engine.

use crate::builder::TransposerBuilder;
use crate::config::TransposerConfig;
use crate::error::{Error, Result};
use crate::naming::output_file_name;
use crate::worker::{ShiftWorker, WorkerStatus};
use std::fmt;
use transposer_core::{AudioBuffer, PitchRequest, Semitones};
use transposer_export::{FfmpegFactory, ServiceFactory, TranscodeOutput, Transcoder};

#[cfg(feature = "wav")]
use std::path::Path;

/// Identifies one loaded source. Every [`Transposer::load`] issues a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceId(u64);

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "source-{}", self.0)
    }
}

struct LoadedSource {
    id: SourceId,
    name: Option<String>,
    buffer: AudioBuffer,
}

struct Rendered {
    source: SourceId,
    semitones: Semitones,
    buffer: AudioBuffer,
    /// Opus artifact for this render, once exported.
    opus: Option<TranscodeOutput>,
}

/// Main pitch-shift engine.
///
/// Owns the shift worker thread and the transcoder. Holds one loaded source
/// and the most recent render of it; asking for the same shift of the same
/// source again returns the cached render without reprocessing.
///
/// ```ignore
/// use transposer::{Semitones, Transposer};
///
/// let mut transposer = Transposer::builder().build()?;
/// transposer.load_wav_file("take.wav")?;
/// let shifted = transposer.render(Semitones::new(3)?, |status| println!("{}", status))?;
/// let opus = transposer.export_opus(None)?;
/// ```
pub struct Transposer<S: ServiceFactory = FfmpegFactory> {
    worker: ShiftWorker,
    transcoder: Transcoder<S>,
    config: TransposerConfig,
    source: Option<LoadedSource>,
    rendered: Option<Rendered>,
    next_source: u64,
}

impl Transposer<FfmpegFactory> {
    pub fn builder() -> TransposerBuilder {
        TransposerBuilder::default()
    }
}

impl<S: ServiceFactory> Transposer<S> {
    pub(crate) fn from_parts(
        worker: ShiftWorker,
        transcoder: Transcoder<S>,
        config: TransposerConfig,
    ) -> Self {
        Self {
            worker,
            transcoder,
            config,
            source: None,
            rendered: None,
            next_source: 1,
        }
    }

    pub fn config(&self) -> &TransposerConfig {
        &self.config
    }

    pub fn worker(&self) -> &ShiftWorker {
        &self.worker
    }

    /// Replace the loaded source. Drops any previous render.
    pub fn load(&mut self, buffer: AudioBuffer) -> SourceId {
        self.load_source(None, buffer)
    }

    /// Like [`load`](Self::load), remembering a file name for
    /// [`output_file_name`](Self::output_file_name).
    pub fn load_named(&mut self, name: impl Into<String>, buffer: AudioBuffer) -> SourceId {
        self.load_source(Some(name.into()), buffer)
    }

    /// Decode a WAV file and load it under its file name.
    #[cfg(feature = "wav")]
    pub fn load_wav_file(&mut self, path: impl AsRef<Path>) -> Result<SourceId> {
        let path = path.as_ref();
        let buffer = transposer_export::read_wav(path)?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());
        Ok(self.load_source(name, buffer))
    }

    fn load_source(&mut self, name: Option<String>, buffer: AudioBuffer) -> SourceId {
        let id = SourceId(self.next_source);
        self.next_source += 1;
        tracing::info!(
            source = %id,
            name = name.as_deref().unwrap_or("-"),
            "Loaded: {}ch @ {} Hz | {:.2}s",
            buffer.channel_count(),
            buffer.sample_rate(),
            buffer.duration_seconds()
        );
        self.rendered = None;
        self.source = Some(LoadedSource { id, name, buffer });
        id
    }

    pub fn source(&self) -> Option<&AudioBuffer> {
        self.source.as_ref().map(|source| &source.buffer)
    }

    pub fn source_id(&self) -> Option<SourceId> {
        self.source.as_ref().map(|source| source.id)
    }

    pub fn source_name(&self) -> Option<&str> {
        self.source.as_ref().and_then(|source| source.name.as_deref())
    }

    /// Whether [`render`](Self::render) would do any work: a source is
    /// loaded, the shift is not zero, and it differs from the cached render.
    pub fn can_render(&self, semitones: Semitones) -> bool {
        let Some(source) = &self.source else {
            return false;
        };
        !semitones.is_identity() && !self.is_cached(source.id, semitones)
    }

    fn is_cached(&self, source: SourceId, semitones: Semitones) -> bool {
        matches!(&self.rendered, Some(r) if r.source == source && r.semitones == semitones)
    }

    /// Shift the loaded source on the worker thread, blocking until done.
    ///
    /// Status notifications are forwarded to `on_status` while waiting. A
    /// shift of zero returns a copy of the source without touching an engine.
    pub fn render(
        &mut self,
        semitones: Semitones,
        on_status: impl FnMut(WorkerStatus),
    ) -> Result<&AudioBuffer> {
        let source = self
            .source
            .as_ref()
            .ok_or(Error::NotReady("No audio loaded"))?;
        let source_id = source.id;

        if self.is_cached(source_id, semitones) {
            tracing::debug!(source = %source_id, %semitones, "Render cache hit");
        } else {
            let request = PitchRequest::new(source.buffer.clone(), semitones);
            self.rendered = None;
            let pending = self.worker.submit(request)?;
            let buffer = pending.wait_with_status(self.worker.status(), on_status)?;
            tracing::info!(
                source = %source_id,
                %semitones,
                "Done. Output length: {:.2}s",
                buffer.duration_seconds()
            );
            self.rendered = Some(Rendered {
                source: source_id,
                semitones,
                buffer,
                opus: None,
            });
        }

        self.rendered()
            .ok_or(Error::NotReady("Render produced no output"))
    }

    /// The most recent render, if it belongs to the loaded source.
    pub fn rendered(&self) -> Option<&AudioBuffer> {
        self.rendered.as_ref().map(|r| &r.buffer)
    }

    pub fn rendered_semitones(&self) -> Option<Semitones> {
        self.rendered.as_ref().map(|r| r.semitones)
    }

    /// Render, then encode as 16-bit PCM WAV.
    #[cfg(feature = "wav")]
    pub fn render_wav(
        &mut self,
        semitones: Semitones,
        on_status: impl FnMut(WorkerStatus),
    ) -> Result<Vec<u8>> {
        let buffer = self.render(semitones, on_status)?;
        Ok(transposer_export::encode_wav_memory(buffer)?)
    }

    /// Transcode the current render to Opus.
    ///
    /// The artifact is cached with the render; a new render or load
    /// invalidates it. `log_sink` receives transcoder diagnostics.
    #[cfg(feature = "wav")]
    pub fn export_opus(
        &mut self,
        log_sink: Option<&mut dyn FnMut(&str)>,
    ) -> Result<&TranscodeOutput> {
        let rendered = self
            .rendered
            .as_mut()
            .ok_or(Error::NotReady("Nothing rendered yet"))?;

        if rendered.opus.is_none() {
            let wav = transposer_export::encode_wav_memory(&rendered.buffer)?;
            let output = self.transcoder.transcode(&wav, log_sink)?;
            tracing::info!(
                semitones = %rendered.semitones,
                "Encoded {} ({} bytes)",
                output.mime_type,
                output.bytes.len()
            );
            rendered.opus = Some(output);
        }

        rendered
            .opus
            .as_ref()
            .ok_or(Error::NotReady("Opus export unavailable"))
    }

    /// Suggested download name for the current render in `extension`.
    pub fn output_file_name(&self, extension: &str) -> Result<String> {
        let semitones = self
            .rendered_semitones()
            .ok_or(Error::NotReady("Nothing rendered yet"))?;
        Ok(output_file_name(self.source_name(), semitones, extension))
    }

    pub fn transcoder(&self) -> &Transcoder<S> {
        &self.transcoder
    }
}
