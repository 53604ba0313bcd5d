//! Chunked study/process pipeline.
//!
//! Drives one engine session across a whole buffer:
//!
//! 1. **Studying**: every chunk goes to `study`, the last one flagged final
//! 2. **Stretching**: a single `calculate_stretch`
//! 3. **Processing**: the same chunks go to `process`; output is collected
//! 4. **Draining**: `process(0, true)` until the engine reports nothing left
//!
//! The collected output is then trimmed by the engine's start delay and fitted
//! to the input length.

use crate::engine::{EngineFactory, EngineSession, PipelineState, StretchEngine};
use crate::error::{Error, Result};
use crate::progress::ShiftProgress;
use crate::reassemble::OutputAccumulator;
use crate::types::{AudioBuffer, PitchRequest};
use tracing::{debug, error, info};

/// One slice of the input, `[start, start + len)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSpan {
    pub start: usize,
    pub len: usize,
    pub is_final: bool,
}

impl ChunkSpan {
    pub fn end(&self) -> usize {
        self.start + self.len
    }
}

/// Chunk boundaries shared by the study and process passes.
///
/// Yields nothing for an empty input.
pub fn chunk_spans(total_frames: usize, chunk_size: usize) -> impl Iterator<Item = ChunkSpan> {
    let step = chunk_size.max(1);
    (0..total_frames).step_by(step).map(move |start| {
        let len = step.min(total_frames - start);
        ChunkSpan {
            start,
            len,
            is_final: start + len >= total_frames,
        }
    })
}

/// Runs pitch-shift requests against engines from `F`.
pub struct ShiftPipeline<F: EngineFactory> {
    factory: F,
    progress_interval: usize,
}

impl<F: EngineFactory> ShiftPipeline<F> {
    /// `progress_interval` is the number of chunks between progress reports.
    pub fn new(factory: F, progress_interval: usize) -> Self {
        Self {
            factory,
            progress_interval: progress_interval.max(1),
        }
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Shift the request's buffer, returning a buffer of identical shape.
    ///
    /// A zero shift or an empty buffer is returned unchanged without creating
    /// an engine session.
    pub fn run(
        &self,
        request: PitchRequest,
        mut on_progress: impl FnMut(ShiftProgress),
    ) -> Result<AudioBuffer> {
        if request.is_noop() {
            debug!(semitones = %request.semitones, "Pitch shift is a no-op");
            return Ok(request.buffer);
        }

        let PitchRequest { buffer, semitones } = request;
        let sample_rate = buffer.sample_rate();
        let total_frames = buffer.frame_count();

        info!(
            %semitones,
            sample_rate,
            channels = buffer.channel_count(),
            total_frames,
            "Pitch shift started"
        );

        let engine = self.factory.create(sample_rate, buffer.channel_count())?;
        let mut session = EngineSession::new(engine, sample_rate);

        let accumulated = match drive(
            &mut session,
            &buffer,
            semitones.pitch_scale(),
            self.progress_interval,
            &mut on_progress,
        ) {
            Ok(accumulated) => accumulated,
            Err(e) => {
                session.fail();
                error!("Pitch shift failed: {}", e);
                return Err(e);
            }
        };

        let start_delay = session.engine().start_delay();
        session.advance(PipelineState::Done)?;
        drop(session);

        debug!(
            start_delay,
            produced = accumulated.total_frames(),
            "Reassembling output"
        );
        let channels = accumulated.finish(start_delay, total_frames);
        info!(%semitones, total_frames, "Pitch shift finished");
        AudioBuffer::new(sample_rate, channels)
    }
}

fn drive<E: StretchEngine>(
    session: &mut EngineSession<E>,
    buffer: &AudioBuffer,
    pitch_scale: f64,
    progress_interval: usize,
    on_progress: &mut impl FnMut(ShiftProgress),
) -> Result<OutputAccumulator> {
    let total = buffer.frame_count();
    let chunk_size = session.engine().chunk_size();
    let max_output = session.engine().max_output_size();
    if chunk_size == 0 || max_output == 0 {
        return Err(Error::EngineSizing {
            chunk_size,
            max_output,
        });
    }

    session.engine_mut().configure(pitch_scale, total)?;
    session.advance(PipelineState::Configured)?;

    session.advance(PipelineState::Studying)?;
    for (index, span) in chunk_spans(total, chunk_size).enumerate() {
        stage_chunk(session.engine_mut(), buffer, span)?;
        session.engine_mut().study(span.len, span.is_final)?;
        if should_report(index, span, progress_interval) {
            on_progress(ShiftProgress::studying(span.end(), total));
        }
    }

    session.advance(PipelineState::Stretching)?;
    on_progress(ShiftProgress::stretching());
    session.engine_mut().calculate_stretch()?;

    session.advance(PipelineState::Processing)?;
    let mut accumulated = OutputAccumulator::new(buffer.channel_count());
    for (index, span) in chunk_spans(total, chunk_size).enumerate() {
        stage_chunk(session.engine_mut(), buffer, span)?;
        let produced = session.engine_mut().process(span.len, span.is_final)?;
        collect(session.engine(), produced, max_output, &mut accumulated)?;
        if should_report(index, span, progress_interval) {
            on_progress(ShiftProgress::processing(span.end(), total));
        }
    }

    session.advance(PipelineState::Draining)?;
    loop {
        let produced = session.engine_mut().process(0, true)?;
        if produced == 0 {
            break;
        }
        collect(session.engine(), produced, max_output, &mut accumulated)?;
    }

    Ok(accumulated)
}

fn stage_chunk<E: StretchEngine>(engine: &mut E, buffer: &AudioBuffer, span: ChunkSpan) -> Result<()> {
    for (channel, samples) in buffer.channels().iter().enumerate() {
        engine.write_input_chunk(channel, &samples[span.start..span.end()])?;
    }
    Ok(())
}

/// Copy `produced` frames out of engine staging. An overrun is rejected
/// before anything is appended.
fn collect<E: StretchEngine>(
    engine: &E,
    produced: usize,
    max_output: usize,
    accumulated: &mut OutputAccumulator,
) -> Result<()> {
    if produced == 0 {
        return Ok(());
    }
    if produced > max_output {
        return Err(Error::EngineOverrun {
            produced,
            max_output,
        });
    }
    let chunk = (0..engine.channel_count())
        .map(|channel| engine.read_output_chunk(channel, produced))
        .collect::<Result<Vec<_>>>()?;
    accumulated.push(chunk);
    Ok(())
}

fn should_report(index: usize, span: ChunkSpan, interval: usize) -> bool {
    span.is_final || (index + 1) % interval == 0
}
