//! Built-in engine: phase-vocoder time stretch followed by resampling.
//!
//! The signal is stretched by the pitch scale (duration grows, pitch
//! unchanged), then resampled by the inverse ratio so duration returns to the
//! original and pitch moves by the scale factor.

use super::phase_vocoder::PhaseVocoderProcessor;
use super::{EngineFactory, StretchEngine};
use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use rubato::{FftFixedIn, Resampler};
use rustfft::FftPlanner;
use std::collections::VecDeque;
use tracing::{debug, warn};

/// Pitch scales outside this range would need more than one octave of
/// stretch in either direction.
const MIN_PITCH_SCALE: f64 = 0.25;
const MAX_PITCH_SCALE: f64 = 4.0;

const RESAMPLER_CHUNK: usize = 1024;
const RESAMPLER_SUB_CHUNKS: usize = 2;

/// Block energy must jump by this factor (~6 dB) to count as an onset.
const ONSET_RATIO: f32 = 4.0;
/// Mean-square floor below which blocks are treated as silence (-60 dB).
const ONSET_FLOOR: f32 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Created,
    Configured,
    Studying,
    Processing,
}

/// Creates [`PhaseVocoderEngine`] sessions.
#[derive(Debug, Clone, Default)]
pub struct PhaseVocoderFactory {
    config: PipelineConfig,
}

impl PhaseVocoderFactory {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }
}

impl EngineFactory for PhaseVocoderFactory {
    type Engine = PhaseVocoderEngine;

    fn create(&self, sample_rate: u32, channels: usize) -> Result<PhaseVocoderEngine> {
        if sample_rate == 0 {
            return Err(Error::EngineInit("sample rate must be > 0".into()));
        }
        if channels == 0 {
            return Err(Error::EngineInit("channel count must be > 0".into()));
        }
        self.config
            .validate()
            .map_err(|e| Error::EngineInit(e.to_string()))?;
        Ok(PhaseVocoderEngine::new(sample_rate, channels, self.config))
    }
}

/// Study-pass analysis: per-hop block energy summed over channels.
struct OnsetAnalysis {
    hop: usize,
    block_energy: Vec<f32>,
    partial_energy: f32,
    partial_len: usize,
    studied: usize,
    onsets: Vec<usize>,
}

impl OnsetAnalysis {
    fn new(hop: usize) -> Self {
        Self {
            hop,
            block_energy: Vec::new(),
            partial_energy: 0.0,
            partial_len: 0,
            studied: 0,
            onsets: Vec::new(),
        }
    }

    fn push(&mut self, staging: &[Vec<f32>], frames: usize) {
        for i in 0..frames {
            self.partial_energy += staging.iter().map(|ch| ch[i] * ch[i]).sum::<f32>();
            self.partial_len += 1;
            if self.partial_len == self.hop {
                self.close_block();
            }
        }
        self.studied += frames;
    }

    fn close_block(&mut self) {
        if self.partial_len > 0 {
            self.block_energy
                .push(self.partial_energy / self.partial_len as f32);
        }
        self.partial_energy = 0.0;
        self.partial_len = 0;
    }

    /// Mark block starts where energy jumps sharply, at most one per
    /// `min_gap` frames.
    fn detect(&mut self, min_gap: usize) {
        self.onsets.clear();
        let mut last: Option<usize> = None;
        for (b, pair) in self.block_energy.windows(2).enumerate() {
            let (prev, cur) = (pair[0], pair[1]);
            if cur <= ONSET_FLOOR || cur <= ONSET_RATIO * prev.max(ONSET_FLOOR) {
                continue;
            }
            let position = (b + 1) * self.hop;
            if last.is_some_and(|l| position - l < min_gap) {
                continue;
            }
            self.onsets.push(position);
            last = Some(position);
        }
    }
}

/// Synthesis-side state, built once the pitch scale is known.
struct Synthesis {
    vocoders: Vec<PhaseVocoderProcessor>,
    resampler: FftFixedIn<f32>,
    /// Stretched samples waiting for a full resampler chunk.
    stretched: Vec<Vec<f32>>,
    /// Resampled samples not yet handed out.
    pending: Vec<VecDeque<f32>>,
    generated: usize,
    /// Output needed to cover the start delay plus the whole input.
    target: usize,
    flushed: bool,
}

impl Synthesis {
    fn resample_chunk(&mut self, need: usize) -> Result<()> {
        let input: Vec<&[f32]> = self.stretched.iter().map(|ch| &ch[..need]).collect();
        let output = self.resampler.process(&input, None)?;
        for (pending, out) in self.pending.iter_mut().zip(&output) {
            pending.extend(out.iter().copied());
        }
        self.generated += output.first().map_or(0, Vec::len);
        for ch in &mut self.stretched {
            ch.drain(..need);
        }
        Ok(())
    }

    /// Resample every full chunk; once flushed, pad with silence until the
    /// target is reached.
    fn resample_available(&mut self) -> Result<()> {
        loop {
            let need = self.resampler.input_frames_next();
            let available = self.stretched.first().map_or(0, Vec::len);
            if available >= need {
                self.resample_chunk(need)?;
            } else if self.flushed && self.generated < self.target {
                for ch in &mut self.stretched {
                    ch.resize(need, 0.0);
                }
                self.resample_chunk(need)?;
            } else {
                return Ok(());
            }
        }
    }
}

/// Offline phase-vocoder pitch shifter.
///
/// The study pass records block energy to locate transients; the process
/// pass re-seeds vocoder phases at those transients to keep attacks sharp.
pub struct PhaseVocoderEngine {
    sample_rate: u32,
    channels: usize,
    config: PipelineConfig,
    stage: Stage,
    expected_frames: usize,
    input_staging: Vec<Vec<f32>>,
    output_staging: Vec<Vec<f32>>,
    analysis: OnsetAnalysis,
    synthesis: Option<Synthesis>,
    start_delay: usize,
}

impl PhaseVocoderEngine {
    fn new(sample_rate: u32, channels: usize, config: PipelineConfig) -> Self {
        Self {
            sample_rate,
            channels,
            config,
            stage: Stage::Created,
            expected_frames: 0,
            input_staging: vec![vec![0.0; config.chunk_size]; channels],
            output_staging: vec![vec![0.0; config.max_output_size]; channels],
            analysis: OnsetAnalysis::new(config.fft_size.analysis_hop()),
            synthesis: None,
            start_delay: 0,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Transient positions found by the study pass.
    pub fn onsets(&self) -> &[usize] {
        &self.analysis.onsets
    }

    fn check_channel(&self, channel: usize) -> Result<()> {
        if channel >= self.channels {
            return Err(Error::ChannelOutOfRange {
                channel,
                channels: self.channels,
            });
        }
        Ok(())
    }

    fn check_frames(&self, frames: usize) -> Result<()> {
        if frames > self.config.chunk_size {
            return Err(Error::Protocol(format!(
                "{} frames exceed chunk size {}",
                frames, self.config.chunk_size
            )));
        }
        Ok(())
    }
}

impl StretchEngine for PhaseVocoderEngine {
    fn channel_count(&self) -> usize {
        self.channels
    }

    fn configure(&mut self, pitch_scale: f64, expected_total_frames: usize) -> Result<()> {
        if self.stage != Stage::Created {
            return Err(Error::Protocol("engine already configured".into()));
        }
        if !pitch_scale.is_finite() || !(MIN_PITCH_SCALE..=MAX_PITCH_SCALE).contains(&pitch_scale)
        {
            return Err(Error::InvalidConfig(format!(
                "pitch scale {} outside [{}, {}]",
                pitch_scale, MIN_PITCH_SCALE, MAX_PITCH_SCALE
            )));
        }

        let fft_size = self.config.fft_size.size();
        let hop_analysis = self.config.fft_size.analysis_hop();
        let mut planner = FftPlanner::new();
        let vocoders: Vec<PhaseVocoderProcessor> = (0..self.channels)
            .map(|_| PhaseVocoderProcessor::new(&mut planner, fft_size, hop_analysis, pitch_scale))
            .collect();

        let hop_synthesis = vocoders[0].hop_synthesis();
        let latency = vocoders[0].latency();
        // Stretched signal at hop_synthesis per hop_analysis, resampled back
        // to hop_analysis.
        let resampler = FftFixedIn::<f32>::new(
            hop_synthesis,
            hop_analysis,
            RESAMPLER_CHUNK,
            RESAMPLER_SUB_CHUNKS,
            self.channels,
        )?;

        self.start_delay = (latency * hop_analysis as f64 / hop_synthesis as f64).round()
            as usize
            + resampler.output_delay();
        self.expected_frames = expected_total_frames;
        self.synthesis = Some(Synthesis {
            vocoders,
            resampler,
            stretched: vec![Vec::new(); self.channels],
            pending: vec![VecDeque::new(); self.channels],
            generated: 0,
            target: self.start_delay + expected_total_frames,
            flushed: false,
        });
        self.stage = Stage::Configured;

        debug!(
            pitch_scale,
            expected_total_frames,
            hop_synthesis,
            start_delay = self.start_delay,
            "Phase vocoder engine configured"
        );
        Ok(())
    }

    fn chunk_size(&self) -> usize {
        self.config.chunk_size
    }

    fn max_output_size(&self) -> usize {
        self.config.max_output_size
    }

    fn write_input_chunk(&mut self, channel: usize, samples: &[f32]) -> Result<()> {
        self.check_channel(channel)?;
        self.check_frames(samples.len())?;
        let staging = &mut self.input_staging[channel];
        staging[..samples.len()].copy_from_slice(samples);
        staging[samples.len()..].fill(0.0);
        Ok(())
    }

    fn study(&mut self, frames: usize, is_final: bool) -> Result<()> {
        match self.stage {
            Stage::Configured => self.stage = Stage::Studying,
            Stage::Studying => {}
            stage => {
                return Err(Error::Protocol(format!(
                    "study called in {:?} stage",
                    stage
                )))
            }
        }
        self.check_frames(frames)?;
        self.analysis.push(&self.input_staging, frames);
        if is_final {
            self.analysis.close_block();
            if self.analysis.studied != self.expected_frames {
                warn!(
                    studied = self.analysis.studied,
                    expected = self.expected_frames,
                    "Study pass length differs from configured total"
                );
            }
        }
        Ok(())
    }

    fn calculate_stretch(&mut self) -> Result<()> {
        if self.stage != Stage::Studying {
            return Err(Error::Protocol(format!(
                "calculate_stretch called in {:?} stage",
                self.stage
            )));
        }
        self.analysis.detect(self.config.fft_size.size());
        debug!(onsets = self.analysis.onsets.len(), "Stretch profile ready");
        self.stage = Stage::Processing;
        Ok(())
    }

    fn process(&mut self, frames: usize, is_final: bool) -> Result<usize> {
        if self.stage != Stage::Processing {
            return Err(Error::Protocol(format!(
                "process called in {:?} stage",
                self.stage
            )));
        }
        self.check_frames(frames)?;
        let synthesis = self
            .synthesis
            .as_mut()
            .ok_or_else(|| Error::Protocol("engine not configured".into()))?;

        if frames > 0 {
            if synthesis.flushed {
                return Err(Error::Protocol("input after final chunk".into()));
            }
            for ((vocoder, stretched), input) in synthesis
                .vocoders
                .iter_mut()
                .zip(synthesis.stretched.iter_mut())
                .zip(&self.input_staging)
            {
                vocoder.push_input(&input[..frames]);
                vocoder.process(&self.analysis.onsets, stretched);
            }
        }

        if is_final && !synthesis.flushed {
            for (vocoder, stretched) in synthesis
                .vocoders
                .iter_mut()
                .zip(synthesis.stretched.iter_mut())
            {
                vocoder.flush(&self.analysis.onsets, stretched);
            }
            synthesis.flushed = true;
        }

        synthesis.resample_available()?;

        let available = synthesis.pending.first().map_or(0, VecDeque::len);
        let produced = available.min(self.config.max_output_size);
        for (pending, staging) in synthesis
            .pending
            .iter_mut()
            .zip(self.output_staging.iter_mut())
        {
            for (dst, src) in staging.iter_mut().zip(pending.drain(..produced)) {
                *dst = src;
            }
        }
        Ok(produced)
    }

    fn read_output_chunk(&self, channel: usize, count: usize) -> Result<&[f32]> {
        self.check_channel(channel)?;
        if count > self.config.max_output_size {
            return Err(Error::Protocol(format!(
                "{} frames exceed output staging of {}",
                count, self.config.max_output_size
            )));
        }
        Ok(&self.output_staging[channel][..count])
    }

    fn start_delay(&self) -> usize {
        self.start_delay
    }
}
