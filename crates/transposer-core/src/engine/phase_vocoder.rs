//! Phase vocoder time-stretcher for one channel.
//!
//! ## Algorithm Overview
//!
//! 1. **Analysis**: Window input with a Hann window every `hop_analysis` samples, FFT
//! 2. **Phase Unwrapping**: Instantaneous frequency from the phase advance between frames
//! 3. **Phase Reset**: At transients the synthesis phase is re-seeded from the analysis phase
//! 4. **Synthesis**: Advance phases by `hop_synthesis`, IFFT, windowed overlap-add
//!
//! The output is `hop_synthesis / hop_analysis` times longer than the input with
//! the pitch unchanged. Input is primed with `fft_size` zeros so the first
//! analysis frame already sees real signal under its tail.

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::f32::consts::PI;
use std::sync::Arc;

const TWO_PI: f32 = 2.0 * PI;

pub struct PhaseVocoderProcessor {
    fft_size: usize,
    hop_analysis: usize,
    hop_synthesis: usize,

    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    spectrum: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,

    last_phase: Vec<f32>,
    phase_accumulator: Vec<f32>,
    expected_phase_diff: Vec<f32>,

    /// Pending input; `input[read_pos..]` has not been consumed yet.
    input: Vec<f32>,
    read_pos: usize,
    /// Overlap-add accumulator, `fft_size` long.
    overlap: Vec<f32>,
    output_gain: f32,

    frames_processed: usize,
    next_onset: usize,
}

impl PhaseVocoderProcessor {
    /// Create a processor stretching by roughly `stretch`.
    ///
    /// The synthesis hop is rounded to whole samples; use
    /// [`effective_stretch()`](Self::effective_stretch) for the exact ratio.
    pub fn new(
        planner: &mut FftPlanner<f32>,
        fft_size: usize,
        hop_analysis: usize,
        stretch: f64,
    ) -> Self {
        let hop_synthesis = ((hop_analysis as f64 * stretch).round() as usize).max(1);
        let num_bins = fft_size / 2 + 1;

        let forward = planner.plan_fft_forward(fft_size);
        let inverse = planner.plan_fft_inverse(fft_size);
        let scratch_len = forward
            .get_inplace_scratch_len()
            .max(inverse.get_inplace_scratch_len());

        let expected_phase_diff: Vec<f32> = (0..num_bins)
            .map(|k| TWO_PI * (k as f32) * (hop_analysis as f32) / (fft_size as f32))
            .collect();

        // IFFT is unnormalised (1/N); Hann^2 overlap-add sums to 3N / (8 * hop).
        let output_gain = (8.0 * hop_synthesis as f32) / (3.0 * fft_size as f32 * fft_size as f32);

        Self {
            fft_size,
            hop_analysis,
            hop_synthesis,
            forward,
            inverse,
            window: create_hann_window(fft_size),
            spectrum: vec![Complex::new(0.0, 0.0); fft_size],
            scratch: vec![Complex::new(0.0, 0.0); scratch_len],
            last_phase: vec![0.0; num_bins],
            phase_accumulator: vec![0.0; num_bins],
            expected_phase_diff,
            input: vec![0.0; fft_size],
            read_pos: 0,
            overlap: vec![0.0; fft_size],
            output_gain,
            frames_processed: 0,
            next_onset: 0,
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn hop_synthesis(&self) -> usize {
        self.hop_synthesis
    }

    /// Exact stretch ratio after hop rounding. This is also the pitch ratio
    /// the engine realises; see [`FftSize`](crate::config::FftSize) for the
    /// error per size.
    pub fn effective_stretch(&self) -> f64 {
        self.hop_synthesis as f64 / self.hop_analysis as f64
    }

    /// Offset, in stretched samples, between input sample 0 and its image in
    /// the output.
    pub fn latency(&self) -> f64 {
        self.fft_size as f64 / 2.0 * (self.effective_stretch() + 1.0)
    }

    pub fn push_input(&mut self, samples: &[f32]) {
        self.input.extend_from_slice(samples);
    }

    /// Run every frame the pending input allows, appending finished output
    /// samples to `out`.
    ///
    /// `onsets` are sorted input positions where the synthesis phase should be
    /// re-seeded.
    pub fn process(&mut self, onsets: &[usize], out: &mut Vec<f32>) {
        while self.input.len() - self.read_pos >= self.fft_size {
            let reset = self.crossed_onset(onsets);
            self.process_frame(reset);
            out.extend_from_slice(&self.overlap[..self.hop_synthesis]);
            self.overlap.copy_within(self.hop_synthesis.., 0);
            let tail = self.fft_size - self.hop_synthesis;
            self.overlap[tail..].fill(0.0);
        }
        self.compact_input();
    }

    /// Push trailing silence so every frame touching real input is
    /// synthesised, then emit the remaining overlap tail.
    pub fn flush(&mut self, onsets: &[usize], out: &mut Vec<f32>) {
        let padding = vec![0.0; self.fft_size + self.hop_analysis];
        self.push_input(&padding);
        self.process(onsets, out);
        out.extend_from_slice(&self.overlap);
        self.overlap.fill(0.0);
    }

    /// Whether the current frame's centre has passed the next onset.
    fn crossed_onset(&mut self, onsets: &[usize]) -> bool {
        // Frame centre in input coordinates, accounting for the priming zeros.
        let centre = (self.frames_processed * self.hop_analysis) as isize
            - (self.fft_size / 2) as isize;
        let mut crossed = false;
        while let Some(&onset) = onsets.get(self.next_onset) {
            if onset as isize > centre {
                break;
            }
            crossed = true;
            self.next_onset += 1;
        }
        crossed
    }

    fn process_frame(&mut self, reset_phase: bool) {
        let num_bins = self.fft_size / 2 + 1;
        let frame = &self.input[self.read_pos..self.read_pos + self.fft_size];

        for ((bin, &sample), &w) in self.spectrum.iter_mut().zip(frame).zip(&self.window) {
            *bin = Complex::new(sample * w, 0.0);
        }
        self.read_pos += self.hop_analysis;

        self.forward
            .process_with_scratch(&mut self.spectrum, &mut self.scratch);

        let hop_ratio = self.hop_synthesis as f32 / self.hop_analysis as f32;
        let first = self.frames_processed == 0;

        for k in 0..num_bins {
            let magnitude = self.spectrum[k].norm();
            let phase = self.spectrum[k].arg();

            if first || reset_phase {
                self.phase_accumulator[k] = phase;
            } else {
                let expected = self.expected_phase_diff[k];
                let deviation = wrap_phase(phase - self.last_phase[k] - expected);
                let true_advance = expected + deviation;
                self.phase_accumulator[k] =
                    wrap_phase(self.phase_accumulator[k] + true_advance * hop_ratio);
            }
            self.last_phase[k] = phase;
            self.spectrum[k] = Complex::from_polar(magnitude, self.phase_accumulator[k]);
        }

        // Conjugate symmetry for a real-valued result
        for k in 1..num_bins - 1 {
            self.spectrum[self.fft_size - k] = self.spectrum[k].conj();
        }

        self.inverse
            .process_with_scratch(&mut self.spectrum, &mut self.scratch);

        for ((acc, bin), &w) in self
            .overlap
            .iter_mut()
            .zip(&self.spectrum)
            .zip(&self.window)
        {
            *acc += bin.re * w * self.output_gain;
        }

        self.frames_processed += 1;
    }

    /// Drop consumed input once it dominates the buffer.
    fn compact_input(&mut self) {
        if self.read_pos > self.fft_size * 4 {
            self.input.drain(..self.read_pos);
            self.read_pos = 0;
        }
    }
}

fn create_hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| 0.5 * (1.0 - (TWO_PI * i as f32 / size as f32).cos()))
        .collect()
}

/// Wrap phase to [-PI, PI]
#[inline]
fn wrap_phase(phase: f32) -> f32 {
    phase - TWO_PI * (phase / TWO_PI).round()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn sine(freq: f32, sample_rate: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (TWO_PI * freq * i as f32 / sample_rate).sin() * 0.5)
            .collect()
    }

    #[test]
    fn test_hann_window() {
        let window = create_hann_window(1024);
        assert_eq!(window.len(), 1024);
        assert!(window[0] < 0.001);
        assert_abs_diff_eq!(window[512], 1.0, epsilon = 0.001);
    }

    #[test]
    fn test_wrap_phase() {
        assert_abs_diff_eq!(wrap_phase(0.0), 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(wrap_phase(3.0 * PI).abs(), PI, epsilon = 1e-4);
        assert_abs_diff_eq!(wrap_phase(0.5 + 4.0 * PI), 0.5, epsilon = 1e-4);
        assert_abs_diff_eq!(wrap_phase(-0.5 - 4.0 * PI), -0.5, epsilon = 1e-4);
    }

    #[test]
    fn test_hop_rounding() {
        let mut planner = FftPlanner::new();
        let proc = PhaseVocoderProcessor::new(&mut planner, 4096, 512, 2.0_f64.powf(1.0 / 12.0));
        assert_eq!(proc.hop_synthesis(), 542);
        assert_abs_diff_eq!(proc.effective_stretch(), 542.0 / 512.0, epsilon = 1e-12);
    }

    #[test]
    fn test_hop_rounding_pitch_error_per_fft_size() {
        use crate::config::FftSize;

        let mut planner = FftPlanner::new();
        for (fft, max_cents) in [
            (FftSize::Small, 9.4),
            (FftSize::Medium, 5.0),
            (FftSize::Large, 2.5),
            (FftSize::XLarge, 1.5),
        ] {
            for semitones in -12..=12 {
                let scale = 2.0_f64.powf(semitones as f64 / 12.0);
                let proc = PhaseVocoderProcessor::new(&mut planner, fft.size(), fft.analysis_hop(), scale);
                let cents = 1200.0 * (proc.effective_stretch() / scale).log2();
                assert!(
                    cents.abs() <= max_cents,
                    "{:?} {:+} semitones: {:.2} cents",
                    fft,
                    semitones,
                    cents
                );
            }
        }

        // +1 semitone at the smallest size comes out about 5 cents sharp.
        let proc = PhaseVocoderProcessor::new(&mut planner, 1024, 128, 2.0_f64.powf(1.0 / 12.0));
        assert_eq!(proc.hop_synthesis(), 136);
        assert_abs_diff_eq!(proc.effective_stretch(), 1.0625, epsilon = 1e-12);
    }

    #[test]
    fn test_output_length_follows_stretch() {
        let mut planner = FftPlanner::new();
        let mut proc = PhaseVocoderProcessor::new(&mut planner, 1024, 128, 2.0);
        let input = sine(440.0, 44100.0, 16384);

        let mut out = Vec::new();
        proc.push_input(&input);
        proc.process(&[], &mut out);
        proc.flush(&[], &mut out);

        // Roughly twice as long, plus priming and flush padding.
        assert!(out.len() >= input.len() * 2);
        assert!(out.len() < input.len() * 2 + 8 * 1024);
    }

    #[test]
    fn test_unity_stretch_preserves_level() {
        let mut planner = FftPlanner::new();
        let mut proc = PhaseVocoderProcessor::new(&mut planner, 1024, 128, 1.0);
        let input = sine(440.0, 44100.0, 16384);

        let mut out = Vec::new();
        proc.push_input(&input);
        proc.process(&[], &mut out);

        let latency = proc.latency() as usize;
        let steady = &out[latency + 1024..latency + 8192];
        let peak = steady.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!(
            (peak - 0.5).abs() < 0.05,
            "expected steady-state peak near 0.5, got {}",
            peak
        );
    }

    #[test]
    fn test_onset_cursor_advances() {
        let mut planner = FftPlanner::new();
        let mut proc = PhaseVocoderProcessor::new(&mut planner, 1024, 128, 1.0);
        let onsets = [0usize, 300, 5000];

        let mut out = Vec::new();
        proc.push_input(&vec![0.0; 4096]);
        proc.process(&onsets, &mut out);
        assert_eq!(proc.next_onset, 2);
    }
}
