//! Audio buffer and pitch request types.

use crate::error::{Error, Result};

/// Per-channel float audio with a shared frame count.
///
/// Every channel holds exactly [`frame_count()`](Self::frame_count) samples.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    sample_rate: u32,
    frames: usize,
    channels: Vec<Vec<f32>>,
}

impl AudioBuffer {
    /// Create a buffer from per-channel sample vectors.
    ///
    /// Fails if there are no channels, the sample rate is zero, or the
    /// channels differ in length.
    pub fn new(sample_rate: u32, channels: Vec<Vec<f32>>) -> Result<Self> {
        if sample_rate == 0 {
            return Err(Error::InvalidBuffer("sample rate must be > 0".into()));
        }
        let Some(first) = channels.first() else {
            return Err(Error::InvalidBuffer("buffer has no channels".into()));
        };
        let frames = first.len();
        if let Some((index, ch)) = channels
            .iter()
            .enumerate()
            .find(|(_, ch)| ch.len() != frames)
        {
            return Err(Error::InvalidBuffer(format!(
                "channel {} has {} samples, expected {}",
                index,
                ch.len(),
                frames
            )));
        }
        Ok(Self {
            sample_rate,
            frames,
            channels,
        })
    }

    /// Silent buffer of the given shape.
    pub fn silence(sample_rate: u32, channel_count: usize, frames: usize) -> Result<Self> {
        Self::new(sample_rate, vec![vec![0.0; frames]; channel_count])
    }

    /// Build from interleaved samples `[c0f0, c1f0, ..., c0f1, ...]`.
    pub fn from_interleaved(sample_rate: u32, channel_count: usize, samples: &[f32]) -> Result<Self> {
        if channel_count == 0 {
            return Err(Error::InvalidBuffer("channel count must be > 0".into()));
        }
        if samples.len() % channel_count != 0 {
            return Err(Error::InvalidBuffer(format!(
                "{} interleaved samples is not divisible by {} channels",
                samples.len(),
                channel_count
            )));
        }
        let frames = samples.len() / channel_count;
        let mut channels = vec![Vec::with_capacity(frames); channel_count];
        for frame in samples.chunks_exact(channel_count) {
            for (ch, &sample) in channels.iter_mut().zip(frame) {
                ch.push(sample);
            }
        }
        Self::new(sample_rate, channels)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn frame_count(&self) -> usize {
        self.frames
    }

    pub fn is_empty(&self) -> bool {
        self.frames == 0
    }

    /// Duration in seconds.
    pub fn duration_seconds(&self) -> f64 {
        self.frames as f64 / self.sample_rate as f64
    }

    /// Samples of one channel, or `None` if the index is out of range.
    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    /// Consume the buffer, returning the channel vectors.
    pub fn into_channels(self) -> Vec<Vec<f32>> {
        self.channels
    }

    /// Interleaved copy of the samples.
    pub fn interleaved(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.frames * self.channels.len());
        for i in 0..self.frames {
            for ch in &self.channels {
                out.push(ch[i]);
            }
        }
        out
    }
}

/// A whole-semitone pitch shift in [-12, +12].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Semitones(i32);

impl Semitones {
    pub const MIN: i32 = -12;
    pub const MAX: i32 = 12;

    /// Validated constructor.
    pub fn new(value: i32) -> Result<Self> {
        if !(Self::MIN..=Self::MAX).contains(&value) {
            return Err(Error::InvalidSemitones(value));
        }
        Ok(Self(value))
    }

    /// Round and clamp into range, like a stepper control would. Halves
    /// round up, so `-2.5` becomes `-2`.
    pub fn clamped(value: f64) -> Self {
        let rounded = if value.is_finite() { (value + 0.5).floor() } else { 0.0 };
        Self(rounded.clamp(Self::MIN as f64, Self::MAX as f64) as i32)
    }

    pub fn value(&self) -> i32 {
        self.0
    }

    /// A zero shift never reaches the engine.
    pub fn is_identity(&self) -> bool {
        self.0 == 0
    }

    /// Frequency ratio `2^(semitones/12)`.
    pub fn pitch_scale(&self) -> f64 {
        pitch_scale(self.0)
    }
}

impl std::fmt::Display for Semitones {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0 > 0 {
            write!(f, "+{}", self.0)
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Frequency ratio for a semitone shift.
#[inline]
pub fn pitch_scale(semitones: i32) -> f64 {
    2.0_f64.powf(semitones as f64 / 12.0)
}

/// Audio plus the shift to apply to it.
#[derive(Debug, Clone, PartialEq)]
pub struct PitchRequest {
    pub buffer: AudioBuffer,
    pub semitones: Semitones,
}

impl PitchRequest {
    pub fn new(buffer: AudioBuffer, semitones: Semitones) -> Self {
        Self { buffer, semitones }
    }

    /// Whether the request needs the engine at all.
    pub fn is_noop(&self) -> bool {
        self.semitones.is_identity() || self.buffer.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_buffer_rejects_mismatched_channels() {
        let result = AudioBuffer::new(44100, vec![vec![0.0; 4], vec![0.0; 3]]);
        assert!(matches!(result, Err(Error::InvalidBuffer(_))));
    }

    #[test]
    fn test_buffer_rejects_empty_channel_list() {
        assert!(AudioBuffer::new(44100, Vec::new()).is_err());
        assert!(AudioBuffer::new(0, vec![vec![0.0]]).is_err());
    }

    #[test]
    fn test_buffer_shape() {
        let buffer = AudioBuffer::new(8000, vec![vec![0.0; 8000], vec![0.0; 8000]]).unwrap();
        assert_eq!(buffer.channel_count(), 2);
        assert_eq!(buffer.frame_count(), 8000);
        assert_relative_eq!(buffer.duration_seconds(), 1.0);
        assert!(buffer.channel(2).is_none());
    }

    #[test]
    fn test_interleave_round_trip() {
        let interleaved = vec![0.1, -0.1, 0.2, -0.2, 0.3, -0.3];
        let buffer = AudioBuffer::from_interleaved(48000, 2, &interleaved).unwrap();
        assert_eq!(buffer.channel(0).unwrap(), &[0.1, 0.2, 0.3]);
        assert_eq!(buffer.channel(1).unwrap(), &[-0.1, -0.2, -0.3]);
        assert_eq!(buffer.interleaved(), interleaved);

        assert!(AudioBuffer::from_interleaved(48000, 2, &[0.0; 3]).is_err());
    }

    #[test]
    fn test_pitch_scale() {
        assert_relative_eq!(pitch_scale(12), 2.0);
        assert_relative_eq!(pitch_scale(-12), 0.5);
        assert_relative_eq!(pitch_scale(0), 1.0);
        assert_relative_eq!(pitch_scale(7), 1.498_307, epsilon = 1e-6);
    }

    #[test]
    fn test_semitone_range() {
        assert!(Semitones::new(12).is_ok());
        assert!(Semitones::new(-12).is_ok());
        assert!(matches!(Semitones::new(13), Err(Error::InvalidSemitones(13))));
        assert!(Semitones::new(-13).is_err());
    }

    #[test]
    fn test_semitones_clamped() {
        assert_eq!(Semitones::clamped(2.6).value(), 3);
        assert_eq!(Semitones::clamped(40.0).value(), 12);
        assert_eq!(Semitones::clamped(-40.0).value(), -12);
        assert_eq!(Semitones::clamped(f64::NAN).value(), 0);
    }

    #[test]
    fn test_semitones_clamped_halves_round_up() {
        assert_eq!(Semitones::clamped(-2.5).value(), -2);
        assert_eq!(Semitones::clamped(2.5).value(), 3);
        assert_eq!(Semitones::clamped(-0.5).value(), 0);
        assert_eq!(Semitones::clamped(-2.6).value(), -3);
        assert_eq!(Semitones::clamped(-12.5).value(), -12);
        assert_eq!(Semitones::clamped(11.5).value(), 12);
    }

    #[test]
    fn test_semitones_display() {
        assert_eq!(Semitones::new(3).unwrap().to_string(), "+3");
        assert_eq!(Semitones::new(-5).unwrap().to_string(), "-5");
        assert_eq!(Semitones::new(0).unwrap().to_string(), "0");
    }

    #[test]
    fn test_request_noop() {
        let buffer = AudioBuffer::silence(44100, 1, 16).unwrap();
        let request = PitchRequest::new(buffer.clone(), Semitones::default());
        assert!(request.is_noop());

        let request = PitchRequest::new(buffer, Semitones::new(2).unwrap());
        assert!(!request.is_noop());
    }
}
