//! WAV container I/O using hound
//!
//! Encoding always produces 16-bit PCM. Decoding accepts 8/16/24/32-bit
//! integer and 32-bit float files.

use crate::error::{ExportError, Result};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::io::{Read, Seek, Write};
use std::path::Path;
use transposer_core::AudioBuffer;

/// Size of the canonical RIFF/WAVE header hound writes for mono and stereo
/// 16-bit PCM.
pub const WAV_HEADER_SIZE: usize = 44;

/// Expected 16-bit WAV size: `44 + frames * channels * 2`.
///
/// Holds for one or two channels; wider layouts use the extensible header.
pub fn wav_size(frames: usize, channels: usize) -> usize {
    WAV_HEADER_SIZE + frames * channels * 2
}

/// Encode to 16-bit PCM WAV in memory
pub fn encode_wav_memory(buffer: &AudioBuffer) -> Result<Vec<u8>> {
    let spec = create_wav_spec(buffer)?;
    let mut bytes = Vec::with_capacity(wav_size(buffer.frame_count(), buffer.channel_count()));
    {
        let cursor = std::io::Cursor::new(&mut bytes);
        let mut writer = WavWriter::new(cursor, spec)?;
        write_samples(&mut writer, buffer)?;
        // Finalize writes the header and flushes
        writer.finalize()?;
    }
    Ok(bytes)
}

/// Encode to a 16-bit PCM WAV file
pub fn encode_wav_file(buffer: &AudioBuffer, path: &Path) -> Result<()> {
    let spec = create_wav_spec(buffer)?;
    let mut writer = WavWriter::create(path, spec)?;
    write_samples(&mut writer, buffer)?;
    writer.finalize()?;
    Ok(())
}

/// Decode WAV bytes into per-channel float samples
pub fn decode_wav(bytes: &[u8]) -> Result<AudioBuffer> {
    let reader = WavReader::new(std::io::Cursor::new(bytes))?;
    read_samples(reader)
}

/// Read a WAV file into per-channel float samples
pub fn read_wav(path: &Path) -> Result<AudioBuffer> {
    let reader = WavReader::open(path)?;
    read_samples(reader)
}

fn create_wav_spec(buffer: &AudioBuffer) -> Result<WavSpec> {
    let channels = u16::try_from(buffer.channel_count()).map_err(|_| {
        ExportError::InvalidData(format!("{} channels", buffer.channel_count()))
    })?;
    Ok(WavSpec {
        channels,
        sample_rate: buffer.sample_rate(),
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    })
}

/// Write interleaved samples to the writer
fn write_samples<W: Write + Seek>(writer: &mut WavWriter<W>, buffer: &AudioBuffer) -> Result<()> {
    let channels = buffer.channels();
    for frame in 0..buffer.frame_count() {
        for channel in channels {
            writer.write_sample(float_to_i16(channel[frame]))?;
        }
    }
    Ok(())
}

fn read_samples<R: Read>(mut reader: WavReader<R>) -> Result<AudioBuffer> {
    let spec = reader.spec();
    let interleaved: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Float, 32) => reader.samples::<f32>().collect::<std::result::Result<_, _>>()?,
        (SampleFormat::Int, bits @ (8 | 16 | 24 | 32)) => {
            let scale = 1.0 / (1u64 << (bits - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<std::result::Result<_, _>>()?
        }
        (format, bits) => {
            return Err(ExportError::UnsupportedFormat(format!(
                "{}-bit {:?} WAV",
                bits, format
            )))
        }
    };
    Ok(AudioBuffer::from_interleaved(
        spec.sample_rate,
        spec.channels as usize,
        &interleaved,
    )?)
}

/// Convert float sample to 16-bit integer with clipping.
///
/// Negative values scale by 32768 and non-negative by 32767 so both ends of
/// the range are reachable; the result truncates toward zero.
#[inline]
pub fn float_to_i16(sample: f32) -> i16 {
    let clamped = sample.clamp(-1.0, 1.0);
    if clamped < 0.0 {
        (clamped * 32768.0) as i16
    } else {
        (clamped * 32767.0) as i16
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn pcm_samples(bytes: &[u8]) -> Vec<i16> {
        bytes[WAV_HEADER_SIZE..]
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect()
    }

    #[test]
    fn test_float_to_i16() {
        assert_eq!(float_to_i16(0.0), 0);
        assert_eq!(float_to_i16(0.5), 16383);
        assert_eq!(float_to_i16(-0.5), -16384);
        assert_eq!(float_to_i16(1.0), 32767);
        assert_eq!(float_to_i16(-1.0), -32768);
        // Test clipping
        assert_eq!(float_to_i16(1.5), 32767);
        assert_eq!(float_to_i16(-1.5), -32768);
    }

    #[test]
    fn test_encode_mono_known_values() {
        let buffer = AudioBuffer::new(8000, vec![vec![0.5, -0.5, 1.0, -1.0]]).unwrap();
        let bytes = encode_wav_memory(&buffer).unwrap();

        assert_eq!(bytes.len(), wav_size(4, 1));
        assert_eq!(bytes.len(), 52);
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WAVE");
        assert_eq!(u32::from_le_bytes([bytes[24], bytes[25], bytes[26], bytes[27]]), 8000);
        assert_eq!(pcm_samples(&bytes), vec![16383, -16384, 32767, -32768]);
    }

    #[test]
    fn test_encode_stereo_interleaves() {
        let buffer = AudioBuffer::new(44100, vec![vec![0.0, 1.0], vec![-1.0, 0.0]]).unwrap();
        let bytes = encode_wav_memory(&buffer).unwrap();
        assert_eq!(bytes.len(), wav_size(2, 2));
        assert_eq!(pcm_samples(&bytes), vec![0, -32768, 32767, 0]);
    }

    #[test]
    fn test_decode_encoded() {
        let buffer = AudioBuffer::new(22050, vec![vec![0.25, -0.25, 0.0], vec![0.5, 0.0, -0.75]])
            .unwrap();
        let decoded = decode_wav(&encode_wav_memory(&buffer).unwrap()).unwrap();

        assert_eq!(decoded.sample_rate(), 22050);
        assert_eq!(decoded.channel_count(), 2);
        assert_eq!(decoded.frame_count(), 3);
        for (a, b) in buffer.channels().iter().flatten().zip(decoded.channels().iter().flatten()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1.0 / 16384.0);
        }
    }

    #[test]
    fn test_decode_float_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("float.wav");
        let spec = WavSpec {
            channels: 1,
            sample_rate: 48000,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        for s in [0.1f32, -0.2, 0.3] {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();

        let decoded = read_wav(&path).unwrap();
        assert_eq!(decoded.channel(0).unwrap(), [0.1f32, -0.2, 0.3].as_slice());
    }

    #[test]
    fn test_file_roundtrip_keeps_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        let buffer = AudioBuffer::silence(44100, 2, 1000).unwrap();
        encode_wav_file(&buffer, &path).unwrap();

        assert_eq!(
            std::fs::metadata(&path).unwrap().len() as usize,
            wav_size(1000, 2)
        );
        let decoded = read_wav(&path).unwrap();
        assert_eq!(decoded, buffer);
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(decode_wav(b"not a wav file").is_err());
    }
}
