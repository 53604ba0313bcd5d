//! Test helpers and fixtures for Transposer integration tests
//!
//! ## Tolerance Levels
//!
//! Use the appropriate tolerance from [`tolerances`] module:
//! - `FLOAT_EPSILON` (1e-6): Exact operations (passthrough, copies)
//! - `INT16_EPSILON` (1/32768): Audio that round-tripped through 16-bit WAV
//! - `PITCH_RATIO_TOLERANCE` (3%): Measured pitch ratios

#![allow(dead_code)]

pub mod tolerances;

use std::sync::{Arc, Mutex};
use transposer::export::transcode::INPUT_NAME;
use transposer::prelude::*;
use transposer::{ExportError, PhaseVocoderFactory, ServiceFactory, TranscodeService};

/// Default test sample rate
pub const TEST_SAMPLE_RATE: u32 = 44100;

/// Generate a test signal: sine wave at given frequency for specified samples.
pub fn generate_sine(frequency: f64, sample_rate: u32, num_samples: usize) -> Vec<f32> {
    (0..num_samples)
        .map(|i| {
            let t = i as f64 / sample_rate as f64;
            (0.5 * (2.0 * std::f64::consts::PI * frequency * t).sin()) as f32
        })
        .collect()
}

/// Generate white noise (random samples in -1..1).
pub fn generate_noise(num_samples: usize, seed: u64) -> Vec<f32> {
    // Simple LCG for reproducible "random" noise
    let mut rng = seed;
    (0..num_samples)
        .map(|_| {
            rng = rng.wrapping_mul(6364136223846793005).wrapping_add(1);
            ((rng >> 33) as f32 / u32::MAX as f32) * 2.0 - 1.0
        })
        .collect()
}

/// Mono sine buffer.
pub fn sine_buffer(frequency: f64, sample_rate: u32, num_samples: usize) -> AudioBuffer {
    AudioBuffer::new(
        sample_rate,
        vec![generate_sine(frequency, sample_rate, num_samples)],
    )
    .expect("valid buffer")
}

/// Calculate RMS of a signal.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}

/// Calculate peak amplitude of a signal.
pub fn peak(samples: &[f32]) -> f32 {
    samples
        .iter()
        .map(|s| s.abs())
        .fold(0.0_f32, |a, b| a.max(b))
}

/// Estimate the frequency of a steady tone from its rising zero crossings.
pub fn estimate_frequency(samples: &[f32], sample_rate: u32) -> f64 {
    let crossings: Vec<usize> = samples
        .windows(2)
        .enumerate()
        .filter(|(_, w)| w[0] < 0.0 && w[1] >= 0.0)
        .map(|(i, _)| i)
        .collect();
    if crossings.len() < 2 {
        return 0.0;
    }
    let first = crossings[0];
    let last = crossings[crossings.len() - 1];
    let cycles = (crossings.len() - 1) as f64;
    cycles * sample_rate as f64 / (last - first) as f64
}

/// The middle half of a signal, away from edge transients.
pub fn middle(samples: &[f32]) -> &[f32] {
    let quarter = samples.len() / 4;
    &samples[quarter..samples.len() - quarter]
}

// =============================================================================
// Scripted transcoding service
// =============================================================================

/// What each scripted service instance saw.
#[derive(Debug, Default)]
pub struct ServiceLog {
    pub created: usize,
    /// Args of every exec call, across all instances.
    pub execs: Vec<Vec<String>>,
    /// WAV bytes written as transcoder input.
    pub inputs: Vec<Vec<u8>>,
}

/// Service factory whose exec calls fail the first `failures` times, then
/// write a fake artifact.
#[derive(Clone)]
pub struct ScriptedServiceFactory {
    pub log: Arc<Mutex<ServiceLog>>,
    failures: Arc<Mutex<usize>>,
}

impl ScriptedServiceFactory {
    pub fn new(failures: usize) -> Self {
        Self {
            log: Arc::new(Mutex::new(ServiceLog::default())),
            failures: Arc::new(Mutex::new(failures)),
        }
    }

    pub fn created(&self) -> usize {
        self.log.lock().unwrap().created
    }

    pub fn exec_count(&self) -> usize {
        self.log.lock().unwrap().execs.len()
    }
}

pub struct ScriptedService {
    log: Arc<Mutex<ServiceLog>>,
    failures: Arc<Mutex<usize>>,
    files: std::collections::HashMap<String, Vec<u8>>,
}

impl ServiceFactory for ScriptedServiceFactory {
    type Service = ScriptedService;

    fn create(&self) -> transposer::export::Result<ScriptedService> {
        self.log.lock().unwrap().created += 1;
        Ok(ScriptedService {
            log: self.log.clone(),
            failures: self.failures.clone(),
            files: Default::default(),
        })
    }
}

impl TranscodeService for ScriptedService {
    fn load(&mut self) -> transposer::export::Result<()> {
        Ok(())
    }

    fn write_file(&mut self, name: &str, data: &[u8]) -> transposer::export::Result<()> {
        if name == INPUT_NAME {
            self.log.lock().unwrap().inputs.push(data.to_vec());
        }
        self.files.insert(name.to_string(), data.to_vec());
        Ok(())
    }

    fn read_file(&mut self, name: &str) -> transposer::export::Result<Vec<u8>> {
        self.files
            .get(name)
            .cloned()
            .ok_or_else(|| ExportError::InvalidData(format!("missing {}", name)))
    }

    fn delete_file(&mut self, name: &str) -> transposer::export::Result<()> {
        self.files.remove(name);
        Ok(())
    }

    fn exec(
        &mut self,
        args: &[String],
        log: &mut dyn FnMut(&str),
    ) -> transposer::export::Result<i32> {
        self.log.lock().unwrap().execs.push(args.to_vec());
        let mut failures = self.failures.lock().unwrap();
        if *failures > 0 {
            *failures -= 1;
            log("Unknown encoder 'libopus'");
            return Ok(1);
        }
        let output = args.last().cloned().unwrap_or_default();
        log("size=       1kB time=00:00:01.00");
        self.files.insert(output, b"OggS-fake".to_vec());
        Ok(0)
    }
}

/// Transposer with the phase vocoder engine and a scripted transcoder.
pub fn test_transposer(
    pipeline: PipelineConfig,
    service: ScriptedServiceFactory,
) -> Transposer<ScriptedServiceFactory> {
    Transposer::builder()
        .pipeline(pipeline)
        .build_with(PhaseVocoderFactory::new(pipeline), service)
        .expect("Failed to create test transposer")
}
