//! Output reassembly: concatenate engine chunks, strip latency, fit length.

/// Per-channel collection of engine output chunks in arrival order.
#[derive(Debug, Clone)]
pub struct OutputAccumulator {
    chunks: Vec<Vec<Vec<f32>>>,
    total: usize,
}

impl OutputAccumulator {
    pub fn new(channels: usize) -> Self {
        Self {
            chunks: vec![Vec::new(); channels],
            total: 0,
        }
    }

    pub fn channel_count(&self) -> usize {
        self.chunks.len()
    }

    /// Frames appended so far (per channel).
    pub fn total_frames(&self) -> usize {
        self.total
    }

    /// Append one produced chunk, one slice per channel.
    ///
    /// Every slice must have the same length; the pipeline copies them out
    /// of engine staging with a single `produced` count.
    pub fn push<'a>(&mut self, chunk: impl IntoIterator<Item = &'a [f32]>) {
        let mut len = 0;
        for (channel, samples) in self.chunks.iter_mut().zip(chunk) {
            len = samples.len();
            channel.push(samples.to_vec());
        }
        self.total += len;
    }

    /// Consume the accumulator and build exactly `total_frames` samples per
    /// channel.
    ///
    /// The first `start_delay` frames are dropped. Under-production leaves
    /// trailing silence; over-production is truncated.
    pub fn finish(self, start_delay: usize, total_frames: usize) -> Vec<Vec<f32>> {
        self.chunks
            .into_iter()
            .map(|chunks| trim_channel(&chunks.concat(), start_delay, total_frames))
            .collect()
    }
}

fn trim_channel(merged: &[f32], start_delay: usize, total_frames: usize) -> Vec<f32> {
    let mut out = vec![0.0; total_frames];
    let from = start_delay.min(merged.len());
    let to = (from + total_frames).min(merged.len());
    out[..to - from].copy_from_slice(&merged[from..to]);
    out
}
