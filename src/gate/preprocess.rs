//! Block energy: mono downmix, pre-emphasis, log RMS.
//!
//! Reduces one block to a single dB-like scalar. Pre-emphasis boosts high
//! frequencies so percussive attacks stand out against steady room noise.

use crate::audio::AudioBlock;

/// Floor added under the RMS square root and before the log.
pub const ENERGY_EPSILON: f64 = 1e-12;

/// Down-mix interleaved audio to mono by averaging channels, writing into
/// `out` (cleared first).
pub fn to_mono_into(samples: &[f32], channels: u16, out: &mut Vec<f32>) {
    out.clear();
    if channels <= 1 {
        out.extend_from_slice(samples);
        return;
    }
    let ch = channels as usize;
    out.extend(
        samples
            .chunks_exact(ch)
            .map(|frame| frame.iter().sum::<f32>() / ch as f32),
    );
}

/// First-order pre-emphasis `y[i] = x[i] - k * x[i-1]`, `y[0] = x[0]`.
///
/// Runs back to front so every `x[i-1]` is still the unfiltered input.
pub fn pre_emphasis_in_place(samples: &mut [f32], coefficient: f32) {
    if coefficient <= 0.0 {
        return;
    }
    for i in (1..samples.len()).rev() {
        samples[i] -= coefficient * samples[i - 1];
    }
}

/// `20 * log10(sqrt(mean(x^2) + eps) + eps)`. Always finite; an empty or
/// all-zero slice gives roughly -120 dB.
pub fn log_rms(samples: &[f32]) -> f64 {
    let mean_sq = if samples.is_empty() {
        0.0
    } else {
        let sum: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
        sum / samples.len() as f64
    };
    let rms = (mean_sq + ENERGY_EPSILON).sqrt();
    20.0 * (rms + ENERGY_EPSILON).log10()
}

/// Per-session preprocessor with a reusable scratch buffer.
#[derive(Debug, Clone)]
pub struct Preprocessor {
    coefficient: f32,
    scratch: Vec<f32>,
}

impl Preprocessor {
    pub fn new(coefficient: f32, block_size: usize) -> Self {
        Self {
            coefficient,
            scratch: Vec::with_capacity(block_size),
        }
    }

    pub fn coefficient(&self) -> f32 {
        self.coefficient
    }

    /// Energy of one block in dB.
    pub fn energy(&mut self, block: &AudioBlock<'_>) -> f64 {
        let frames = block.frame_count() * block.channels() as usize;
        to_mono_into(&block.samples()[..frames], block.channels(), &mut self.scratch);
        pre_emphasis_in_place(&mut self.scratch, self.coefficient);
        log_rms(&self.scratch)
    }
}
