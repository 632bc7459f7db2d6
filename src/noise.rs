//! Stochastic noise injection: the `N(μ, σ)` term of the resonance loop.

use rand::Rng;
use rand_distr::{Distribution, StandardNormal};

/// Noise shape for one iteration, derived from the lane's effective parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoiseSpec {
    pub mean: f32,
    pub sigma: f32,
    /// Fraction of samples that receive noise (0..1).
    pub density: f32,
}

impl NoiseSpec {
    /// `σ = entropy × scale`. Stochastic drift offsets the mean by a random
    /// amount up to `drift × scale` in either direction.
    pub fn from_params<R: Rng + ?Sized>(
        entropy: f32,
        drift: f32,
        density: f32,
        scale: f32,
        rng: &mut R,
    ) -> Self {
        let mean = if drift > 0.0 {
            drift * scale * rng.gen_range(-1.0f32..=1.0)
        } else {
            0.0
        };
        Self {
            mean,
            sigma: (entropy * scale).max(0.0),
            density: density.clamp(0.0, 1.0),
        }
    }

    pub fn is_silent(&self) -> bool {
        self.sigma == 0.0 && self.mean == 0.0
    }
}

/// Add noise in place. A zero spec leaves the buffer untouched and draws nothing.
pub fn inject<R: Rng + ?Sized>(buffer: &mut [f32], spec: NoiseSpec, rng: &mut R) {
    if spec.is_silent() || spec.density <= 0.0 {
        return;
    }
    let dense = spec.density >= 1.0;
    for sample in buffer.iter_mut() {
        if !dense && rng.gen::<f32>() >= spec.density {
            continue;
        }
        let n: f64 = StandardNormal.sample(rng);
        *sample += spec.mean + spec.sigma * n as f32;
    }
}

/// Root-mean-square level. Empty buffers read as silence.
pub fn rms(buffer: &[f32]) -> f32 {
    if buffer.is_empty() {
        return 0.0;
    }
    let sum: f64 = buffer.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum / buffer.len() as f64).sqrt() as f32
}
