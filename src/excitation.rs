//! Excitation signals that seed a lane's first iteration.
//!
//! Generators are pluggable through [`ExcitationSource`]; the engine only
//! consumes the sample stream. [`Exciter`] is the built-in set.

use rand::{Rng, RngCore};
use rand_distr::{Distribution, Normal};
use resonator_core::{DrumVoice, ExcitationMode};
use std::f32::consts::TAU;

/// Default excitation sample rate (matches the bridge).
pub const EXCITATION_SAMPLE_RATE: f32 = 48_000.0;

/// Produces the fresh signal a lane starts recursing from.
pub trait ExcitationSource: Send {
    fn generate(
        &mut self,
        mode: ExcitationMode,
        voice: DrumVoice,
        len: usize,
        rng: &mut dyn RngCore,
    ) -> Vec<f32>;
}

impl<F> ExcitationSource for F
where
    F: FnMut(ExcitationMode, DrumVoice, usize, &mut dyn RngCore) -> Vec<f32> + Send,
{
    fn generate(
        &mut self,
        mode: ExcitationMode,
        voice: DrumVoice,
        len: usize,
        rng: &mut dyn RngCore,
    ) -> Vec<f32> {
        (*self)(mode, voice, len, rng)
    }
}

/// Built-in generators: white noise, sine, Dirac impulse, Euclidean impulse
/// train and synthetic drum hits.
#[derive(Debug, Clone)]
pub struct Exciter {
    sample_rate: f32,
    sine_hz: f32,
    euclid_pulses: usize,
    euclid_steps: usize,
    /// Gaussian tail after each impulse, as nucleation for the denoiser.
    tail_ms: f32,
    tail_amplitude: f32,
}

impl Default for Exciter {
    fn default() -> Self {
        Self {
            sample_rate: EXCITATION_SAMPLE_RATE,
            sine_hz: 110.0,
            euclid_pulses: 5,
            euclid_steps: 13,
            tail_ms: 20.0,
            tail_amplitude: 0.01,
        }
    }
}

impl Exciter {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate: sample_rate.max(1.0),
            ..Default::default()
        }
    }

    pub fn with_sine_hz(mut self, hz: f32) -> Self {
        self.sine_hz = hz.max(0.0);
        self
    }

    /// Euclidean rhythm `E(pulses, steps)` used by [`ExcitationMode::Euclidean`].
    pub fn with_euclid(mut self, pulses: usize, steps: usize) -> Self {
        self.euclid_steps = steps.max(1);
        self.euclid_pulses = pulses.min(self.euclid_steps);
        self
    }

    fn noise(&self, len: usize, rng: &mut dyn RngCore) -> Vec<f32> {
        (0..len).map(|_| rng.gen_range(-0.5f32..=0.5)).collect()
    }

    fn sine(&self, len: usize) -> Vec<f32> {
        let w = TAU * self.sine_hz / self.sample_rate;
        (0..len).map(|i| 0.5 * (w * i as f32).sin()).collect()
    }

    fn impulse_with_tail(&self, buf: &mut [f32], pos: usize, rng: &mut dyn RngCore) {
        if pos >= buf.len() {
            return;
        }
        buf[pos] = 1.0;
        let tail = (self.tail_ms * self.sample_rate / 1000.0).round() as usize;
        let end = (pos + 1 + tail).min(buf.len());
        if let Ok(normal) = Normal::new(0.0f32, self.tail_amplitude) {
            for s in &mut buf[pos + 1..end] {
                *s = normal.sample(rng);
            }
        }
    }

    fn impulse(&self, len: usize, rng: &mut dyn RngCore) -> Vec<f32> {
        let mut buf = vec![0.0; len];
        self.impulse_with_tail(&mut buf, 0, rng);
        buf
    }

    fn euclidean(&self, len: usize, rng: &mut dyn RngCore) -> Vec<f32> {
        let mut buf = vec![0.0; len];
        let rhythm = euclidean_rhythm(self.euclid_pulses, self.euclid_steps);
        let per_step = len / self.euclid_steps.max(1);
        for (i, on) in rhythm.into_iter().enumerate() {
            if on {
                self.impulse_with_tail(&mut buf, i * per_step, rng);
            }
        }
        buf
    }

    fn drum(&self, voice: DrumVoice, len: usize, rng: &mut dyn RngCore) -> Vec<f32> {
        // (start Hz, end Hz, decay seconds, noise mix)
        let (f0, f1, decay, noise) = match voice {
            DrumVoice::Kick => (120.0, 45.0, 0.35, 0.0),
            DrumVoice::Snare => (190.0, 160.0, 0.18, 0.6),
            DrumVoice::Hat => (0.0, 0.0, 0.05, 1.0),
            DrumVoice::Tom => (150.0, 90.0, 0.3, 0.05),
        };
        let sr = self.sample_rate;
        let mut phase = 0.0f32;
        (0..len)
            .map(|i| {
                let t = i as f32 / sr;
                let env = (-t / decay).exp();
                let freq = f1 + (f0 - f1) * (-t / (decay * 0.3)).exp();
                phase = (phase + TAU * freq / sr) % TAU;
                let tone = phase.sin();
                let hiss = rng.gen_range(-1.0f32..=1.0);
                env * (tone * (1.0 - noise) + hiss * noise) * 0.8
            })
            .collect()
    }
}

impl ExcitationSource for Exciter {
    fn generate(
        &mut self,
        mode: ExcitationMode,
        voice: DrumVoice,
        len: usize,
        rng: &mut dyn RngCore,
    ) -> Vec<f32> {
        match mode {
            ExcitationMode::Noise => self.noise(len, rng),
            ExcitationMode::Sine => self.sine(len),
            ExcitationMode::Impulse => self.impulse(len, rng),
            ExcitationMode::Euclidean => self.euclidean(len, rng),
            ExcitationMode::Drum => self.drum(voice, len, rng),
        }
    }
}

/// Bjorklund's algorithm: spread `pulses` onsets as evenly as possible over
/// `steps` positions.
pub fn euclidean_rhythm(pulses: usize, steps: usize) -> Vec<bool> {
    if pulses >= steps {
        return vec![true; steps];
    }
    if pulses == 0 {
        return vec![false; steps];
    }

    let mut pattern: Vec<Vec<bool>> = vec![vec![true]; pulses];
    let mut remainder: Vec<Vec<bool>> = vec![vec![false]; steps - pulses];

    while remainder.len() > 1 {
        let take = pattern.len().min(remainder.len());
        let merged: Vec<Vec<bool>> = pattern
            .drain(..take)
            .zip(remainder.drain(..take))
            .map(|(mut p, r)| {
                p.extend(r);
                p
            })
            .collect();

        let mut leftover = std::mem::take(&mut pattern);
        leftover.append(&mut remainder);
        pattern = merged;
        remainder = leftover;
    }

    pattern.into_iter().chain(remainder).flatten().collect()
}
