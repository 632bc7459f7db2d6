//! Inference backend abstraction.
//!
//! A [`ResonatorBackend`] is the black-box `infer(audio, prompt, params)`
//! collaborator. The engine never knows whether it talks HTTP to a bridge
//! process, runs a local model, or is a test double. All data crosses the
//! boundary as flat `&[f32]` mono buffers.

use crate::error::InferenceError;
use resonator_core::{InferMethod, LaneParams};
use serde::{Deserialize, Serialize};

/// Per-call parameters, mirroring the bridge's `/infer` request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceParams {
    pub guidance_scale: f32,
    pub shift: f32,
    pub input_strength: f32,
    pub steps: u32,
    pub infer_method: InferMethod,
    pub entropy: f32,
    pub granularity: f32,
    pub denoise_strength: f32,
    /// `-1` asks the backend for a random seed.
    pub seed: i64,
}

impl Default for InferenceParams {
    fn default() -> Self {
        Self::from_lane(&LaneParams::default())
    }
}

impl InferenceParams {
    pub fn from_lane(p: &LaneParams) -> Self {
        Self {
            guidance_scale: p.guidance_scale,
            shift: p.shift,
            input_strength: p.input_strength,
            steps: p.steps,
            infer_method: p.infer_method,
            entropy: p.entropy,
            granularity: p.granularity,
            denoise_strength: p.denoise_strength,
            seed: -1,
        }
    }

    /// `true` when the backend should not be called at all.
    pub fn is_passthrough(&self) -> bool {
        self.denoise_strength <= 0.0
    }

    /// Diffusion steps actually run: `max(1, round(steps × denoise))`,
    /// or `None` for passthrough.
    pub fn effective_steps(&self) -> Option<u32> {
        if self.is_passthrough() {
            return None;
        }
        let d = self.denoise_strength.min(1.0);
        Some(((self.steps as f32 * d).round() as u32).max(1))
    }

    /// Shift 1..10 mapped to the point in diffusion where CFG applies (0.1..0.9).
    /// Low shift keeps structure, high shift adds texture.
    pub fn guidance_interval(&self) -> f32 {
        (0.1 + (self.shift - 1.0) / 9.0 * 0.8).clamp(0.1, 0.9)
    }

    /// Granularity is the CFG decay over the diffusion steps.
    pub fn guidance_interval_decay(&self) -> f32 {
        self.granularity.clamp(0.0, 1.0)
    }

    /// Floor for CFG during decay.
    pub fn min_guidance_scale(&self) -> f32 {
        (self.guidance_scale * 0.2).max(1.0)
    }

    pub fn retake_variance(&self) -> f32 {
        match self.infer_method {
            InferMethod::Ode => 0.0,
            InferMethod::Sde => 0.5,
        }
    }
}

/// Result of one successful call.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceOutput {
    pub audio: Vec<f32>,
    /// e.g. "cuda", "mps", "cpu"
    pub device: String,
    pub latency_ms: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BackendCapabilities {
    /// e.g. "ACE-Step bridge", "Passthrough"
    pub name: String,
    pub sample_rate: u32,
}

impl Default for BackendCapabilities {
    fn default() -> Self {
        Self {
            name: "unnamed".into(),
            sample_rate: 48_000,
        }
    }
}

/// The external inference collaborator.
///
/// Calls for different lanes may run concurrently on separate worker
/// threads, so implementations take `&self` and must be `Send + Sync`.
/// The engine guarantees at most one outstanding call per lane.
pub trait ResonatorBackend: Send + Sync {
    fn infer(
        &self,
        audio: &[f32],
        prompt: &str,
        params: &InferenceParams,
    ) -> Result<InferenceOutput, InferenceError>;

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities::default()
    }
}

/// Backend built from a closure.
pub struct FnBackend<F> {
    f: F,
    name: String,
}

impl<F> FnBackend<F>
where
    F: Fn(&[f32], &str, &InferenceParams) -> Result<InferenceOutput, InferenceError>
        + Send
        + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            f,
            name: name.into(),
        }
    }
}

impl<F> ResonatorBackend for FnBackend<F>
where
    F: Fn(&[f32], &str, &InferenceParams) -> Result<InferenceOutput, InferenceError>
        + Send
        + Sync,
{
    fn infer(
        &self,
        audio: &[f32],
        prompt: &str,
        params: &InferenceParams,
    ) -> Result<InferenceOutput, InferenceError> {
        (self.f)(audio, prompt, params)
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            name: self.name.clone(),
            ..Default::default()
        }
    }
}

/// Returns its input scaled by `input_strength`. Useful for demos and
/// exercising the engine without a bridge.
#[derive(Debug, Clone, Default)]
pub struct PassthroughBackend;

impl ResonatorBackend for PassthroughBackend {
    fn infer(
        &self,
        audio: &[f32],
        _prompt: &str,
        params: &InferenceParams,
    ) -> Result<InferenceOutput, InferenceError> {
        let gain = params.input_strength;
        Ok(InferenceOutput {
            audio: audio.iter().map(|s| s * gain).collect(),
            device: "cpu".into(),
            latency_ms: 0.0,
        })
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            name: "Passthrough".into(),
            ..Default::default()
        }
    }
}
