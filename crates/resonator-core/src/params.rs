//! Lane parameter set.
//!
//! [`LaneParams`] is the live baseline of one lane. Continuous parameters are
//! addressed by [`ParamId`] and always clamped to their [`ParameterRange`].

use crate::parameter::ParameterRange;
use serde::{Deserialize, Serialize};

/// Continuous lane parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamId {
    GuidanceScale,
    Shift,
    InputStrength,
    Entropy,
    Granularity,
    Feedback,
    DenoiseStrength,
    PromptPhase,
    FilterCutoff,
    FilterResonance,
    Saturation,
    DelayMix,
    DelayTime,
    DelayFeedback,
    BitCrushDepth,
    NoiseDensity,
    StochasticDrift,
    FeedbackJitter,
    Texture,
    Chaos,
    Warmth,
}

impl ParamId {
    pub const ALL: [ParamId; 21] = [
        ParamId::GuidanceScale,
        ParamId::Shift,
        ParamId::InputStrength,
        ParamId::Entropy,
        ParamId::Granularity,
        ParamId::Feedback,
        ParamId::DenoiseStrength,
        ParamId::PromptPhase,
        ParamId::FilterCutoff,
        ParamId::FilterResonance,
        ParamId::Saturation,
        ParamId::DelayMix,
        ParamId::DelayTime,
        ParamId::DelayFeedback,
        ParamId::BitCrushDepth,
        ParamId::NoiseDensity,
        ParamId::StochasticDrift,
        ParamId::FeedbackJitter,
        ParamId::Texture,
        ParamId::Chaos,
        ParamId::Warmth,
    ];

    /// Valid range and default of this parameter.
    pub fn range(self) -> ParameterRange {
        match self {
            ParamId::GuidanceScale => ParameterRange::linear(1.0, 20.0, 15.0),
            ParamId::Shift => ParameterRange::linear(1.0, 10.0, 5.0),
            ParamId::InputStrength => ParameterRange::linear(0.0, 1.0, 0.6),
            ParamId::Entropy => ParameterRange::linear(0.0, 1.0, 0.25),
            ParamId::Granularity => ParameterRange::linear(0.0, 1.0, 0.45),
            ParamId::Feedback => ParameterRange::linear(0.0, 1.0, 0.5),
            ParamId::DenoiseStrength => ParameterRange::linear(0.0, 1.0, 1.0),
            ParamId::PromptPhase => ParameterRange::linear(0.0, 1.0, 0.0),
            ParamId::FilterCutoff => ParameterRange::logarithmic(20.0, 20000.0, 8000.0),
            ParamId::FilterResonance => ParameterRange::linear(0.0, 1.0, 0.2),
            ParamId::Saturation => ParameterRange::linear(0.0, 1.0, 0.0),
            ParamId::DelayMix => ParameterRange::linear(0.0, 1.0, 0.0),
            ParamId::DelayTime => ParameterRange::linear(0.01, 2.0, 0.25),
            ParamId::DelayFeedback => ParameterRange::linear(0.0, 0.95, 0.3),
            ParamId::BitCrushDepth => ParameterRange::integer(1, 16, 16),
            ParamId::NoiseDensity => ParameterRange::linear(0.0, 1.0, 0.5),
            ParamId::StochasticDrift => ParameterRange::linear(0.0, 1.0, 0.0),
            ParamId::FeedbackJitter => ParameterRange::linear(0.0, 1.0, 0.0),
            ParamId::Texture | ParamId::Chaos | ParamId::Warmth => {
                ParameterRange::linear(0.0, 1.0, 0.5)
            }
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ParamId::GuidanceScale => "guidance_scale",
            ParamId::Shift => "shift",
            ParamId::InputStrength => "input_strength",
            ParamId::Entropy => "entropy",
            ParamId::Granularity => "granularity",
            ParamId::Feedback => "feedback",
            ParamId::DenoiseStrength => "denoise_strength",
            ParamId::PromptPhase => "prompt_phase",
            ParamId::FilterCutoff => "filter_cutoff",
            ParamId::FilterResonance => "filter_resonance",
            ParamId::Saturation => "saturation",
            ParamId::DelayMix => "delay_mix",
            ParamId::DelayTime => "delay_time",
            ParamId::DelayFeedback => "delay_feedback",
            ParamId::BitCrushDepth => "bit_crush_depth",
            ParamId::NoiseDensity => "noise_density",
            ParamId::StochasticDrift => "stochastic_drift",
            ParamId::FeedbackJitter => "feedback_jitter",
            ParamId::Texture => "texture",
            ParamId::Chaos => "chaos",
            ParamId::Warmth => "warmth",
        }
    }

    /// The macro this parameter holds the value of, if any.
    pub fn as_macro(self) -> Option<MacroKind> {
        match self {
            ParamId::Texture => Some(MacroKind::Texture),
            ParamId::Chaos => Some(MacroKind::Chaos),
            ParamId::Warmth => Some(MacroKind::Warmth),
            _ => None,
        }
    }
}

/// The three performance macros.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MacroKind {
    Texture,
    Chaos,
    Warmth,
}

impl MacroKind {
    pub const ALL: [MacroKind; 3] = [MacroKind::Texture, MacroKind::Chaos, MacroKind::Warmth];

    pub fn param(self) -> ParamId {
        match self {
            MacroKind::Texture => ParamId::Texture,
            MacroKind::Chaos => ParamId::Chaos,
            MacroKind::Warmth => ParamId::Warmth,
        }
    }
}

/// Diffusion sampling method requested from the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InferMethod {
    /// Deterministic, reproducible.
    #[default]
    Ode,
    /// Stochastic per-step noise.
    Sde,
}

impl InferMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            InferMethod::Ode => "ode",
            InferMethod::Sde => "sde",
        }
    }
}

/// Which excitation generator seeds a lane's first iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExcitationMode {
    #[default]
    Noise,
    Sine,
    Impulse,
    Euclidean,
    Drum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrumVoice {
    #[default]
    Kick,
    Snare,
    Hat,
    Tom,
}

pub const MIN_STEPS: u32 = 1;
pub const MAX_STEPS: u32 = 100;
pub const DEFAULT_STEPS: u32 = 20;

/// Full parameter set of one lane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaneParams {
    pub guidance_scale: f32,
    pub shift: f32,
    pub input_strength: f32,
    pub entropy: f32,
    pub granularity: f32,
    pub feedback: f32,
    pub denoise_strength: f32,
    pub prompt_phase: f32,
    pub filter_cutoff: f32,
    pub filter_resonance: f32,
    pub saturation: f32,
    pub delay_mix: f32,
    pub delay_time: f32,
    pub delay_feedback: f32,
    pub bit_crush_depth: f32,
    pub noise_density: f32,
    pub stochastic_drift: f32,
    pub feedback_jitter: f32,
    pub texture: f32,
    pub chaos: f32,
    pub warmth: f32,
    pub steps: u32,
    pub infer_method: InferMethod,
    pub excitation_mode: ExcitationMode,
    pub drum_voice: DrumVoice,
}

impl Default for LaneParams {
    fn default() -> Self {
        let d = |id: ParamId| id.range().default;
        Self {
            guidance_scale: d(ParamId::GuidanceScale),
            shift: d(ParamId::Shift),
            input_strength: d(ParamId::InputStrength),
            entropy: d(ParamId::Entropy),
            granularity: d(ParamId::Granularity),
            feedback: d(ParamId::Feedback),
            denoise_strength: d(ParamId::DenoiseStrength),
            prompt_phase: d(ParamId::PromptPhase),
            filter_cutoff: d(ParamId::FilterCutoff),
            filter_resonance: d(ParamId::FilterResonance),
            saturation: d(ParamId::Saturation),
            delay_mix: d(ParamId::DelayMix),
            delay_time: d(ParamId::DelayTime),
            delay_feedback: d(ParamId::DelayFeedback),
            bit_crush_depth: d(ParamId::BitCrushDepth),
            noise_density: d(ParamId::NoiseDensity),
            stochastic_drift: d(ParamId::StochasticDrift),
            feedback_jitter: d(ParamId::FeedbackJitter),
            texture: d(ParamId::Texture),
            chaos: d(ParamId::Chaos),
            warmth: d(ParamId::Warmth),
            steps: DEFAULT_STEPS,
            infer_method: InferMethod::default(),
            excitation_mode: ExcitationMode::default(),
            drum_voice: DrumVoice::default(),
        }
    }
}

impl LaneParams {
    fn slot(&self, id: ParamId) -> &f32 {
        match id {
            ParamId::GuidanceScale => &self.guidance_scale,
            ParamId::Shift => &self.shift,
            ParamId::InputStrength => &self.input_strength,
            ParamId::Entropy => &self.entropy,
            ParamId::Granularity => &self.granularity,
            ParamId::Feedback => &self.feedback,
            ParamId::DenoiseStrength => &self.denoise_strength,
            ParamId::PromptPhase => &self.prompt_phase,
            ParamId::FilterCutoff => &self.filter_cutoff,
            ParamId::FilterResonance => &self.filter_resonance,
            ParamId::Saturation => &self.saturation,
            ParamId::DelayMix => &self.delay_mix,
            ParamId::DelayTime => &self.delay_time,
            ParamId::DelayFeedback => &self.delay_feedback,
            ParamId::BitCrushDepth => &self.bit_crush_depth,
            ParamId::NoiseDensity => &self.noise_density,
            ParamId::StochasticDrift => &self.stochastic_drift,
            ParamId::FeedbackJitter => &self.feedback_jitter,
            ParamId::Texture => &self.texture,
            ParamId::Chaos => &self.chaos,
            ParamId::Warmth => &self.warmth,
        }
    }

    fn slot_mut(&mut self, id: ParamId) -> &mut f32 {
        match id {
            ParamId::GuidanceScale => &mut self.guidance_scale,
            ParamId::Shift => &mut self.shift,
            ParamId::InputStrength => &mut self.input_strength,
            ParamId::Entropy => &mut self.entropy,
            ParamId::Granularity => &mut self.granularity,
            ParamId::Feedback => &mut self.feedback,
            ParamId::DenoiseStrength => &mut self.denoise_strength,
            ParamId::PromptPhase => &mut self.prompt_phase,
            ParamId::FilterCutoff => &mut self.filter_cutoff,
            ParamId::FilterResonance => &mut self.filter_resonance,
            ParamId::Saturation => &mut self.saturation,
            ParamId::DelayMix => &mut self.delay_mix,
            ParamId::DelayTime => &mut self.delay_time,
            ParamId::DelayFeedback => &mut self.delay_feedback,
            ParamId::BitCrushDepth => &mut self.bit_crush_depth,
            ParamId::NoiseDensity => &mut self.noise_density,
            ParamId::StochasticDrift => &mut self.stochastic_drift,
            ParamId::FeedbackJitter => &mut self.feedback_jitter,
            ParamId::Texture => &mut self.texture,
            ParamId::Chaos => &mut self.chaos,
            ParamId::Warmth => &mut self.warmth,
        }
    }

    #[inline]
    pub fn get(&self, id: ParamId) -> f32 {
        *self.slot(id)
    }

    /// Set a parameter, clamped to its range.
    #[inline]
    pub fn set(&mut self, id: ParamId, value: f32) {
        *self.slot_mut(id) = id.range().clamp(value);
    }

    pub fn macro_value(&self, kind: MacroKind) -> f32 {
        self.get(kind.param())
    }

    pub fn set_steps(&mut self, steps: u32) {
        self.steps = steps.clamp(MIN_STEPS, MAX_STEPS);
    }

    /// Clamp every field back into range (e.g. after deserializing).
    pub fn sanitize(&mut self) {
        for id in ParamId::ALL {
            let v = self.get(id);
            self.set(id, v);
        }
        self.set_steps(self.steps);
    }

    /// Interpolate between two parameter sets.
    ///
    /// Continuous values are `a·(1−t) + b·t`, so `t = 0` and `t = 1`
    /// reproduce `a` and `b` exactly. Integer-scaled values are left
    /// unrounded here; consumers round. Discrete values switch at `t = 0.5`.
    pub fn lerp(a: &LaneParams, b: &LaneParams, t: f32) -> LaneParams {
        let t = t.clamp(0.0, 1.0);
        let pick = t >= 0.5;
        let mut out = if pick { b.clone() } else { a.clone() };
        for id in ParamId::ALL {
            *out.slot_mut(id) = a.get(id) * (1.0 - t) + b.get(id) * t;
        }
        out
    }
}
