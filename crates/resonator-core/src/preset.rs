//! Lane presets: starting parameters, macro cascade and sequencer setup for a new lane.
//!
//! # Example
//!
//! ```
//! use resonator_core::LanePreset;
//!
//! let preset = LanePreset::from_toml_str(r#"
//!     name = "glass"
//!     prompt = "shattered glass, bright resonant shimmer"
//!     chain_length = 8
//!
//!     [params]
//!     entropy = 0.4
//!     feedback = 0.7
//! "#).unwrap();
//!
//! assert_eq!(preset.name, "glass");
//! assert_eq!(preset.params.entropy, 0.4);
//! assert_eq!(preset.chain_length, 8);
//! ```

use crate::cascade::{MacroCascade, MacroCurve, MacroMapping};
use crate::error::Result;
use crate::params::{ExcitationMode, InferMethod, LaneParams, ParamId};
use crate::sequencer::{AdvanceMode, DEFAULT_STEP_BPM};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LanePreset {
    pub name: String,
    pub prompt: String,
    /// Starting baseline, including the excitation mode.
    pub params: LaneParams,
    pub cascade: MacroCascade,
    pub advance_mode: AdvanceMode,
    pub chain_length: usize,
    pub step_bpm: f32,
    pub prompt_evolution: bool,
}

impl Default for LanePreset {
    fn default() -> Self {
        Self {
            name: "init".to_string(),
            prompt: "resonant texture".to_string(),
            params: LaneParams::default(),
            cascade: MacroCascade::default(),
            advance_mode: AdvanceMode::Manual,
            chain_length: 16,
            step_bpm: DEFAULT_STEP_BPM,
            prompt_evolution: false,
        }
    }
}

impl LanePreset {
    /// Parse a preset from TOML; missing fields take their defaults and
    /// parameter values are clamped into range.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let mut preset: LanePreset = toml::from_str(s)?;
        preset.params.sanitize();
        Ok(preset)
    }

    /// Slow, dense, self-feeding drone.
    pub fn drone() -> Self {
        let mut params = LaneParams::default();
        params.set(ParamId::Feedback, 0.85);
        params.set(ParamId::Chaos, 0.1);
        params.set(ParamId::InputStrength, 0.75);
        params.set(ParamId::Warmth, 0.7);
        params.excitation_mode = ExcitationMode::Sine;
        let cascade = MacroCascade::default();
        cascade.apply_all(&mut params);

        Self {
            name: "drone".to_string(),
            prompt: "deep evolving drone, sustained harmonic resonance".to_string(),
            params,
            cascade,
            advance_mode: AdvanceMode::Iteration,
            chain_length: 8,
            step_bpm: 60.0,
            prompt_evolution: true,
        }
    }

    /// Short drum-seeded cycles stepped on the clock.
    pub fn percussive() -> Self {
        let mut params = LaneParams::default();
        params.set(ParamId::Feedback, 0.3);
        params.set(ParamId::Chaos, 0.35);
        params.set(ParamId::DenoiseStrength, 0.6);
        params.set_steps(12);
        params.excitation_mode = ExcitationMode::Drum;

        let mut cascade = MacroCascade::default();
        cascade.chaos.push(
            MacroMapping::new(ParamId::DelayMix, 0.0, 0.4).with_curve(MacroCurve::Exponential(2.0)),
        );
        cascade.apply_all(&mut params);

        Self {
            name: "percussive".to_string(),
            prompt: "metallic percussion, struck resonant bodies".to_string(),
            params,
            cascade,
            advance_mode: AdvanceMode::Time,
            chain_length: 16,
            step_bpm: 120.0,
            prompt_evolution: false,
        }
    }

    /// Noisy stochastic texture with SDE sampling.
    pub fn granular() -> Self {
        let mut params = LaneParams::default();
        params.set(ParamId::Feedback, 0.6);
        params.set(ParamId::Chaos, 0.75);
        params.set(ParamId::Texture, 0.65);
        params.infer_method = InferMethod::Sde;
        params.excitation_mode = ExcitationMode::Noise;
        let cascade = MacroCascade::default();
        cascade.apply_all(&mut params);

        Self {
            name: "granular".to_string(),
            prompt: "granular cloud, scattered micro-sound particles".to_string(),
            params,
            cascade,
            advance_mode: AdvanceMode::Time,
            chain_length: 12,
            step_bpm: 90.0,
            prompt_evolution: true,
        }
    }

    pub fn builtin() -> Vec<LanePreset> {
        vec![Self::drone(), Self::percussive(), Self::granular()]
    }

    pub fn by_name(name: &str) -> Option<LanePreset> {
        Self::builtin().into_iter().find(|p| p.name == name)
    }
}
