//! Per-step parameter locks and the read-time merge.
//!
//! A lock never writes into a lane's baseline. The effective parameter set of
//! a lane is computed on demand by [`effective_params`], so editing the
//! baseline while a locked step is current leaves both values intact.

use crate::cascade::MacroCascade;
use crate::params::{DrumVoice, ExcitationMode, LaneParams, MacroKind, ParamId};
use serde::{Deserialize, Serialize};

/// Continuous parameters a step may lock.
pub const LOCKABLE_PARAMS: [ParamId; 11] = [
    ParamId::GuidanceScale,
    ParamId::Feedback,
    ParamId::Texture,
    ParamId::Chaos,
    ParamId::Warmth,
    ParamId::FilterCutoff,
    ParamId::FilterResonance,
    ParamId::PromptPhase,
    ParamId::DenoiseStrength,
    ParamId::DelayMix,
    ParamId::BitCrushDepth,
];

/// Which lock field an operation addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockTarget {
    Param(ParamId),
    ExcitationMode,
    DrumVoice,
}

/// A lock field together with its value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockValue {
    Param(ParamId, f32),
    ExcitationMode(ExcitationMode),
    DrumVoice(DrumVoice),
}

impl LockValue {
    pub fn target(&self) -> LockTarget {
        match self {
            LockValue::Param(id, _) => LockTarget::Param(*id),
            LockValue::ExcitationMode(_) => LockTarget::ExcitationMode,
            LockValue::DrumVoice(_) => LockTarget::DrumVoice,
        }
    }
}

/// Optional overrides carried by one step. `None` means "use the baseline".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParamLocks {
    pub cfg: Option<f32>,
    pub feedback: Option<f32>,
    pub texture: Option<f32>,
    pub chaos: Option<f32>,
    pub warmth: Option<f32>,
    pub filter_cutoff: Option<f32>,
    pub filter_resonance: Option<f32>,
    pub prompt_phase: Option<f32>,
    pub denoise_strength: Option<f32>,
    pub excitation_mode: Option<ExcitationMode>,
    pub delay_mix: Option<f32>,
    pub bit_crush_depth: Option<f32>,
    pub drum_voice: Option<DrumVoice>,
}

impl ParamLocks {
    fn slot_mut(&mut self, id: ParamId) -> Option<&mut Option<f32>> {
        Some(match id {
            ParamId::GuidanceScale => &mut self.cfg,
            ParamId::Feedback => &mut self.feedback,
            ParamId::Texture => &mut self.texture,
            ParamId::Chaos => &mut self.chaos,
            ParamId::Warmth => &mut self.warmth,
            ParamId::FilterCutoff => &mut self.filter_cutoff,
            ParamId::FilterResonance => &mut self.filter_resonance,
            ParamId::PromptPhase => &mut self.prompt_phase,
            ParamId::DenoiseStrength => &mut self.denoise_strength,
            ParamId::DelayMix => &mut self.delay_mix,
            ParamId::BitCrushDepth => &mut self.bit_crush_depth,
            _ => return None,
        })
    }

    /// Locked value of a continuous parameter, if any.
    pub fn param(&self, id: ParamId) -> Option<f32> {
        match id {
            ParamId::GuidanceScale => self.cfg,
            ParamId::Feedback => self.feedback,
            ParamId::Texture => self.texture,
            ParamId::Chaos => self.chaos,
            ParamId::Warmth => self.warmth,
            ParamId::FilterCutoff => self.filter_cutoff,
            ParamId::FilterResonance => self.filter_resonance,
            ParamId::PromptPhase => self.prompt_phase,
            ParamId::DenoiseStrength => self.denoise_strength,
            ParamId::DelayMix => self.delay_mix,
            ParamId::BitCrushDepth => self.bit_crush_depth,
            _ => None,
        }
    }

    pub fn is_lockable(id: ParamId) -> bool {
        LOCKABLE_PARAMS.contains(&id)
    }

    /// Store a lock, clamped to the parameter's range.
    ///
    /// Returns `false` if the parameter cannot be locked per step.
    pub fn set(&mut self, value: LockValue) -> bool {
        match value {
            LockValue::Param(id, v) => match self.slot_mut(id) {
                Some(slot) => {
                    *slot = Some(id.range().clamp(v));
                    true
                }
                None => false,
            },
            LockValue::ExcitationMode(m) => {
                self.excitation_mode = Some(m);
                true
            }
            LockValue::DrumVoice(v) => {
                self.drum_voice = Some(v);
                true
            }
        }
    }

    pub fn clear(&mut self, target: LockTarget) {
        match target {
            LockTarget::Param(id) => {
                if let Some(slot) = self.slot_mut(id) {
                    *slot = None;
                }
            }
            LockTarget::ExcitationMode => self.excitation_mode = None,
            LockTarget::DrumVoice => self.drum_voice = None,
        }
    }

    pub fn clear_all(&mut self) {
        *self = Self::default();
    }

    /// Number of non-empty lock fields.
    pub fn lock_count(&self) -> usize {
        LOCKABLE_PARAMS
            .iter()
            .filter(|id| self.param(**id).is_some())
            .count()
            + usize::from(self.excitation_mode.is_some())
            + usize::from(self.drum_voice.is_some())
    }

    #[inline]
    pub fn has_lock(&self) -> bool {
        self.lock_count() > 0
    }
}

/// `lock` if present, else `base`.
#[inline]
pub fn effective_value(base: f32, lock: Option<f32>) -> f32 {
    lock.unwrap_or(base)
}

/// Overlay `locks` on `base` without touching `base`.
///
/// A locked macro whose value differs from the baseline re-runs that macro's
/// cascade on the overlay. Explicit non-macro locks are applied last so they
/// win over anything a locked macro derived.
pub fn effective_params(
    base: &LaneParams,
    locks: &ParamLocks,
    cascade: &MacroCascade,
) -> LaneParams {
    let mut out = base.clone();
    if !locks.has_lock() {
        return out;
    }

    for id in LOCKABLE_PARAMS {
        if let Some(v) = locks.param(id) {
            out.set(id, effective_value(base.get(id), Some(v)));
        }
    }
    if let Some(mode) = locks.excitation_mode {
        out.excitation_mode = mode;
    }
    if let Some(voice) = locks.drum_voice {
        out.drum_voice = voice;
    }

    let mut recomputed = false;
    for kind in MacroKind::ALL {
        if let Some(v) = locks.param(kind.param()) {
            if v != base.macro_value(kind) {
                cascade.apply(kind, &mut out);
                recomputed = true;
            }
        }
    }

    if recomputed {
        for id in LOCKABLE_PARAMS.iter().filter(|id| id.as_macro().is_none()) {
            if let Some(v) = locks.param(*id) {
                out.set(*id, v);
            }
        }
    }

    out
}
