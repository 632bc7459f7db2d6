//! Macro cascades: one performance control fanning out to several parameters.
//!
//! A cascade is plain data. Each [`MacroMapping`] maps the macro value onto a
//! window of the target's normalized range, so applying a macro is a pure,
//! idempotent function of `(macro value, mappings)`.
//!
//! While a macro is being dragged the [`MacroController`] suppresses the
//! cascade and performs a single deferred recomputation on release.

use crate::params::{LaneParams, MacroKind, ParamId};
use serde::{Deserialize, Serialize};

/// Shape applied to the macro value before it is mapped onto a target.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MacroCurve {
    #[default]
    Linear,
    /// `m^k`
    Exponential(f32),
    /// `1 - m`
    Inverted,
}

impl MacroCurve {
    #[inline]
    pub fn shape(self, m: f32) -> f32 {
        let m = m.clamp(0.0, 1.0);
        match self {
            MacroCurve::Linear => m,
            MacroCurve::Exponential(k) if k > 0.0 => m.powf(k),
            MacroCurve::Exponential(_) => m,
            MacroCurve::Inverted => 1.0 - m,
        }
    }
}

/// One target of a macro.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacroMapping {
    pub target: ParamId,
    /// Normalized target value at macro = 0 (after the curve).
    pub from: f32,
    /// Normalized target value at macro = 1 (after the curve).
    pub to: f32,
    #[serde(default)]
    pub curve: MacroCurve,
}

impl MacroMapping {
    pub fn new(target: ParamId, from: f32, to: f32) -> Self {
        Self {
            target,
            from: from.clamp(0.0, 1.0),
            to: to.clamp(0.0, 1.0),
            curve: MacroCurve::Linear,
        }
    }

    pub fn with_curve(mut self, curve: MacroCurve) -> Self {
        self.curve = curve;
        self
    }

    /// Real target value for a macro value.
    pub fn value_for(&self, macro_value: f32) -> f32 {
        let shaped = self.curve.shape(macro_value);
        let normalized = self.from + (self.to - self.from) * shaped;
        self.target.range().denormalize(normalized)
    }
}

/// Mapping lists for the three macros.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MacroCascade {
    pub texture: Vec<MacroMapping>,
    pub chaos: Vec<MacroMapping>,
    pub warmth: Vec<MacroMapping>,
}

impl Default for MacroCascade {
    fn default() -> Self {
        Self {
            texture: vec![
                MacroMapping::new(ParamId::FilterCutoff, 0.25, 0.95),
                MacroMapping::new(ParamId::Granularity, 0.1, 0.9),
                MacroMapping::new(ParamId::NoiseDensity, 0.0, 1.0),
            ],
            chaos: vec![
                MacroMapping::new(ParamId::Entropy, 0.05, 0.95),
                MacroMapping::new(ParamId::StochasticDrift, 0.0, 1.0)
                    .with_curve(MacroCurve::Exponential(2.0)),
                MacroMapping::new(ParamId::FeedbackJitter, 0.0, 0.5),
            ],
            warmth: vec![
                MacroMapping::new(ParamId::Saturation, 0.0, 0.6),
                MacroMapping::new(ParamId::FilterResonance, 0.1, 0.6)
                    .with_curve(MacroCurve::Inverted),
            ],
        }
    }
}

impl MacroCascade {
    /// A cascade with no targets; macros only store their own value.
    pub fn empty() -> Self {
        Self {
            texture: Vec::new(),
            chaos: Vec::new(),
            warmth: Vec::new(),
        }
    }

    pub fn mappings(&self, kind: MacroKind) -> &[MacroMapping] {
        match kind {
            MacroKind::Texture => &self.texture,
            MacroKind::Chaos => &self.chaos,
            MacroKind::Warmth => &self.warmth,
        }
    }

    /// Recompute every target of `kind` from the macro value stored in `params`.
    ///
    /// Mappings that target another macro are ignored so cascades never chain.
    pub fn apply(&self, kind: MacroKind, params: &mut LaneParams) {
        let value = params.macro_value(kind);
        for mapping in self.mappings(kind) {
            if mapping.target.as_macro().is_some() {
                tracing::debug!(
                    "Ignoring {:?} mapping onto macro {}",
                    kind,
                    mapping.target.name()
                );
                continue;
            }
            params.set(mapping.target, mapping.value_for(value));
        }
    }

    pub fn apply_all(&self, params: &mut LaneParams) {
        for kind in MacroKind::ALL {
            self.apply(kind, params);
        }
    }

    /// Parameters written by `kind`.
    pub fn targets(&self, kind: MacroKind) -> impl Iterator<Item = ParamId> + '_ {
        self.mappings(kind)
            .iter()
            .map(|m| m.target)
            .filter(|t| t.as_macro().is_none())
    }
}

/// Per-lane macro state: drag suppression and deferred recomputation.
#[derive(Debug, Clone, Default)]
pub struct MacroController {
    suppress: bool,
    dirty: [bool; 3],
    cascade_count: u64,
}

fn slot(kind: MacroKind) -> usize {
    match kind {
        MacroKind::Texture => 0,
        MacroKind::Chaos => 1,
        MacroKind::Warmth => 2,
    }
}

impl MacroController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a macro value; cascade now unless a drag is in progress.
    pub fn set(
        &mut self,
        kind: MacroKind,
        value: f32,
        cascade: &MacroCascade,
        params: &mut LaneParams,
    ) {
        params.set(kind.param(), value);
        if self.suppress {
            self.dirty[slot(kind)] = true;
        } else {
            cascade.apply(kind, params);
            self.cascade_count += 1;
        }
    }

    pub fn begin_drag(&mut self) {
        self.suppress = true;
    }

    /// Release the drag and run one recomputation per macro touched during it.
    pub fn end_drag(&mut self, cascade: &MacroCascade, params: &mut LaneParams) {
        self.suppress = false;
        for kind in MacroKind::ALL {
            if core::mem::take(&mut self.dirty[slot(kind)]) {
                cascade.apply(kind, params);
                self.cascade_count += 1;
            }
        }
    }

    pub fn is_suppressed(&self) -> bool {
        self.suppress
    }

    /// Number of cascade recomputations performed so far.
    pub fn cascade_count(&self) -> u64 {
        self.cascade_count
    }
}
