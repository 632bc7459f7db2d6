//! One sequencer slot.

use crate::locks::{LockTarget, LockValue, ParamLocks};
use serde::{Deserialize, Serialize};

pub const MAX_MICROTIMING: f32 = 0.5;

/// How a step behaves when it becomes current.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrigType {
    /// Apply locks, then request one inference cycle.
    #[default]
    Note,
    /// Apply locks only (trigless).
    Lock,
    /// Like `Note`, but fires once per traversal of the chain.
    OneShot,
    /// Do nothing.
    Skip,
}

impl TrigType {
    pub fn requests_inference(self) -> bool {
        matches!(self, TrigType::Note | TrigType::OneShot)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceStep {
    pub trig_type: TrigType,
    probability: Option<f32>,
    microtiming: f32,
    pub locks: ParamLocks,
}

impl PerformanceStep {
    pub fn new(trig_type: TrigType) -> Self {
        Self {
            trig_type,
            ..Self::default()
        }
    }

    pub fn with_lock(mut self, value: LockValue) -> Self {
        self.locks.set(value);
        self
    }

    pub fn with_probability(mut self, probability: f32) -> Self {
        self.set_probability(Some(probability));
        self
    }

    /// `None` means the step always fires.
    pub fn probability(&self) -> Option<f32> {
        self.probability
    }

    pub fn set_probability(&mut self, probability: Option<f32>) {
        self.probability = probability.map(|p| {
            if p.is_nan() {
                1.0
            } else {
                p.clamp(0.0, 1.0)
            }
        });
    }

    /// Fraction of a step period, negative is early.
    pub fn microtiming(&self) -> f32 {
        self.microtiming
    }

    pub fn set_microtiming(&mut self, offset: f32) {
        self.microtiming = if offset.is_nan() {
            0.0
        } else {
            offset.clamp(-MAX_MICROTIMING, MAX_MICROTIMING)
        };
    }

    pub fn set_lock(&mut self, value: LockValue) -> bool {
        self.locks.set(value)
    }

    pub fn clear_lock(&mut self, target: LockTarget) {
        self.locks.clear(target);
    }

    pub fn lock_count(&self) -> usize {
        self.locks.lock_count()
    }

    pub fn has_lock(&self) -> bool {
        self.locks.has_lock()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Re-clamp fields after deserializing.
    pub fn sanitize(&mut self) {
        self.set_probability(self.probability);
        self.set_microtiming(self.microtiming);
    }
}
