//! Per-lane step grid and its advance/evaluate state machine.

use super::step::{PerformanceStep, TrigType};
use crate::error::{Error, Result};
use crate::locks::{LockTarget, LockValue, ParamLocks};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_STEP_CAPACITY: usize = 64;
pub const MIN_STEP_BPM: f32 = 20.0;
pub const MAX_STEP_BPM: f32 = 999.0;
pub const DEFAULT_STEP_BPM: f32 = 120.0;

/// What moves the current step forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvanceMode {
    /// Explicit taps only.
    #[default]
    Manual,
    /// Periodic clock at `step_bpm`, shifted per step by microtiming.
    Time,
    /// One step per completed inference.
    Iteration,
}

/// When a fired one-shot step becomes eligible again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OneShotPolicy {
    /// Re-armed each time the chain wraps to step 0.
    #[default]
    RearmOnWrap,
    /// Stays silent until [`StepGrid::rearm_one_shots`].
    Latch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Skip,
    OneShotSpent,
    Probability,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Skipped(SkipReason),
    /// Locks applied, no inference.
    LocksOnly,
    /// Locks applied and one inference requested.
    Fire,
}

impl StepOutcome {
    pub fn requests_inference(self) -> bool {
        matches!(self, StepOutcome::Fire)
    }

    pub fn applies_locks(self) -> bool {
        !matches!(self, StepOutcome::Skipped(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepEvaluation {
    pub index: usize,
    pub outcome: StepOutcome,
}

/// Edit applied to every step of a selection.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchEdit {
    SetTrig(TrigType),
    SetLock(LockValue),
    ClearLock(LockTarget),
    ClearLocks,
    SetProbability(Option<f32>),
    SetMicrotiming(f32),
    Reset,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "GridData")]
pub struct StepGrid {
    steps: Vec<PerformanceStep>,
    chain_length: usize,
    current: usize,
    advance_mode: AdvanceMode,
    step_bpm: f32,
    one_shot_policy: OneShotPolicy,
    #[serde(skip)]
    one_shot_fired: Vec<bool>,
    /// Step whose locks are in effect, if its last evaluation applied them.
    #[serde(skip)]
    active: Option<usize>,
}

/// Serialized form of [`StepGrid`]. Runtime bookkeeping is rebuilt on load.
#[derive(Deserialize)]
struct GridData {
    steps: Vec<PerformanceStep>,
    chain_length: usize,
    current: usize,
    advance_mode: AdvanceMode,
    step_bpm: f32,
    one_shot_policy: OneShotPolicy,
}

impl From<GridData> for StepGrid {
    fn from(data: GridData) -> Self {
        let mut grid = Self {
            steps: data.steps,
            chain_length: data.chain_length,
            current: data.current,
            advance_mode: data.advance_mode,
            step_bpm: data.step_bpm,
            one_shot_policy: data.one_shot_policy,
            one_shot_fired: Vec::new(),
            active: None,
        };
        grid.sanitize();
        grid
    }
}

impl Default for StepGrid {
    fn default() -> Self {
        Self::new(DEFAULT_STEP_CAPACITY)
    }
}

impl StepGrid {
    /// Grid of `capacity` default steps with the whole capacity chained.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            steps: vec![PerformanceStep::default(); capacity],
            chain_length: capacity,
            current: 0,
            advance_mode: AdvanceMode::default(),
            step_bpm: DEFAULT_STEP_BPM,
            one_shot_policy: OneShotPolicy::default(),
            one_shot_fired: vec![false; capacity],
            active: None,
        }
    }

    pub fn with_chain_length(mut self, length: usize) -> Self {
        self.set_chain_length(length);
        self
    }

    pub fn with_one_shot_policy(mut self, policy: OneShotPolicy) -> Self {
        self.one_shot_policy = policy;
        self
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.steps.len()
    }

    #[inline]
    pub fn chain_length(&self) -> usize {
        self.chain_length
    }

    #[inline]
    pub fn current_step_index(&self) -> usize {
        self.current
    }

    pub fn current_step(&self) -> &PerformanceStep {
        &self.steps[self.current]
    }

    pub fn step(&self, index: usize) -> Option<&PerformanceStep> {
        self.steps.get(index)
    }

    /// Steps inside the chain.
    pub fn chain(&self) -> &[PerformanceStep] {
        &self.steps[..self.chain_length]
    }

    pub fn advance_mode(&self) -> AdvanceMode {
        self.advance_mode
    }

    pub fn set_advance_mode(&mut self, mode: AdvanceMode) {
        self.advance_mode = mode;
    }

    pub fn step_bpm(&self) -> f32 {
        self.step_bpm
    }

    pub fn set_step_bpm(&mut self, bpm: f32) {
        self.step_bpm = if bpm.is_nan() {
            DEFAULT_STEP_BPM
        } else {
            bpm.clamp(MIN_STEP_BPM, MAX_STEP_BPM)
        };
    }

    pub fn one_shot_policy(&self) -> OneShotPolicy {
        self.one_shot_policy
    }

    pub fn set_one_shot_policy(&mut self, policy: OneShotPolicy) {
        self.one_shot_policy = policy;
    }

    /// Clamp to `1..=capacity`; the current index is pulled back inside.
    pub fn set_chain_length(&mut self, length: usize) {
        self.chain_length = length.clamp(1, self.capacity());
        if self.current >= self.chain_length {
            self.current = self.chain_length - 1;
        }
        if self.active.is_some_and(|i| i >= self.chain_length) {
            self.active = None;
        }
    }

    /// Jump to a step (clamped into the chain). Locks are not applied until
    /// the step is evaluated.
    pub fn set_current_step(&mut self, index: usize) {
        self.current = index.min(self.chain_length - 1);
        self.active = None;
    }

    fn check(&self, index: usize) -> Result<()> {
        if index < self.capacity() {
            Ok(())
        } else {
            Err(Error::StepOutOfRange {
                index,
                capacity: self.capacity(),
            })
        }
    }

    pub fn set_trig(&mut self, index: usize, trig: TrigType) -> Result<()> {
        self.apply_batch(&[index], BatchEdit::SetTrig(trig)).map(|_| ())
    }

    pub fn set_probability(&mut self, index: usize, probability: Option<f32>) -> Result<()> {
        self.apply_batch(&[index], BatchEdit::SetProbability(probability))
            .map(|_| ())
    }

    pub fn set_microtiming(&mut self, index: usize, offset: f32) -> Result<()> {
        self.apply_batch(&[index], BatchEdit::SetMicrotiming(offset))
            .map(|_| ())
    }

    pub fn set_lock(&mut self, index: usize, value: LockValue) -> Result<()> {
        self.apply_batch(&[index], BatchEdit::SetLock(value)).map(|_| ())
    }

    pub fn clear_lock(&mut self, index: usize, target: LockTarget) -> Result<()> {
        self.apply_batch(&[index], BatchEdit::ClearLock(target))
            .map(|_| ())
    }

    pub fn clear_locks(&mut self, index: usize) -> Result<()> {
        self.apply_batch(&[index], BatchEdit::ClearLocks).map(|_| ())
    }

    pub fn reset_step(&mut self, index: usize) -> Result<()> {
        self.apply_batch(&[index], BatchEdit::Reset).map(|_| ())
    }

    /// Apply one edit to every listed step.
    ///
    /// All indices are validated first; on error nothing is changed.
    /// Returns the number of steps edited.
    pub fn apply_batch(&mut self, indices: &[usize], edit: BatchEdit) -> Result<usize> {
        for &index in indices {
            self.check(index)?;
        }

        for &index in indices {
            let step = &mut self.steps[index];
            match &edit {
                BatchEdit::SetTrig(trig) => {
                    step.trig_type = *trig;
                    self.one_shot_fired[index] = false;
                }
                BatchEdit::SetLock(value) => {
                    step.set_lock(*value);
                }
                BatchEdit::ClearLock(target) => step.clear_lock(*target),
                BatchEdit::ClearLocks => step.locks.clear_all(),
                BatchEdit::SetProbability(p) => step.set_probability(*p),
                BatchEdit::SetMicrotiming(m) => step.set_microtiming(*m),
                BatchEdit::Reset => {
                    step.reset();
                    self.one_shot_fired[index] = false;
                }
            }
        }
        Ok(indices.len())
    }

    pub fn rearm_one_shots(&mut self) {
        self.one_shot_fired.iter_mut().for_each(|f| *f = false);
    }

    /// Locks of the step currently in effect.
    pub fn active_locks(&self) -> Option<&ParamLocks> {
        self.active.map(|i| &self.steps[i].locks)
    }

    pub fn clear_active(&mut self) {
        self.active = None;
    }

    /// Move to the next step of the chain and evaluate it.
    pub fn advance<R: Rng + ?Sized>(&mut self, rng: &mut R) -> StepEvaluation {
        let next = (self.current + 1) % self.chain_length;
        if next == 0 && self.one_shot_policy == OneShotPolicy::RearmOnWrap {
            self.rearm_one_shots();
        }
        self.current = next;
        self.evaluate_current(rng)
    }

    /// Evaluate the current step: decide skip / locks-only / fire and make its
    /// locks active when they apply.
    pub fn evaluate_current<R: Rng + ?Sized>(&mut self, rng: &mut R) -> StepEvaluation {
        let index = self.current;
        let step = &self.steps[index];

        let outcome = match step.trig_type {
            TrigType::Skip => StepOutcome::Skipped(SkipReason::Skip),
            TrigType::OneShot if self.one_shot_fired[index] => {
                StepOutcome::Skipped(SkipReason::OneShotSpent)
            }
            trig => {
                let passed = match step.probability() {
                    None => true,
                    Some(p) => {
                        let draw: f32 = rng.gen();
                        p > 0.0 && draw <= p
                    }
                };
                if !passed {
                    StepOutcome::Skipped(SkipReason::Probability)
                } else if trig.requests_inference() {
                    StepOutcome::Fire
                } else {
                    StepOutcome::LocksOnly
                }
            }
        };

        if outcome == StepOutcome::Fire && step.trig_type == TrigType::OneShot {
            self.one_shot_fired[index] = true;
        }
        self.active = outcome.applies_locks().then_some(index);

        tracing::trace!("Step {} evaluated: {:?}", index, outcome);
        StepEvaluation { index, outcome }
    }

    /// Time until the next step becomes current in time mode:
    /// `60 / bpm × (1 + microtiming of the next step)`.
    ///
    /// Each delay is measured from when the current step became due, so a
    /// step played early or late moves every later step with it. Microtiming
    /// shifts the rest of the chain rather than nudging one step off a fixed
    /// grid.
    pub fn step_delay(&self) -> Duration {
        let period = 60.0 / self.step_bpm as f64;
        let next = (self.current + 1) % self.chain_length;
        let offset = self.steps[next].microtiming() as f64;
        Duration::from_secs_f64((period * (1.0 + offset)).max(0.0))
    }

    /// Clamp every field back into range and rebuild one-shot tracking.
    /// Deserializing runs this automatically.
    pub fn sanitize(&mut self) {
        if self.steps.is_empty() {
            self.steps.push(PerformanceStep::default());
        }
        self.steps.iter_mut().for_each(PerformanceStep::sanitize);
        self.one_shot_fired = vec![false; self.steps.len()];
        self.set_step_bpm(self.step_bpm);
        self.set_chain_length(self.chain_length);
        self.active = None;
    }
}
