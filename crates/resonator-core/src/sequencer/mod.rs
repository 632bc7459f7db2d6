//! Step sequencer: performance steps, trig semantics, and the advance state machine.

mod grid;
mod step;

pub use grid::{
    AdvanceMode, BatchEdit, OneShotPolicy, SkipReason, StepEvaluation, StepGrid, StepOutcome,
    DEFAULT_STEP_BPM, DEFAULT_STEP_CAPACITY, MAX_STEP_BPM, MIN_STEP_BPM,
};
pub use step::{PerformanceStep, TrigType, MAX_MICROTIMING};
