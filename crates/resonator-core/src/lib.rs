//! Core state for the latent resonator: lane parameters, step sequencer, macros and scenes.
//!
//! Everything in this crate is plain data and synchronous state transitions.
//! Threads, inference and scheduling live in `resonator-neural` and the
//! `latent-resonator` umbrella crate.
//!
//! # Primary API
//!
//! - [`LaneParams`] / [`ParamId`]: the per-lane parameter set
//! - [`StepGrid`] / [`PerformanceStep`]: sequencer with trig types and parameter locks
//! - [`effective_params`]: read-time lock merge
//! - [`MacroCascade`] / [`MacroController`]: macro fan-out with drag suppression
//! - [`SceneBank`] / [`Crossfader`]: scene snapshots and A/B blending
//! - [`LanePreset`], [`EngineConfig`]
//!
//! # Example
//!
//! ```
//! use resonator_core::*;
//! use rand::SeedableRng;
//!
//! let mut grid = StepGrid::new(16).with_chain_length(4);
//! grid.set_trig(0, TrigType::Lock).unwrap();
//! grid.set_lock(0, LockValue::Param(ParamId::Texture, 0.8)).unwrap();
//!
//! let mut rng = rand::rngs::StdRng::seed_from_u64(1);
//! let eval = grid.evaluate_current(&mut rng);
//! assert_eq!(eval.outcome, StepOutcome::LocksOnly);
//!
//! let base = LaneParams::default();
//! let live = effective_params(&base, grid.active_locks().unwrap(), &MacroCascade::default());
//! assert_eq!(live.texture, 0.8);
//! assert_eq!(base.texture, 0.5);
//! ```

pub mod error;
pub use error::{Error, Result};

pub mod parameter;
pub use parameter::{ParameterRange, ParameterScale};

mod id;
pub use id::LaneId;

pub mod params;
pub use params::{
    DrumVoice, ExcitationMode, InferMethod, LaneParams, MacroKind, ParamId, DEFAULT_STEPS,
    MAX_STEPS, MIN_STEPS,
};

pub mod locks;
pub use locks::{
    effective_params, effective_value, LockTarget, LockValue, ParamLocks, LOCKABLE_PARAMS,
};

pub mod cascade;
pub use cascade::{MacroCascade, MacroController, MacroCurve, MacroMapping};

pub mod sequencer;
pub use sequencer::{
    AdvanceMode, BatchEdit, OneShotPolicy, PerformanceStep, SkipReason, StepEvaluation, StepGrid,
    StepOutcome, TrigType,
};

pub mod scene;
pub use scene::{Crossfader, Scene, SceneBank, SceneGlide, SCENE_SLOTS};

pub mod smooth;
pub use smooth::ParamGlide;

pub(crate) mod lockfree;
pub use lockfree::{AtomicCounter, AtomicFlag, AtomicFloat, AtomicIndex};

pub mod preset;
pub use preset::LanePreset;

pub mod config;
pub use config::{CollisionPolicy, EngineConfig};
