//! # Latent Resonator
//!
//! Multi-lane recursive neural audio engine. Each lane feeds its last output
//! (or another lane's) back through a diffusion backend, stepped by a
//! per-lane performance sequencer with parameter locks.
//!
//! ## Architecture
//!
//! The umbrella crate coordinates:
//! - **resonator-core** - lane parameters, step grid, locks, macros, scenes, presets, config
//! - **resonator-neural** - backend trait, bridge status, inference worker pool
//!
//! and adds the scheduler on top:
//!
//! ```text
//!  tick() ──▶ drain completions ──▶ scene glide ──▶ evaluate due steps
//!                                                        │
//!          ┌─────────────── snapshot + routing ◀─────────┘
//!          ▼
//!   excitation / feedback mix + noise ──▶ InferencePool ──▶ backend
//! ```
//!
//! ## Quick Start
//!
//! ```
//! use latent_resonator::prelude::*;
//! use std::time::Duration;
//!
//! let mut engine = NeuralEngine::builder().seed(1).build()?;
//!
//! let drone = engine.add_lane(&LanePreset::drone())?;
//! let texture = engine.add_lane(&LanePreset::granular())?;
//! engine.set_feedback_source(texture, Some(drone))?;
//!
//! engine.start_processing();
//! engine.trigger_all();
//! engine.tick();
//! engine.await_completions(Duration::from_secs(2));
//!
//! assert!(engine.lane(drone).unwrap().iteration_count() >= 1);
//! # Ok::<(), latent_resonator::Error>(())
//! ```

/// Re-export of resonator-core for direct access
pub use resonator_core as core;

/// Re-export of resonator-neural for direct access
pub use resonator_neural as neural;

pub use resonator_core::{
    AdvanceMode, BatchEdit, CollisionPolicy, Crossfader, DrumVoice, EngineConfig, ExcitationMode,
    InferMethod, LaneId, LaneParams, LanePreset, LockTarget, LockValue, MacroCascade, MacroCurve,
    MacroKind, MacroMapping, OneShotPolicy, ParamId, PerformanceStep, Scene, SceneBank,
    SkipReason, StepEvaluation, StepGrid, StepOutcome, TrigType, SCENE_SLOTS,
};

pub use resonator_neural::{
    BackendCapabilities, BridgeStatus, FnBackend, InferenceError, InferenceOutput,
    InferenceParams, PassthroughBackend, ResonatorBackend, SharedBridgeStatus,
};

mod error;
pub use error::{Error, Result};

pub mod excitation;
pub mod feedback;
pub mod lane;
pub mod noise;
pub mod prompt;

mod builder;
mod engine;
mod handle;

pub use builder::NeuralEngineBuilder;
pub use engine::{CycleReport, NeuralEngine};
pub use excitation::{ExcitationSource, Exciter};
pub use feedback::{BufferSnapshot, FeedbackInput, FeedbackRouting};
pub use handle::EngineHandle;
pub use lane::{LaneMonitor, LaneStatus, ResonatorLane};

/// Convenience prelude for common imports
pub mod prelude {
    // Main engine
    pub use crate::{CycleReport, EngineHandle, NeuralEngine, NeuralEngineBuilder};

    // Lanes
    pub use crate::{
        DrumVoice, ExcitationMode, ExcitationSource, InferMethod, LaneId, LaneMonitor, LaneParams,
        LanePreset, LaneStatus, ParamId,
    };

    // Sequencer
    pub use crate::{AdvanceMode, BatchEdit, LockValue, OneShotPolicy, StepOutcome, TrigType};

    // Macros, scenes, config
    pub use crate::{CollisionPolicy, EngineConfig, MacroKind};

    // Backend
    pub use crate::{
        BridgeStatus, FnBackend, InferenceError, InferenceOutput, InferenceParams,
        ResonatorBackend, SharedBridgeStatus,
    };

    pub use crate::{Error, Result};
}
