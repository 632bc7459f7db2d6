//! Engine configuration.

use crate::sequencer::{OneShotPolicy, MAX_STEP_BPM, MIN_STEP_BPM};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What happens to a trigger that arrives while its lane is inferring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    /// Discard the trigger.
    #[default]
    Drop,
    /// Keep at most one pending trigger, fired when the current call completes.
    Coalesce,
}

/// Configuration for the resonator engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Control-rate clock period of the scheduler thread.
    pub tick_interval_ms: u64,
    /// Output buffers retained per lane.
    pub archive_capacity: usize,
    pub step_capacity: usize,
    pub max_lanes: usize,
    pub inference_workers: usize,
    /// Bounded request queue shared by all workers.
    pub request_queue: usize,
    pub default_step_bpm: f32,
    pub collision_policy: CollisionPolicy,
    pub one_shot_policy: OneShotPolicy,
    /// Samples produced by the excitation source for a lane's first iteration.
    pub excitation_length: usize,
    /// Noise sigma is `entropy * noise_scale`.
    pub noise_scale: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 10,
            archive_capacity: 32,
            step_capacity: 64,
            max_lanes: 8,
            inference_workers: 4,
            request_queue: 64,
            default_step_bpm: 120.0,
            collision_policy: CollisionPolicy::Drop,
            one_shot_policy: OneShotPolicy::RearmOnWrap,
            excitation_length: 4096,
            noise_scale: 0.1,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=1000).contains(&self.tick_interval_ms) {
            return Err(Error::InvalidConfig(format!(
                "tick_interval_ms {} out of range (1-1000)",
                self.tick_interval_ms
            )));
        }
        if !(1..=256).contains(&self.step_capacity) {
            return Err(Error::InvalidConfig(format!(
                "step_capacity {} out of range (1-256)",
                self.step_capacity
            )));
        }
        for (name, value) in [
            ("archive_capacity", self.archive_capacity),
            ("max_lanes", self.max_lanes),
            ("inference_workers", self.inference_workers),
            ("request_queue", self.request_queue),
            ("excitation_length", self.excitation_length),
        ] {
            if value == 0 {
                return Err(Error::InvalidConfig(format!("{} must be at least 1", name)));
            }
        }
        if !(MIN_STEP_BPM..=MAX_STEP_BPM).contains(&self.default_step_bpm) {
            return Err(Error::InvalidTempo(self.default_step_bpm));
        }
        if !(self.noise_scale >= 0.0 && self.noise_scale.is_finite()) {
            return Err(Error::InvalidConfig(format!(
                "noise_scale {} must be a finite value >= 0",
                self.noise_scale
            )));
        }
        Ok(())
    }
}
