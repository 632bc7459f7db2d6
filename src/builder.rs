//! Builder for configuring and constructing a `NeuralEngine`.

use crate::excitation::{ExcitationSource, Exciter};
use crate::{NeuralEngine, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use resonator_core::{CollisionPolicy, EngineConfig, OneShotPolicy};
use resonator_neural::{BridgeStatus, PassthroughBackend, ResonatorBackend, SharedBridgeStatus};
use std::sync::Arc;

/// Without a backend the engine runs on [`PassthroughBackend`], and without
/// an explicit bridge status it assumes a model is loaded. Passing a seed
/// makes excitation, noise, probability and jitter draws reproducible.
///
/// # Example
///
/// ```
/// use latent_resonator::prelude::*;
///
/// let engine = NeuralEngine::builder()
///     .max_lanes(4)
///     .collision_policy(CollisionPolicy::Coalesce)
///     .seed(42)
///     .build()?;
///
/// assert_eq!(engine.bridge_status(), BridgeStatus::ModelLoaded);
/// # Ok::<(), latent_resonator::Error>(())
/// ```
pub struct NeuralEngineBuilder {
    config: EngineConfig,
    backend: Option<Arc<dyn ResonatorBackend>>,
    bridge: Option<SharedBridgeStatus>,
    excitation: Option<Box<dyn ExcitationSource>>,
    seed: Option<u64>,
}

impl Default for NeuralEngineBuilder {
    fn default() -> Self {
        Self {
            config: EngineConfig::default(),
            backend: None,
            bridge: None,
            excitation: None,
            seed: None,
        }
    }
}

impl NeuralEngineBuilder {
    /// Replace the whole configuration. Later setters still apply on top.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn backend(mut self, backend: impl ResonatorBackend + 'static) -> Self {
        self.backend = Some(Arc::new(backend));
        self
    }

    /// Use a backend the caller keeps a handle to.
    pub fn shared_backend(mut self, backend: Arc<dyn ResonatorBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Bridge status shared with whatever tracks the bridge's health.
    pub fn bridge_status(mut self, status: SharedBridgeStatus) -> Self {
        self.bridge = Some(status);
        self
    }

    pub fn excitation(mut self, source: impl ExcitationSource + 'static) -> Self {
        self.excitation = Some(Box::new(source));
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn max_lanes(mut self, max: usize) -> Self {
        self.config.max_lanes = max;
        self
    }

    pub fn collision_policy(mut self, policy: CollisionPolicy) -> Self {
        self.config.collision_policy = policy;
        self
    }

    pub fn one_shot_policy(mut self, policy: OneShotPolicy) -> Self {
        self.config.one_shot_policy = policy;
        self
    }

    pub fn archive_capacity(mut self, capacity: usize) -> Self {
        self.config.archive_capacity = capacity;
        self
    }

    pub fn inference_workers(mut self, workers: usize) -> Self {
        self.config.inference_workers = workers;
        self
    }

    pub fn tick_interval_ms(mut self, ms: u64) -> Self {
        self.config.tick_interval_ms = ms;
        self
    }

    /// Build the engine and start its inference workers.
    pub fn build(self) -> Result<NeuralEngine> {
        let backend = self
            .backend
            .unwrap_or_else(|| Arc::new(PassthroughBackend));

        let bridge = self
            .bridge
            .unwrap_or_else(|| SharedBridgeStatus::new(BridgeStatus::ModelLoaded));

        let excitation = self
            .excitation
            .unwrap_or_else(|| Box::new(Exciter::default()));

        let rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        tracing::debug!(
            "Building neural engine with backend '{}'",
            backend.capabilities().name
        );

        NeuralEngine::from_parts(self.config, backend, bridge, excitation, rng)
    }
}
