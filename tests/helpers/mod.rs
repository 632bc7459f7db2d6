//! Test helpers and fixtures for latent-resonator integration tests
//!
//! Every engine built here is seeded and uses a [`MockBackend`] that records
//! calls, so cycles are driven by hand (`tick` / `tap` / `await_completions`)
//! instead of a scheduler thread.
//!
//! ## Tolerance Levels
//!
//! Use the appropriate tolerance from [`tolerances`] module:
//! - `FLOAT_EPSILON` (1e-6): exact copies and blends
//! - `NOISE_FLOOR` (1e-3): buffers that only picked up near-zero noise

#![allow(dead_code)]


use latent_resonator::prelude::*;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Long enough for a mock call on a loaded CI machine.
pub const WAIT: Duration = Duration::from_secs(5);

/// Excitation length used by test engines.
pub const TEST_BUFFER_SIZE: usize = 64;

/// One recorded backend call.
#[derive(Debug, Clone)]
pub struct Call {
    pub prompt: String,
    pub audio: Vec<f32>,
    pub denoise_strength: f32,
}

#[derive(Default)]
struct MockState {
    calls: Mutex<Vec<Call>>,
    active: Mutex<HashMap<String, usize>>,
    max_active: Mutex<HashMap<String, usize>>,
    held: AtomicBool,
    fail: AtomicBool,
    in_backend: AtomicUsize,
}

/// Backend that echoes its input and records every call.
///
/// Lanes are told apart by prompt, so give every lane under test a distinct
/// prompt with evolution off. `hold()` parks calls inside the backend until
/// `release()`, which keeps them in flight.
#[derive(Clone, Default)]
pub struct MockBackend {
    state: Arc<MockState>,
    delay: Duration,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.state.calls.lock().len()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.calls.lock().clone()
    }

    pub fn calls_for(&self, prompt: &str) -> usize {
        self.state
            .calls
            .lock()
            .iter()
            .filter(|c| c.prompt == prompt)
            .count()
    }

    /// Highest number of simultaneous calls seen for one prompt.
    pub fn max_concurrent(&self, prompt: &str) -> usize {
        self.state
            .max_active
            .lock()
            .get(prompt)
            .copied()
            .unwrap_or(0)
    }

    /// Calls currently inside `infer`.
    pub fn in_backend(&self) -> usize {
        self.state.in_backend.load(Ordering::SeqCst)
    }

    pub fn hold(&self) {
        self.state.held.store(true, Ordering::SeqCst);
    }

    pub fn release(&self) {
        self.state.held.store(false, Ordering::SeqCst);
    }

    pub fn set_failing(&self, fail: bool) {
        self.state.fail.store(fail, Ordering::SeqCst);
    }

    /// Wait until `n` calls are parked inside the backend.
    pub fn wait_in_backend(&self, n: usize) -> bool {
        wait_until(|| self.in_backend() >= n)
    }
}

impl ResonatorBackend for MockBackend {
    fn infer(
        &self,
        audio: &[f32],
        prompt: &str,
        params: &InferenceParams,
    ) -> std::result::Result<InferenceOutput, InferenceError> {
        let state = &self.state;
        state.calls.lock().push(Call {
            prompt: prompt.to_string(),
            audio: audio.to_vec(),
            denoise_strength: params.denoise_strength,
        });
        {
            let mut active = state.active.lock();
            let n = active.entry(prompt.to_string()).or_insert(0);
            *n += 1;
            let mut max = state.max_active.lock();
            let m = max.entry(prompt.to_string()).or_insert(0);
            *m = (*m).max(*n);
        }
        state.in_backend.fetch_add(1, Ordering::SeqCst);

        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        while state.held.load(Ordering::SeqCst) {
            std::thread::sleep(Duration::from_millis(1));
        }

        state.in_backend.fetch_sub(1, Ordering::SeqCst);
        if let Some(n) = state.active.lock().get_mut(prompt) {
            *n -= 1;
        }

        if state.fail.load(Ordering::SeqCst) {
            return Err(InferenceError::Failed("mock failure".into()));
        }
        Ok(InferenceOutput {
            audio: audio.to_vec(),
            device: "mock".into(),
            latency_ms: 1.0,
        })
    }
}

/// Config with short buffers and silent noise-free seeds unless overridden.
pub fn test_config() -> EngineConfig {
    EngineConfig {
        excitation_length: TEST_BUFFER_SIZE,
        inference_workers: 4,
        ..Default::default()
    }
}

/// Seeded engine on `backend` with a constant excitation of 0.5.
pub fn test_engine(backend: &MockBackend) -> NeuralEngine {
    test_engine_with(backend, test_config())
}

pub fn test_engine_with(backend: &MockBackend, config: EngineConfig) -> NeuralEngine {
    NeuralEngine::builder()
        .config(config)
        .backend(backend.clone())
        .excitation(constant_excitation(0.5))
        .seed(0x5eed)
        .build()
        .expect("Failed to create test engine")
}

/// Excitation source producing `value` on every sample.
pub fn constant_excitation(
    value: f32,
) -> impl FnMut(ExcitationMode, DrumVoice, usize, &mut dyn rand::RngCore) -> Vec<f32> + Send {
    move |_: ExcitationMode, _: DrumVoice, len: usize, _: &mut dyn rand::RngCore| vec![value; len]
}

/// Manual-mode preset with noise, jitter and drift switched off and a
/// distinct prompt so the mock can tell lanes apart.
pub fn quiet_preset(prompt: &str) -> LanePreset {
    let mut preset = LanePreset {
        name: prompt.to_string(),
        prompt: prompt.to_string(),
        prompt_evolution: false,
        advance_mode: AdvanceMode::Manual,
        ..LanePreset::default()
    };
    preset.params.set(ParamId::Entropy, 0.0);
    preset.params.set(ParamId::StochasticDrift, 0.0);
    preset.params.set(ParamId::FeedbackJitter, 0.0);
    preset
}

/// Add a quiet lane with a four-step chain of `note` trigs.
pub fn add_quiet_lane(engine: &mut NeuralEngine, prompt: &str) -> LaneId {
    let mut preset = quiet_preset(prompt);
    preset.chain_length = 4;
    engine.add_lane(&preset).expect("Failed to add lane")
}

/// Poll `cond` until it holds or [`WAIT`] passes.
pub fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    cond()
}

pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}
