//! NeuralEngine: the scheduler that owns every lane and runs control cycles.

use crate::excitation::ExcitationSource;
use crate::feedback::{BufferSnapshot, FeedbackRouting};
use crate::lane::{LaneMonitor, ResonatorLane};
use crate::{Error, NeuralEngineBuilder, Result};
use rand::rngs::StdRng;
use resonator_core::{
    AdvanceMode, AtomicFloat, BatchEdit, Crossfader, EngineConfig, LaneId, LanePreset, LockValue,
    MacroKind, ParamId, Scene, SceneBank, SceneGlide, StepEvaluation, TrigType,
};
use resonator_neural::{
    BridgeStatus, InferenceCompletion, InferenceParams, InferencePool, InferenceRequest,
    PoolConfig, ResonatorBackend, SharedBridgeStatus, Ticket,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// What one control cycle did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Sequencer steps that became current and were evaluated.
    pub steps_evaluated: usize,
    /// Calls handed to the inference pool.
    pub requests_issued: usize,
    /// Iterations completed without calling the backend (`denoise_strength == 0`).
    pub passthrough: usize,
    pub completions_applied: usize,
    /// Results for stopped, removed or superseded calls.
    pub stale_discarded: usize,
    /// Triggers that arrived while their lane was inferring.
    pub collisions: usize,
    pub failures: usize,
    /// Triggers skipped because the bridge had no model loaded.
    pub unavailable: usize,
    /// Requests rejected by a full queue.
    pub dropped: usize,
    /// Lanes whose feedback source had been removed.
    pub fallbacks: usize,
}

impl CycleReport {
    pub fn is_idle(&self) -> bool {
        *self == CycleReport::default()
    }

    fn absorb(&mut self, other: &CycleReport) {
        self.steps_evaluated += other.steps_evaluated;
        self.requests_issued += other.requests_issued;
        self.passthrough += other.passthrough;
        self.completions_applied += other.completions_applied;
        self.stale_discarded += other.stale_discarded;
        self.collisions += other.collisions;
        self.failures += other.failures;
        self.unavailable += other.unavailable;
        self.dropped += other.dropped;
        self.fallbacks += other.fallbacks;
    }
}

#[derive(Debug, Clone, Copy)]
struct InFlight {
    lane: LaneId,
    /// Stopped by a panic; the backend may still be running it.
    cancelled: bool,
}

/// The scheduler: owns all lanes, the scene bank and the crossfader, and
/// drives the recursive inference loop one control cycle at a time.
///
/// Every method takes `&mut self`, so the engine is the single writer for
/// all lane state. Inference runs on the pool's worker threads; completions
/// are only applied from inside [`tick`](Self::tick) /
/// [`await_completions`](Self::await_completions).
///
/// # Example
///
/// ```
/// use latent_resonator::prelude::*;
/// use std::time::Duration;
///
/// let mut engine = NeuralEngine::builder().seed(7).build()?;
/// let lane = engine.add_lane(&LanePreset::default())?;
/// engine.set_chain_length(lane, 4)?;
/// engine.set_step_trig(lane, 0, TrigType::Skip)?;
///
/// engine.start_processing();
/// let report = engine.tick();
/// assert_eq!(report.requests_issued, 0);
///
/// engine.tap(lane)?;
/// engine.await_completions(Duration::from_secs(2));
/// assert_eq!(engine.lane(lane).unwrap().iteration_count(), 1);
/// # Ok::<(), latent_resonator::Error>(())
/// ```
pub struct NeuralEngine {
    config: EngineConfig,

    /// Lanes in creation order.
    lanes: Vec<ResonatorLane>,

    scenes: SceneBank,
    crossfader: Crossfader,
    glide: SceneGlide,
    crossfader_readout: Arc<AtomicFloat>,

    pool: InferencePool,
    bridge: SharedBridgeStatus,
    excitation: Box<dyn ExcitationSource>,
    rng: StdRng,

    processing: bool,
    in_flight: HashMap<Ticket, InFlight>,
    /// Lanes queued by `trigger_all` for the next cycle.
    manual_queue: Vec<LaneId>,
    last_tick: Option<Instant>,
    cycles: u64,
    totals: CycleReport,
}

impl NeuralEngine {
    /// Create a new engine builder
    pub fn builder() -> NeuralEngineBuilder {
        NeuralEngineBuilder::default()
    }

    pub(crate) fn from_parts(
        config: EngineConfig,
        backend: Arc<dyn ResonatorBackend>,
        bridge: SharedBridgeStatus,
        excitation: Box<dyn ExcitationSource>,
        rng: StdRng,
    ) -> Result<Self> {
        config.validate()?;
        let pool = InferencePool::start(
            backend,
            PoolConfig {
                workers: config.inference_workers,
                queue_capacity: config.request_queue,
            },
        )?;

        tracing::info!(
            "Neural engine ready (max {} lanes, bridge {:?})",
            config.max_lanes,
            bridge.get()
        );

        Ok(Self {
            config,
            lanes: Vec::new(),
            scenes: SceneBank::new(),
            crossfader: Crossfader::new(),
            glide: SceneGlide::new(),
            crossfader_readout: Arc::new(AtomicFloat::new(0.0)),
            pool,
            bridge,
            excitation,
            rng,
            processing: false,
            in_flight: HashMap::new(),
            manual_queue: Vec::new(),
            last_tick: None,
            cycles: 0,
            totals: CycleReport::default(),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Current bridge readiness. Inference is only attempted when a model is loaded.
    pub fn bridge_status(&self) -> BridgeStatus {
        self.bridge.get()
    }

    /// Handle to the bridge status, for whoever polls the bridge.
    pub fn bridge(&self) -> SharedBridgeStatus {
        self.bridge.clone()
    }

    // =========================================================================
    // Processing
    // =========================================================================

    pub fn is_processing(&self) -> bool {
        self.processing
    }

    /// Start or stop every lane. Returns the new state.
    pub fn toggle_processing(&mut self) -> bool {
        if self.processing {
            self.stop_processing();
        } else {
            self.start_processing();
        }
        self.processing
    }

    pub fn start_processing(&mut self) {
        if self.processing {
            return;
        }
        self.processing = true;
        for lane in &mut self.lanes {
            lane.start();
        }
        self.publish();
        tracing::info!("Processing started ({} lanes)", self.lanes.len());
    }

    /// Hard stop (panic). In-flight results are discarded when they arrive;
    /// iteration counts and archives are kept.
    pub fn stop_processing(&mut self) {
        self.processing = false;
        for lane in &mut self.lanes {
            lane.stop();
        }
        for call in self.in_flight.values_mut() {
            call.cancelled = true;
        }
        self.manual_queue.clear();
        self.publish();
        tracing::info!(
            "Processing stopped ({} in-flight calls discarded)",
            self.in_flight.len()
        );
    }

    // =========================================================================
    // Lanes
    // =========================================================================

    /// Add a lane built from `preset`. It starts running if processing is on.
    pub fn add_lane(&mut self, preset: &LanePreset) -> Result<LaneId> {
        if self.lanes.len() >= self.config.max_lanes {
            return Err(Error::LaneLimit(self.config.max_lanes));
        }
        let mut lane = ResonatorLane::from_preset(preset, &self.config);
        if self.processing {
            lane.start();
        }
        let id = lane.id();
        tracing::info!("Added {} from preset '{}'", id, preset.name);
        self.lanes.push(lane);
        self.update_lane_mixer_state();
        Ok(id)
    }

    /// Add a lane with default parameters at the configured default tempo.
    pub fn add_default_lane(&mut self) -> Result<LaneId> {
        let preset = LanePreset {
            step_bpm: self.config.default_step_bpm,
            ..LanePreset::default()
        };
        self.add_lane(&preset)
    }

    /// Remove a lane. A call still in flight for it is discarded on arrival,
    /// and lanes feeding from it fall back to themselves.
    pub fn remove_lane(&mut self, id: LaneId) -> Result<()> {
        let idx = self.index(id)?;
        self.lanes.remove(idx);
        self.glide.remove_lane(id);
        self.manual_queue.retain(|&l| l != id);
        self.update_lane_mixer_state();
        tracing::info!("Removed {}", id);
        Ok(())
    }

    pub fn lane(&self, id: LaneId) -> Option<&ResonatorLane> {
        self.lanes.iter().find(|l| l.id() == id)
    }

    pub fn lane_mut(&mut self, id: LaneId) -> Result<&mut ResonatorLane> {
        let idx = self.index(id)?;
        Ok(&mut self.lanes[idx])
    }

    pub fn lanes(&self) -> impl Iterator<Item = &ResonatorLane> {
        self.lanes.iter()
    }

    pub fn lane_ids(&self) -> Vec<LaneId> {
        self.lanes.iter().map(|l| l.id()).collect()
    }

    pub fn lane_count(&self) -> usize {
        self.lanes.len()
    }

    pub fn lane_monitor(&self, id: LaneId) -> Option<Arc<LaneMonitor>> {
        self.lane(id).map(|l| l.monitor())
    }

    fn index_of(&self, id: LaneId) -> Option<usize> {
        self.lanes.iter().position(|l| l.id() == id)
    }

    fn index(&self, id: LaneId) -> Result<usize> {
        self.index_of(id).ok_or(Error::LaneNotFound(id))
    }

    // =========================================================================
    // Parameters, macros, routing
    // =========================================================================

    pub fn set_param(&mut self, id: LaneId, param: ParamId, value: f32) -> Result<()> {
        self.lane_mut(id)?.set_param(param, value);
        Ok(())
    }

    pub fn set_macro(&mut self, id: LaneId, kind: MacroKind, value: f32) -> Result<()> {
        self.lane_mut(id)?.set_macro(kind, value);
        Ok(())
    }

    pub fn begin_macro_drag(&mut self, id: LaneId) -> Result<()> {
        self.lane_mut(id)?.begin_macro_drag();
        Ok(())
    }

    /// Release a macro drag; runs one deferred cascade per touched macro.
    pub fn end_macro_drag(&mut self, id: LaneId) -> Result<()> {
        self.lane_mut(id)?.end_macro_drag();
        Ok(())
    }

    pub fn set_prompt(&mut self, id: LaneId, prompt: impl Into<String>) -> Result<()> {
        self.lane_mut(id)?.set_prompt(prompt);
        Ok(())
    }

    /// Point `id` at another lane's output, or back at itself with `None`.
    pub fn set_feedback_source(&mut self, id: LaneId, source: Option<LaneId>) -> Result<()> {
        if let Some(src) = source {
            self.index(src)?;
        }
        self.lane_mut(id)?.set_feedback_source(source);
        Ok(())
    }

    /// Feedback graph as it would be resolved right now.
    pub fn routing(&self) -> FeedbackRouting {
        FeedbackRouting::resolve(self.lanes.iter().map(|l| (l.id(), l.feedback_source())))
    }

    // =========================================================================
    // Mixer
    // =========================================================================

    pub fn set_mute(&mut self, id: LaneId, mute: bool) -> Result<()> {
        self.lane_mut(id)?.set_mute(mute);
        self.update_lane_mixer_state();
        Ok(())
    }

    pub fn set_solo(&mut self, id: LaneId, solo: bool) -> Result<()> {
        self.lane_mut(id)?.set_solo(solo);
        self.update_lane_mixer_state();
        Ok(())
    }

    pub fn set_volume(&mut self, id: LaneId, volume: f32) -> Result<()> {
        self.lane_mut(id)?.set_volume(volume);
        Ok(())
    }

    /// Recompute effective mute: any solo silences every non-soloed lane,
    /// otherwise mute flags apply.
    pub fn update_lane_mixer_state(&mut self) {
        let any_solo = self.lanes.iter().any(|l| l.solo());
        for lane in &mut self.lanes {
            let audible = if any_solo { lane.solo() } else { !lane.mute() };
            lane.set_audible(audible);
        }
    }

    /// Sum of every audible lane's effective output × volume, over `len` samples.
    pub fn master_mix(&self, len: usize) -> Vec<f32> {
        let mut out = vec![0.0; len];
        for lane in self.lanes.iter().filter(|l| l.is_audible()) {
            let gain = lane.volume();
            for (o, s) in out.iter_mut().zip(lane.effective_output()) {
                *o += s * gain;
            }
        }
        out
    }

    // =========================================================================
    // Step grid
    // =========================================================================

    /// Manual advance. The new step's locks apply at once and, if it fires
    /// on a running lane, its inference request is issued immediately.
    pub fn tap(&mut self, id: LaneId) -> Result<StepEvaluation> {
        let idx = self.index(id)?;
        let eval = self.lanes[idx].tap(&mut self.rng);
        let mut report = CycleReport {
            steps_evaluated: 1,
            ..Default::default()
        };
        if eval.outcome.requests_inference() && self.lanes[idx].is_running() {
            self.dispatch(&[id], &mut report);
        }
        self.lanes[idx].publish();
        self.totals.absorb(&report);
        Ok(eval)
    }

    pub fn set_step_trig(&mut self, id: LaneId, index: usize, trig: TrigType) -> Result<()> {
        self.lane_mut(id)?.grid_mut().set_trig(index, trig)?;
        Ok(())
    }

    pub fn set_step_lock(&mut self, id: LaneId, index: usize, value: LockValue) -> Result<()> {
        self.lane_mut(id)?.grid_mut().set_lock(index, value)?;
        Ok(())
    }

    pub fn clear_step_locks(&mut self, id: LaneId, index: usize) -> Result<()> {
        self.lane_mut(id)?.grid_mut().clear_locks(index)?;
        Ok(())
    }

    pub fn set_step_probability(
        &mut self,
        id: LaneId,
        index: usize,
        probability: Option<f32>,
    ) -> Result<()> {
        self.lane_mut(id)?
            .grid_mut()
            .set_probability(index, probability)?;
        Ok(())
    }

    pub fn set_step_microtiming(&mut self, id: LaneId, index: usize, offset: f32) -> Result<()> {
        self.lane_mut(id)?
            .grid_mut()
            .set_microtiming(index, offset)?;
        Ok(())
    }

    /// Apply one edit to several steps at once; nothing changes if any index
    /// is out of range. Returns the number of steps edited.
    pub fn apply_batch(&mut self, id: LaneId, indices: &[usize], edit: BatchEdit) -> Result<usize> {
        let lane = self.lane_mut(id)?;
        let edited = lane.grid_mut().apply_batch(indices, edit)?;
        lane.publish();
        Ok(edited)
    }

    /// Clamped to `1..=capacity`; the current step is pulled back inside the chain.
    pub fn set_chain_length(&mut self, id: LaneId, length: usize) -> Result<()> {
        let lane = self.lane_mut(id)?;
        lane.grid_mut().set_chain_length(length);
        lane.publish();
        Ok(())
    }

    pub fn set_current_step(&mut self, id: LaneId, index: usize) -> Result<()> {
        let lane = self.lane_mut(id)?;
        lane.grid_mut().set_current_step(index);
        lane.publish();
        Ok(())
    }

    pub fn set_advance_mode(&mut self, id: LaneId, mode: AdvanceMode) -> Result<()> {
        self.lane_mut(id)?.grid_mut().set_advance_mode(mode);
        Ok(())
    }

    pub fn set_step_bpm(&mut self, id: LaneId, bpm: f32) -> Result<()> {
        self.lane_mut(id)?.grid_mut().set_step_bpm(bpm);
        Ok(())
    }

    // =========================================================================
    // Scenes
    // =========================================================================

    pub fn scenes(&self) -> &SceneBank {
        &self.scenes
    }

    /// Store every lane's baseline in `slot`, overwriting what was there.
    pub fn capture_scene(&mut self, slot: usize, crossfade_duration: Duration) -> Result<()> {
        let scene = Scene::capture(
            self.lanes.iter().map(|l| (l.id(), l.params())),
            crossfade_duration,
        );
        let count = scene.lanes.len();
        self.scenes.store(slot, scene)?;
        tracing::info!("Captured {} lanes into scene {}", count, slot);
        Ok(())
    }

    /// Replace the baseline of every lane the scene contains, instantly.
    pub fn apply_scene(&mut self, slot: usize) -> Result<()> {
        let scene = self.scenes.get(slot)?.clone();
        self.glide.cancel();
        let mut applied = 0;
        for lane in &mut self.lanes {
            if let Some(params) = scene.params(lane.id()) {
                lane.set_params(params.clone());
                applied += 1;
            }
        }
        tracing::info!("Applied scene {} to {} lanes", slot, applied);
        Ok(())
    }

    pub fn clear_scene(&mut self, slot: usize) -> Result<()> {
        self.scenes.clear(slot)?;
        Ok(())
    }

    /// Load `slot` as scene A (crossfader jumps to 0).
    pub fn load_scene_a(&mut self, slot: usize) -> Result<()> {
        let duration = self.scenes.get(slot)?.crossfade_duration;
        self.crossfader.load_a(slot);
        self.move_to_crossfader(duration);
        tracing::info!("Scene {} loaded as A", slot);
        Ok(())
    }

    /// Load `slot` as scene B (crossfader jumps to 1).
    pub fn load_scene_b(&mut self, slot: usize) -> Result<()> {
        let duration = self.scenes.get(slot)?.crossfade_duration;
        self.crossfader.load_b(slot);
        self.move_to_crossfader(duration);
        tracing::info!("Scene {} loaded as B", slot);
        Ok(())
    }

    /// Move the crossfader. Baselines follow the A/B blend directly; any
    /// scene-load glide is cancelled.
    pub fn set_crossfader(&mut self, position: f32) {
        self.glide.cancel();
        self.crossfader.set_position(position);
        self.move_to_crossfader(Duration::ZERO);
    }

    pub fn crossfader_position(&self) -> f32 {
        self.crossfader.position()
    }

    pub fn crossfader(&self) -> &Crossfader {
        &self.crossfader
    }

    /// Crossfader position, readable from any thread.
    pub fn crossfader_readout(&self) -> Arc<AtomicFloat> {
        Arc::clone(&self.crossfader_readout)
    }

    pub fn is_scene_gliding(&self) -> bool {
        self.glide.is_active()
    }

    /// Set each lane's baseline to the crossfader blend, gliding there over
    /// `duration` when it is non-zero.
    fn move_to_crossfader(&mut self, duration: Duration) {
        for lane in &mut self.lanes {
            let Some(target) = self.crossfader.blend(&self.scenes, lane.id()) else {
                continue;
            };
            if duration.is_zero() {
                lane.set_params(target);
            } else {
                self.glide
                    .start(lane.id(), lane.params().clone(), target, duration);
            }
        }
        self.crossfader_readout.set(self.crossfader.position());
    }

    // =========================================================================
    // Cycles
    // =========================================================================

    /// Queue one inference cycle on every lane for the next tick, regardless
    /// of their grids.
    pub fn trigger_all(&mut self) {
        self.manual_queue = self.lane_ids();
    }

    /// Run one control cycle now.
    pub fn tick(&mut self) -> CycleReport {
        self.tick_at(Instant::now())
    }

    /// Run one control cycle at `now`.
    ///
    /// Order: apply finished calls, advance scene glides, evaluate due
    /// sequencer steps, then resolve routing against the buffers completed
    /// before this cycle and dispatch requests.
    pub fn tick_at(&mut self, now: Instant) -> CycleReport {
        let mut report = CycleReport::default();
        let mut due: Vec<LaneId> = Vec::new();

        for completion in self.pool.drain_completions() {
            if let Some(lane) = self.apply_completion(completion, &mut report) {
                due.push(lane);
            }
        }

        let dt = self
            .last_tick
            .map(|t| now.saturating_duration_since(t))
            .unwrap_or_default();
        self.last_tick = Some(now);
        if self.glide.is_active() {
            for (id, params) in self.glide.advance(dt) {
                if let Some(idx) = self.index_of(id) {
                    self.lanes[idx].set_params(params);
                }
            }
        }

        if self.processing {
            for lane in &mut self.lanes {
                if let Some(eval) = lane.poll_step(now, &mut self.rng) {
                    report.steps_evaluated += 1;
                    if eval.outcome.requests_inference() {
                        due.push(lane.id());
                    }
                }
            }
        }

        due.append(&mut self.manual_queue);
        let mut seen = Vec::with_capacity(due.len());
        due.retain(|id| {
            if seen.contains(id) {
                false
            } else {
                seen.push(*id);
                true
            }
        });

        if !due.is_empty() {
            self.dispatch(&due, &mut report);
        }

        self.publish();
        self.cycles += 1;
        self.totals.absorb(&report);
        if !report.is_idle() {
            tracing::debug!("Cycle {}: {:?}", self.cycles, report);
        }
        report
    }

    /// Block until every outstanding call has come back or `timeout` passes,
    /// applying results as they arrive. Coalesced triggers are dispatched
    /// straight away. Sequencer steps are not evaluated.
    pub fn await_completions(&mut self, timeout: Duration) -> CycleReport {
        let deadline = Instant::now() + timeout;
        let mut report = CycleReport::default();

        while !self.in_flight.is_empty() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            let Some(completion) = self.pool.wait_completion(remaining) else {
                break;
            };
            if let Some(lane) = self.apply_completion(completion, &mut report) {
                self.dispatch(&[lane], &mut report);
            }
        }

        self.publish();
        self.totals.absorb(&report);
        report
    }

    /// Calls the backend may still be running, including ones cancelled by a stop.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Running totals over every cycle so far.
    pub fn totals(&self) -> &CycleReport {
        &self.totals
    }

    pub fn cycle_count(&self) -> u64 {
        self.cycles
    }

    /// Whether the backend may still be running a call for `lane`.
    fn backend_busy(&self, lane: LaneId) -> bool {
        self.in_flight.values().any(|call| call.lane == lane)
    }

    /// Issue one inference cycle for each lane in `due`.
    fn dispatch(&mut self, due: &[LaneId], report: &mut CycleReport) {
        let snapshot =
            BufferSnapshot::capture(self.lanes.iter().map(|l| (l.id(), l.output_buffer())));
        let routing = self.routing();
        report.fallbacks += routing.fallback_count();
        let bridge_ready = self.bridge.get().allows_inference();

        for &id in due {
            let Some(idx) = self.index_of(id) else {
                continue;
            };

            if self.lanes[idx].is_inferring() || self.backend_busy(id) {
                let policy = self.config.collision_policy;
                self.lanes[idx].register_collision(policy);
                report.collisions += 1;
                tracing::debug!("{} still inferring, trigger {:?}", id, policy);
                continue;
            }

            let lane = &self.lanes[idx];
            let params = lane.effective_params();
            let inference = InferenceParams::from_lane(&params);

            if !inference.is_passthrough() && !bridge_ready {
                self.lanes[idx].mark_unavailable();
                report.unavailable += 1;
                tracing::debug!("{} skipped, bridge {:?}", id, self.bridge.get());
                continue;
            }

            let seed = lane.build_seed(
                &params,
                &snapshot,
                routing.input(id),
                self.excitation.as_mut(),
                &mut self.rng,
                &self.config,
            );

            if inference.is_passthrough() {
                self.lanes[idx].complete(seed, Some("passthrough".to_string()), 0.0);
                report.passthrough += 1;
                continue;
            }

            let request = InferenceRequest {
                lane: id,
                audio: seed,
                prompt: lane.next_prompt(),
                params: inference,
            };
            match self.pool.submit(request) {
                Some(ticket) => {
                    self.lanes[idx].begin_inference(ticket);
                    self.in_flight.insert(
                        ticket,
                        InFlight {
                            lane: id,
                            cancelled: false,
                        },
                    );
                    report.requests_issued += 1;
                }
                None => {
                    self.lanes[idx].fail("request queue full".to_string());
                    report.dropped += 1;
                }
            }
        }
    }

    /// Apply one finished call. Returns the lane if it had a coalesced
    /// trigger waiting for this completion.
    fn apply_completion(
        &mut self,
        completion: InferenceCompletion,
        report: &mut CycleReport,
    ) -> Option<LaneId> {
        let InferenceCompletion {
            ticket,
            lane: id,
            result,
            elapsed,
        } = completion;

        let call = self.in_flight.remove(&ticket);
        let idx = self.index_of(id);
        let current = idx.is_some_and(|i| self.lanes[i].in_flight() == Some(ticket));

        let idx = match (call, idx) {
            (Some(call), Some(idx)) if !call.cancelled && current => idx,
            (_, idx) => {
                report.stale_discarded += 1;
                tracing::debug!("Discarded stale result for {} ({:?})", id, ticket);
                // A trigger coalesced behind a cancelled call can go now.
                let backend_busy = self.backend_busy(id);
                let lane = &mut self.lanes[idx?];
                if lane.is_inferring() || backend_busy {
                    return None;
                }
                if lane.take_pending_trigger() {
                    return Some(id);
                }
                // A dropped trigger is over too; iteration lanes move on.
                lane.finish_iteration_cycle();
                return None;
            }
        };

        let lane = &mut self.lanes[idx];
        match result {
            Ok(output) => {
                tracing::trace!(
                    "{} iteration {} in {:?} on {}",
                    id,
                    lane.iteration_count() + 1,
                    elapsed,
                    output.device
                );
                lane.complete(output.audio, Some(output.device), output.latency_ms);
                report.completions_applied += 1;
            }
            Err(e) => {
                tracing::warn!("{} inference failed: {}", id, e);
                lane.fail(e.to_string());
                report.failures += 1;
            }
        }

        if lane.take_pending_trigger() {
            Some(id)
        } else {
            None
        }
    }

    fn publish(&self) {
        for lane in &self.lanes {
            lane.publish();
        }
        self.crossfader_readout.set(self.crossfader.position());
    }
}

impl std::fmt::Debug for NeuralEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NeuralEngine")
            .field("lanes", &self.lanes)
            .field("processing", &self.processing)
            .field("in_flight", &self.in_flight.len())
            .field("crossfader", &self.crossfader)
            .field("cycles", &self.cycles)
            .finish_non_exhaustive()
    }
}
