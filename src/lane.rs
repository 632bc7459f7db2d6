//! One resonator lane and its recursive inference loop.
//!
//! A lane owns its parameter baseline, macro state, step grid, output buffer
//! and archive. It never talks to the backend itself: the scheduler asks it
//! for a seed buffer, submits the call, and hands the result back. All
//! mutation happens on the scheduler's side; other threads read the
//! [`LaneMonitor`].

use crate::excitation::ExcitationSource;
use crate::feedback::{mix_input, BufferSnapshot, FeedbackInput, SharedBuffer};
use crate::noise::{self, NoiseSpec};
use crate::prompt;
use rand::{Rng, RngCore};
use resonator_core::{
    effective_params, AdvanceMode, AtomicCounter, AtomicFlag, AtomicFloat, AtomicIndex,
    CollisionPolicy, DrumVoice, EngineConfig, ExcitationMode, InferMethod, LaneId, LanePreset,
    LaneParams, MacroCascade, MacroController, MacroKind, ParamId, StepEvaluation, StepGrid,
};
use resonator_neural::Ticket;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

/// Lane-level status surfaced to the rendering layer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LaneStatus {
    /// Not running.
    #[default]
    Idle,
    /// Running and waiting for a trigger.
    Ready,
    Inferring,
    /// The last call failed; the lane keeps running.
    Failed(String),
    /// Inference could not be attempted (bridge not ready).
    Unavailable,
}

/// Lock-free readouts of one lane, readable from any thread.
#[derive(Debug, Default)]
pub struct LaneMonitor {
    iteration_count: AtomicCounter,
    rms: AtomicFloat,
    inferring: AtomicFlag,
    running: AtomicFlag,
    current_step: AtomicIndex,
    chain_length: AtomicIndex,
    current_lock_count: AtomicIndex,
}

impl LaneMonitor {
    pub fn iteration_count(&self) -> u64 {
        self.iteration_count.get()
    }

    pub fn rms(&self) -> f32 {
        self.rms.get()
    }

    pub fn is_inferring(&self) -> bool {
        self.inferring.get()
    }

    pub fn is_running(&self) -> bool {
        self.running.get()
    }

    pub fn current_step(&self) -> usize {
        self.current_step.get()
    }

    pub fn chain_length(&self) -> usize {
        self.chain_length.get()
    }

    /// Lock count of the current step.
    pub fn current_lock_count(&self) -> usize {
        self.current_lock_count.get()
    }
}

pub struct ResonatorLane {
    id: LaneId,
    name: String,
    prompt: String,
    prompt_evolution: bool,

    /// Live baseline. Locks are merged over it at read time, never written in.
    params: LaneParams,
    cascade: MacroCascade,
    macros: MacroController,
    grid: StepGrid,

    /// `None` feeds on itself.
    feedback_source: Option<LaneId>,

    mute: bool,
    solo: bool,
    volume: f32,
    audible: bool,

    running: bool,
    in_flight: Option<Ticket>,
    pending_trigger: bool,
    status: LaneStatus,

    iteration_count: u64,
    output: SharedBuffer,
    rms: f32,
    archive: VecDeque<SharedBuffer>,
    archive_capacity: usize,
    recall: Option<usize>,
    last_device: Option<String>,
    last_latency_ms: f32,
    failures: u64,
    collisions: u64,

    // Sequencer clock
    primed: bool,
    timing: (AdvanceMode, f32),
    next_step_due: Option<Instant>,
    iteration_advance: bool,

    monitor: Arc<LaneMonitor>,
}

impl std::fmt::Debug for ResonatorLane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResonatorLane")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("status", &self.status)
            .field("iteration_count", &self.iteration_count)
            .field("feedback_source", &self.feedback_source)
            .finish_non_exhaustive()
    }
}

impl ResonatorLane {
    /// Build a lane from a preset.
    pub fn from_preset(preset: &LanePreset, config: &EngineConfig) -> Self {
        let mut params = preset.params.clone();
        params.sanitize();

        let mut grid = StepGrid::new(config.step_capacity)
            .with_one_shot_policy(config.one_shot_policy)
            .with_chain_length(preset.chain_length);
        grid.set_advance_mode(preset.advance_mode);
        grid.set_step_bpm(preset.step_bpm);

        let monitor = Arc::new(LaneMonitor::default());
        let lane = Self {
            id: LaneId::new(),
            name: preset.name.clone(),
            prompt: preset.prompt.clone(),
            prompt_evolution: preset.prompt_evolution,
            params,
            cascade: preset.cascade.clone(),
            macros: MacroController::new(),
            timing: (grid.advance_mode(), grid.step_bpm()),
            grid,
            feedback_source: None,
            mute: false,
            solo: false,
            volume: 1.0,
            audible: true,
            running: false,
            in_flight: None,
            pending_trigger: false,
            status: LaneStatus::Idle,
            iteration_count: 0,
            output: Arc::new(Vec::new()),
            rms: 0.0,
            archive: VecDeque::with_capacity(config.archive_capacity),
            archive_capacity: config.archive_capacity.max(1),
            recall: None,
            last_device: None,
            last_latency_ms: 0.0,
            failures: 0,
            collisions: 0,
            primed: false,
            next_step_due: None,
            iteration_advance: false,
            monitor,
        };
        lane.publish();
        lane
    }

    #[inline]
    pub fn id(&self) -> LaneId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn set_prompt(&mut self, prompt: impl Into<String>) {
        self.prompt = prompt.into();
    }

    pub fn prompt_evolution(&self) -> bool {
        self.prompt_evolution
    }

    pub fn set_prompt_evolution(&mut self, enabled: bool) {
        self.prompt_evolution = enabled;
    }

    /// Prompt that the next inference call will carry.
    pub fn next_prompt(&self) -> String {
        let phase = self.effective_params().prompt_phase;
        prompt::evolve(
            &self.prompt,
            phase,
            self.iteration_count,
            self.prompt_evolution,
        )
    }

    // Parameters

    /// Live baseline, without step locks.
    pub fn params(&self) -> &LaneParams {
        &self.params
    }

    /// Baseline with the current step's locks merged over it.
    pub fn effective_params(&self) -> LaneParams {
        match self.grid.active_locks() {
            Some(locks) if locks.has_lock() => effective_params(&self.params, locks, &self.cascade),
            _ => self.params.clone(),
        }
    }

    /// Set one baseline parameter. Macro parameters go through the cascade.
    pub fn set_param(&mut self, id: ParamId, value: f32) {
        match id.as_macro() {
            Some(kind) => self.set_macro(kind, value),
            None => self.params.set(id, value),
        }
    }

    /// Replace the whole baseline (scene recall). Values are clamped.
    pub fn set_params(&mut self, params: LaneParams) {
        self.params = params;
        self.params.sanitize();
    }

    pub fn set_steps(&mut self, steps: u32) {
        self.params.set_steps(steps);
    }

    pub fn set_infer_method(&mut self, method: InferMethod) {
        self.params.infer_method = method;
    }

    pub fn set_excitation_mode(&mut self, mode: ExcitationMode) {
        self.params.excitation_mode = mode;
    }

    pub fn set_drum_voice(&mut self, voice: DrumVoice) {
        self.params.drum_voice = voice;
    }

    // Macros

    pub fn set_macro(&mut self, kind: MacroKind, value: f32) {
        self.macros
            .set(kind, value, &self.cascade, &mut self.params);
    }

    /// Suppress cascades until [`end_macro_drag`](Self::end_macro_drag).
    pub fn begin_macro_drag(&mut self) {
        self.macros.begin_drag();
    }

    pub fn end_macro_drag(&mut self) {
        self.macros.end_drag(&self.cascade, &mut self.params);
    }

    pub fn is_dragging_macro(&self) -> bool {
        self.macros.is_suppressed()
    }

    pub fn cascade_count(&self) -> u64 {
        self.macros.cascade_count()
    }

    pub fn cascade(&self) -> &MacroCascade {
        &self.cascade
    }

    pub fn set_cascade(&mut self, cascade: MacroCascade) {
        self.cascade = cascade;
    }

    // Sequencer

    pub fn grid(&self) -> &StepGrid {
        &self.grid
    }

    /// Mutable grid access. Changes to advance mode or tempo are picked up
    /// (and the step clock resynchronized) on the next tick.
    pub fn grid_mut(&mut self) -> &mut StepGrid {
        &mut self.grid
    }

    // Routing and mixer

    pub fn feedback_source(&self) -> Option<LaneId> {
        self.feedback_source
    }

    /// Feed from another lane's prior output. Pointing a lane at itself is
    /// the same as `None`.
    pub fn set_feedback_source(&mut self, source: Option<LaneId>) {
        self.feedback_source = source.filter(|&s| s != self.id);
    }

    pub fn mute(&self) -> bool {
        self.mute
    }

    pub fn solo(&self) -> bool {
        self.solo
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = if volume.is_nan() {
            0.0
        } else {
            volume.clamp(0.0, 1.0)
        };
    }

    /// Effective mute after solo resolution.
    pub fn is_audible(&self) -> bool {
        self.audible
    }

    pub(crate) fn set_mute(&mut self, mute: bool) {
        self.mute = mute;
    }

    pub(crate) fn set_solo(&mut self, solo: bool) {
        self.solo = solo;
    }

    pub(crate) fn set_audible(&mut self, audible: bool) {
        self.audible = audible;
    }

    // Recursion state

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_inferring(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn in_flight(&self) -> Option<Ticket> {
        self.in_flight
    }

    pub fn status(&self) -> &LaneStatus {
        &self.status
    }

    pub fn iteration_count(&self) -> u64 {
        self.iteration_count
    }

    pub fn rms(&self) -> f32 {
        self.rms
    }

    /// Live output of the most recent completed iteration.
    pub fn output(&self) -> &[f32] {
        &self.output
    }

    pub fn output_buffer(&self) -> SharedBuffer {
        Arc::clone(&self.output)
    }

    /// Output used for mixing: the recalled archive entry, or the live buffer.
    pub fn effective_output(&self) -> &[f32] {
        self.recall
            .and_then(|i| self.archive.get(i))
            .map(|b| b.as_slice())
            .unwrap_or(&self.output)
    }

    pub fn archive_len(&self) -> usize {
        self.archive.len()
    }

    /// Archive entry `index`, oldest first.
    pub fn archived(&self, index: usize) -> Option<&[f32]> {
        self.archive.get(index).map(|b| b.as_slice())
    }

    /// Substitute an archived buffer for mixing, or return to live with `None`.
    /// Out-of-range indices clamp to the newest entry. The recursion keeps
    /// running on the live buffer.
    pub fn recall(&mut self, index: Option<usize>) {
        self.recall = match (index, self.archive.len()) {
            (Some(_), 0) | (None, _) => None,
            (Some(i), len) => Some(i.min(len - 1)),
        };
    }

    pub fn recall_index(&self) -> Option<usize> {
        self.recall
    }

    pub fn last_device(&self) -> Option<&str> {
        self.last_device.as_deref()
    }

    pub fn last_latency_ms(&self) -> f32 {
        self.last_latency_ms
    }

    pub fn failure_count(&self) -> u64 {
        self.failures
    }

    /// Triggers that arrived while an inference was in flight.
    pub fn collision_count(&self) -> u64 {
        self.collisions
    }

    pub fn has_pending_trigger(&self) -> bool {
        self.pending_trigger
    }

    pub fn monitor(&self) -> Arc<LaneMonitor> {
        Arc::clone(&self.monitor)
    }

    // Transitions driven by the scheduler

    pub(crate) fn start(&mut self) {
        self.running = true;
        self.primed = false;
        self.next_step_due = None;
        self.iteration_advance = false;
        if self.in_flight.is_none() {
            self.status = LaneStatus::Ready;
        }
    }

    /// Hard stop. Iteration count, output and archive are kept.
    pub(crate) fn stop(&mut self) {
        self.running = false;
        self.in_flight = None;
        self.pending_trigger = false;
        self.primed = false;
        self.next_step_due = None;
        self.iteration_advance = false;
        self.status = LaneStatus::Idle;
    }

    /// Sequencer evaluation due at `now`, if any.
    ///
    /// The first poll after a start evaluates the current step. Time mode then
    /// advances once each `step_delay()`, iteration mode once per completed
    /// iteration, manual mode only on [`tap`](Self::tap). A change of advance
    /// mode or tempo resynchronizes the clock from `now`.
    pub(crate) fn poll_step<R: Rng + ?Sized>(
        &mut self,
        now: Instant,
        rng: &mut R,
    ) -> Option<StepEvaluation> {
        if !self.running {
            return None;
        }

        let timing = (self.grid.advance_mode(), self.grid.step_bpm());
        if !self.primed {
            self.primed = true;
            self.timing = timing;
            self.iteration_advance = false;
            let eval = self.grid.evaluate_current(rng);
            self.schedule_from(now);
            self.settle_without_inference(eval);
            return Some(eval);
        }
        if timing != self.timing {
            tracing::debug!(
                "{} step clock resynced ({:?}, {} bpm)",
                self.id,
                timing.0,
                timing.1
            );
            self.timing = timing;
            self.iteration_advance = false;
            self.schedule_from(now);
        }

        match timing.0 {
            AdvanceMode::Manual => None,
            AdvanceMode::Iteration => {
                if std::mem::take(&mut self.iteration_advance) {
                    let eval = self.grid.advance(rng);
                    self.settle_without_inference(eval);
                    Some(eval)
                } else {
                    None
                }
            }
            AdvanceMode::Time => {
                let due = self.next_step_due?;
                if now < due {
                    return None;
                }
                let eval = self.grid.advance(rng);
                let delay = self.grid.step_delay();
                let next = due + delay;
                // Fell more than a step behind: restart from now rather than burst.
                self.next_step_due = Some(if next <= now { now + delay } else { next });
                Some(eval)
            }
        }
    }

    fn schedule_from(&mut self, now: Instant) {
        self.next_step_due = match self.timing.0 {
            AdvanceMode::Time => Some(now + self.grid.step_delay()),
            AdvanceMode::Manual | AdvanceMode::Iteration => None,
        };
    }

    /// Manual advance: move to the next step and evaluate it immediately.
    pub(crate) fn tap<R: Rng + ?Sized>(&mut self, rng: &mut R) -> StepEvaluation {
        self.primed = true;
        let eval = self.grid.advance(rng);
        self.settle_without_inference(eval);
        eval
    }

    /// In iteration mode, let the next cycle advance once the current step's
    /// cycle is over: completed, failed, refused, or never fired at all.
    pub(crate) fn finish_iteration_cycle(&mut self) {
        if self.running && self.grid.advance_mode() == AdvanceMode::Iteration {
            self.iteration_advance = true;
        }
    }

    fn settle_without_inference(&mut self, eval: StepEvaluation) {
        if !eval.outcome.requests_inference() {
            self.finish_iteration_cycle();
        }
    }

    /// When the next time-mode step is due.
    pub fn next_step_due(&self) -> Option<Instant> {
        self.next_step_due
    }

    /// Seed buffer for the next iteration: fresh excitation on the first
    /// iteration, otherwise the lane's prior output with the routed source
    /// blended in by the feedback amount, then noise.
    pub(crate) fn build_seed<R: RngCore>(
        &self,
        params: &LaneParams,
        snapshot: &BufferSnapshot,
        input: FeedbackInput,
        excitation: &mut dyn ExcitationSource,
        rng: &mut R,
        config: &EngineConfig,
    ) -> Vec<f32> {
        let own = snapshot.get(self.id).filter(|_| self.iteration_count > 0);
        let mut seed = match own {
            None => excitation.generate(
                params.excitation_mode,
                params.drum_voice,
                config.excitation_length,
                rng,
            ),
            Some(own) => {
                let source = match input {
                    FeedbackInput::Lane(src) => snapshot.get(src),
                    FeedbackInput::Own | FeedbackInput::Fallback { .. } => None,
                };
                let amount = jittered(params.feedback, params.feedback_jitter, rng);
                mix_input(own, source, amount)
            }
        };

        let spec = NoiseSpec::from_params(
            params.entropy,
            params.stochastic_drift,
            params.noise_density,
            config.noise_scale,
            rng,
        );
        noise::inject(&mut seed, spec, rng);
        seed
    }

    pub(crate) fn begin_inference(&mut self, ticket: Ticket) {
        self.in_flight = Some(ticket);
        self.status = LaneStatus::Inferring;
    }

    /// Trigger arrived while inferring.
    pub(crate) fn register_collision(&mut self, policy: CollisionPolicy) {
        self.collisions += 1;
        if policy == CollisionPolicy::Coalesce {
            self.pending_trigger = true;
        }
    }

    pub(crate) fn take_pending_trigger(&mut self) -> bool {
        std::mem::take(&mut self.pending_trigger)
    }

    /// Publish a completed iteration.
    pub(crate) fn complete(&mut self, audio: Vec<f32>, device: Option<String>, latency_ms: f32) {
        self.in_flight = None;
        self.rms = noise::rms(&audio);
        self.output = Arc::new(audio);
        self.iteration_count += 1;
        self.last_device = device;
        self.last_latency_ms = latency_ms;

        self.archive.push_back(Arc::clone(&self.output));
        while self.archive.len() > self.archive_capacity {
            self.archive.pop_front();
            self.recall = self.recall.map(|i| i.saturating_sub(1));
        }

        self.finish_iteration_cycle();
        self.status = if self.running {
            LaneStatus::Ready
        } else {
            LaneStatus::Idle
        };
    }

    /// The call failed. Buffer and iteration count stay as they were.
    pub(crate) fn fail(&mut self, reason: String) {
        self.in_flight = None;
        self.failures += 1;
        self.status = LaneStatus::Failed(reason);
        self.finish_iteration_cycle();
    }

    pub(crate) fn mark_unavailable(&mut self) {
        self.status = LaneStatus::Unavailable;
        self.finish_iteration_cycle();
    }

    /// Push readouts to the monitor.
    pub(crate) fn publish(&self) {
        let m = &self.monitor;
        m.iteration_count.set(self.iteration_count);
        m.rms.set(self.rms);
        m.inferring.set(self.in_flight.is_some());
        m.running.set(self.running);
        m.current_step.set(self.grid.current_step_index());
        m.chain_length.set(self.grid.chain_length());
        m.current_lock_count.set(self.grid.current_step().lock_count());
    }
}

/// Feedback amount with jitter applied: `amount × (1 ± jitter)`, clamped.
fn jittered<R: Rng + ?Sized>(amount: f32, jitter: f32, rng: &mut R) -> f32 {
    if amount <= 0.0 || jitter <= 0.0 {
        return amount;
    }
    let offset: f32 = rng.gen_range(-1.0..=1.0);
    (amount * (1.0 + jitter * offset)).clamp(0.0, 1.0)
}
