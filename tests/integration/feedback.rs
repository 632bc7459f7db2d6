//! Feedback routing integration tests
//!
//! Seeds are checked through the audio the mock backend receives: the first
//! iteration gets fresh excitation, later ones the prior output blended with
//! the routed source.

use crate::helpers::tolerances::FLOAT_EPSILON;
use crate::helpers::*;
use latent_resonator::prelude::*;
use latent_resonator::FeedbackInput;

/// Sine lanes start at 0.2, noise lanes at 0.8.
fn two_level_engine(backend: &MockBackend) -> NeuralEngine {
    NeuralEngine::builder()
        .config(test_config())
        .backend(backend.clone())
        .excitation(
            |mode: ExcitationMode, _: DrumVoice, len: usize, _: &mut dyn rand::RngCore| {
                let level = match mode {
                    ExcitationMode::Sine => 0.2f32,
                    _ => 0.8,
                };
                vec![level; len]
            },
        )
        .seed(11)
        .build()
        .unwrap()
}

fn lane_with(engine: &mut NeuralEngine, prompt: &str, mode: ExcitationMode) -> LaneId {
    let mut preset = quiet_preset(prompt);
    preset.params.excitation_mode = mode;
    preset.chain_length = 4;
    engine.add_lane(&preset).unwrap()
}

fn last_seed(backend: &MockBackend, prompt: &str) -> Vec<f32> {
    backend
        .calls()
        .into_iter()
        .filter(|c| c.prompt == prompt)
        .last()
        .map(|c| c.audio)
        .unwrap_or_default()
}

fn all_near(buf: &[f32], value: f32) -> bool {
    !buf.is_empty() && buf.iter().all(|&s| (s - value).abs() < FLOAT_EPSILON)
}

#[test]
fn test_first_iteration_uses_excitation() {
    let backend = MockBackend::new();
    let mut engine = two_level_engine(&backend);
    let a = lane_with(&mut engine, "a", ExcitationMode::Sine);
    let b = lane_with(&mut engine, "b", ExcitationMode::Noise);
    // Routing is ignored until a lane has its own output.
    engine.set_feedback_source(b, Some(a)).unwrap();

    engine.start_processing();
    engine.tick();
    engine.await_completions(WAIT);

    assert!(all_near(&last_seed(&backend, "a"), 0.2));
    assert!(all_near(&last_seed(&backend, "b"), 0.8));
    assert_eq!(last_seed(&backend, "a").len(), TEST_BUFFER_SIZE);
}

#[test]
fn test_self_feedback_recurses_on_own_output() {
    let backend = MockBackend::new();
    let mut engine = two_level_engine(&backend);
    let a = lane_with(&mut engine, "a", ExcitationMode::Sine);

    engine.start_processing();
    engine.tick();
    engine.await_completions(WAIT);
    engine.tap(a).unwrap();
    engine.await_completions(WAIT);

    assert_eq!(backend.calls_for("a"), 2);
    assert!(all_near(&last_seed(&backend, "a"), 0.2));
}

#[test]
fn test_cross_feedback_blends_source() {
    let backend = MockBackend::new();
    let mut engine = two_level_engine(&backend);
    let a = lane_with(&mut engine, "a", ExcitationMode::Sine);
    let b = lane_with(&mut engine, "b", ExcitationMode::Noise);

    engine.start_processing();
    engine.tick();
    engine.await_completions(WAIT);

    engine.set_feedback_source(b, Some(a)).unwrap();
    engine.set_param(b, ParamId::Feedback, 0.5).unwrap();
    engine.tap(b).unwrap();
    engine.await_completions(WAIT);
    // 0.8 * 0.5 + 0.2 * 0.5
    assert!(all_near(&last_seed(&backend, "b"), 0.5));

    engine.set_param(b, ParamId::Feedback, 1.0).unwrap();
    engine.tap(b).unwrap();
    engine.await_completions(WAIT);
    assert!(all_near(&last_seed(&backend, "b"), 0.2));

    assert_eq!(engine.routing().edges().collect::<Vec<_>>(), vec![(a, b)]);
}

#[test]
fn test_mutual_feedback_runs_without_deadlock() {
    let backend = MockBackend::new();
    let mut engine = two_level_engine(&backend);
    let a = lane_with(&mut engine, "a", ExcitationMode::Sine);
    let b = lane_with(&mut engine, "b", ExcitationMode::Noise);
    engine.set_feedback_source(a, Some(b)).unwrap();
    engine.set_feedback_source(b, Some(a)).unwrap();
    engine.set_param(a, ParamId::Feedback, 1.0).unwrap();
    engine.set_param(b, ParamId::Feedback, 1.0).unwrap();

    engine.start_processing();
    engine.tick();
    engine.await_completions(WAIT);

    // Both read the other's buffer from before the cycle: they swap.
    engine.trigger_all();
    engine.tick();
    engine.await_completions(WAIT);
    assert!(all_near(&last_seed(&backend, "a"), 0.8));
    assert!(all_near(&last_seed(&backend, "b"), 0.2));

    for _ in 0..5 {
        engine.trigger_all();
        engine.tick();
        engine.await_completions(WAIT);
    }
    assert_eq!(engine.lane(a).unwrap().iteration_count(), 7);
    assert_eq!(engine.lane(b).unwrap().iteration_count(), 7);
    assert!(backend.max_concurrent("a") <= 1);
    assert!(backend.max_concurrent("b") <= 1);
}

#[test]
fn test_removed_source_falls_back_to_self() {
    let backend = MockBackend::new();
    let mut engine = two_level_engine(&backend);
    let a = lane_with(&mut engine, "a", ExcitationMode::Sine);
    let b = lane_with(&mut engine, "b", ExcitationMode::Noise);
    engine.set_feedback_source(b, Some(a)).unwrap();
    engine.set_param(b, ParamId::Feedback, 1.0).unwrap();

    engine.start_processing();
    engine.tick();
    engine.await_completions(WAIT);

    engine.remove_lane(a).unwrap();
    assert_eq!(
        engine.routing().input(b),
        FeedbackInput::Fallback { missing: a }
    );

    engine.tap(b).unwrap();
    engine.await_completions(WAIT);
    assert!(all_near(&last_seed(&backend, "b"), 0.8));
    assert!(engine.totals().fallbacks >= 1);
    // The stored reference is left alone.
    assert_eq!(engine.lane(b).unwrap().feedback_source(), Some(a));
}

#[test]
fn test_feedback_source_validation() {
    let backend = MockBackend::new();
    let mut engine = two_level_engine(&backend);
    let a = lane_with(&mut engine, "a", ExcitationMode::Sine);
    let b = lane_with(&mut engine, "b", ExcitationMode::Noise);

    engine.remove_lane(b).unwrap();
    assert!(matches!(
        engine.set_feedback_source(a, Some(b)),
        Err(Error::LaneNotFound(id)) if id == b
    ));

    engine.set_feedback_source(a, Some(a)).unwrap();
    assert_eq!(engine.lane(a).unwrap().feedback_source(), None);
}

#[test]
fn test_source_without_output_is_ignored() {
    let backend = MockBackend::new();
    let mut engine = two_level_engine(&backend);
    let a = lane_with(&mut engine, "a", ExcitationMode::Sine);
    let b = lane_with(&mut engine, "b", ExcitationMode::Noise);
    engine.set_step_trig(a, 0, TrigType::Skip).unwrap();

    engine.start_processing();
    engine.tick();
    engine.await_completions(WAIT);

    // a has never produced anything, so b keeps feeding on itself.
    engine.set_feedback_source(b, Some(a)).unwrap();
    engine.set_param(b, ParamId::Feedback, 1.0).unwrap();
    engine.tap(b).unwrap();
    engine.await_completions(WAIT);
    assert!(all_near(&last_seed(&backend, "b"), 0.8));
}

#[test]
fn test_noise_is_added_to_seed() {
    let backend = MockBackend::new();
    let mut engine = two_level_engine(&backend);
    let a = lane_with(&mut engine, "a", ExcitationMode::Sine);
    engine.set_param(a, ParamId::Entropy, 1.0).unwrap();
    engine.set_param(a, ParamId::NoiseDensity, 1.0).unwrap();

    engine.start_processing();
    engine.tick();
    engine.await_completions(WAIT);

    let seed = last_seed(&backend, "a");
    assert!(!all_near(&seed, 0.2));
    let mean = seed.iter().sum::<f32>() / seed.len() as f32;
    assert!((mean - 0.2).abs() < 0.1);
}

#[test]
fn test_prompt_evolution_reaches_backend() {
    let backend = MockBackend::new();
    let mut engine = two_level_engine(&backend);
    let mut preset = quiet_preset("drone");
    preset.prompt_evolution = true;
    let lane = engine.add_lane(&preset).unwrap();

    engine.start_processing();
    engine.tick();
    engine.await_completions(WAIT);
    engine.tap(lane).unwrap();
    engine.await_completions(WAIT);

    let prompts: Vec<_> = backend.calls().into_iter().map(|c| c.prompt).collect();
    assert_eq!(prompts, vec!["drone, metallic", "drone, granular"]);
}
