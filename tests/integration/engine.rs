//! Engine integration tests
//!
//! Construction, lane management, bridge gating, failures, panic stop and
//! the mixer.

use crate::helpers::tolerances::FLOAT_EPSILON;
use crate::helpers::*;
use latent_resonator::prelude::*;
use latent_resonator::SharedBridgeStatus;

fn passthrough_preset(prompt: &str) -> LanePreset {
    let mut preset = quiet_preset(prompt);
    preset.params.set(ParamId::DenoiseStrength, 0.0);
    preset
}

#[test]
fn test_builder_defaults() {
    let engine = NeuralEngine::builder().build().unwrap();

    assert_eq!(engine.bridge_status(), BridgeStatus::ModelLoaded);
    assert_eq!(engine.lane_count(), 0);
    assert!(!engine.is_processing());
    assert_eq!(engine.crossfader_position(), 0.0);
}

#[test]
fn test_invalid_config_is_rejected() {
    let result = NeuralEngine::builder().inference_workers(0).build();
    assert!(matches!(result, Err(Error::Core(_))));
}

#[test]
fn test_lane_limit() {
    let backend = MockBackend::new();
    let mut engine = test_engine_with(
        &backend,
        EngineConfig {
            max_lanes: 2,
            ..test_config()
        },
    );

    engine.add_default_lane().unwrap();
    engine.add_default_lane().unwrap();
    assert!(matches!(
        engine.add_default_lane(),
        Err(Error::LaneLimit(2))
    ));
    assert_eq!(engine.lane_count(), 2);
}

#[test]
fn test_default_lane_uses_configured_tempo() {
    let backend = MockBackend::new();
    let mut engine = test_engine_with(
        &backend,
        EngineConfig {
            default_step_bpm: 93.0,
            ..test_config()
        },
    );
    let lane = engine.add_default_lane().unwrap();
    assert_eq!(engine.lane(lane).unwrap().grid().step_bpm(), 93.0);
}

#[test]
fn test_remove_lane() {
    let backend = MockBackend::new();
    let mut engine = test_engine(&backend);
    let a = add_quiet_lane(&mut engine, "a");
    let b = add_quiet_lane(&mut engine, "b");

    engine.remove_lane(a).unwrap();
    assert_eq!(engine.lane_ids(), vec![b]);
    assert!(engine.lane(a).is_none());
    assert!(matches!(engine.remove_lane(a), Err(Error::LaneNotFound(id)) if id == a));
    assert!(matches!(
        engine.set_param(a, ParamId::Feedback, 0.3),
        Err(Error::LaneNotFound(_))
    ));
}

#[test]
fn test_lane_ids_are_never_reused() {
    let backend = MockBackend::new();
    let mut engine = test_engine(&backend);
    let a = add_quiet_lane(&mut engine, "a");
    engine.remove_lane(a).unwrap();
    let b = add_quiet_lane(&mut engine, "b");
    assert_ne!(a, b);
}

#[test]
fn test_first_cycle_issues_one_request() {
    let backend = MockBackend::new();
    let mut engine = test_engine(&backend);
    let lane = add_quiet_lane(&mut engine, "a");

    engine.start_processing();
    let report = engine.tick();
    assert_eq!(report.steps_evaluated, 1);
    assert_eq!(report.requests_issued, 1);
    assert!(engine.lane(lane).unwrap().is_inferring());

    let done = engine.await_completions(WAIT);
    assert_eq!(done.completions_applied, 1);

    let lane = engine.lane(lane).unwrap();
    assert_eq!(lane.iteration_count(), 1);
    assert_eq!(lane.output().len(), TEST_BUFFER_SIZE);
    assert_eq!(lane.archive_len(), 1);
    assert_eq!(lane.last_device(), Some("mock"));
    assert_eq!(lane.status(), &LaneStatus::Ready);
    assert_eq!(backend.call_count(), 1);
}

#[test]
fn test_nothing_runs_while_stopped() {
    let backend = MockBackend::new();
    let mut engine = test_engine(&backend);
    let lane = add_quiet_lane(&mut engine, "a");

    let report = engine.tick();
    assert!(report.is_idle());
    engine.tap(lane).unwrap();
    engine.await_completions(WAIT);
    assert_eq!(backend.call_count(), 0);
    assert_eq!(engine.lane(lane).unwrap().iteration_count(), 0);
}

#[test]
fn test_passthrough_skips_backend_even_when_disconnected() {
    let backend = MockBackend::new();
    let mut engine = NeuralEngine::builder()
        .config(test_config())
        .backend(backend.clone())
        .bridge_status(SharedBridgeStatus::new(BridgeStatus::Disconnected))
        .excitation(constant_excitation(0.5))
        .seed(1)
        .build()
        .unwrap();
    let lane = engine.add_lane(&passthrough_preset("pt")).unwrap();

    engine.start_processing();
    let report = engine.tick();
    assert_eq!(report.passthrough, 1);
    assert_eq!(report.requests_issued, 0);
    assert_eq!(report.unavailable, 0);
    assert_eq!(backend.call_count(), 0);

    let lane = engine.lane(lane).unwrap();
    assert_eq!(lane.iteration_count(), 1);
    assert!(lane
        .output()
        .iter()
        .all(|&s| (s - 0.5).abs() < FLOAT_EPSILON));
}

#[test]
fn test_bridge_gates_inference() {
    let backend = MockBackend::new();
    let bridge = SharedBridgeStatus::new(BridgeStatus::Connected);
    let mut engine = NeuralEngine::builder()
        .config(test_config())
        .backend(backend.clone())
        .bridge_status(bridge.clone())
        .excitation(constant_excitation(0.5))
        .seed(2)
        .build()
        .unwrap();
    let lane = add_quiet_lane(&mut engine, "gated");

    engine.start_processing();
    let report = engine.tick();
    assert_eq!(report.unavailable, 1);
    assert_eq!(backend.call_count(), 0);
    assert_eq!(engine.lane(lane).unwrap().status(), &LaneStatus::Unavailable);
    assert_eq!(engine.lane(lane).unwrap().iteration_count(), 0);

    bridge.set(BridgeStatus::ModelLoaded);
    engine.tap(lane).unwrap();
    engine.await_completions(WAIT);
    assert_eq!(backend.call_count(), 1);
    assert_eq!(engine.lane(lane).unwrap().iteration_count(), 1);
}

#[test]
fn test_failed_call_keeps_buffer() {
    let backend = MockBackend::new();
    let mut engine = test_engine(&backend);
    let lane = add_quiet_lane(&mut engine, "a");

    engine.start_processing();
    engine.tick();
    engine.await_completions(WAIT);
    let before = engine.lane(lane).unwrap().output().to_vec();

    backend.set_failing(true);
    engine.tap(lane).unwrap();
    let report = engine.await_completions(WAIT);
    assert_eq!(report.failures, 1);

    let l = engine.lane(lane).unwrap();
    assert_eq!(l.iteration_count(), 1);
    assert_eq!(l.failure_count(), 1);
    assert_eq!(l.output(), &before[..]);
    assert!(matches!(l.status(), LaneStatus::Failed(_)));
    assert!(l.is_running());

    // Next trigger recovers.
    backend.set_failing(false);
    engine.tap(lane).unwrap();
    engine.await_completions(WAIT);
    assert_eq!(engine.lane(lane).unwrap().iteration_count(), 2);
}

#[test]
fn test_panic_stop_discards_in_flight_results() {
    let backend = MockBackend::new();
    let mut engine = test_engine(&backend);
    let lane = add_quiet_lane(&mut engine, "a");

    engine.start_processing();
    engine.tick();
    engine.await_completions(WAIT);

    backend.hold();
    engine.tap(lane).unwrap();
    assert!(backend.wait_in_backend(1));

    engine.stop_processing();
    {
        let l = engine.lane(lane).unwrap();
        assert!(!l.is_running());
        assert!(!l.is_inferring());
        assert_eq!(l.iteration_count(), 1);
        assert_eq!(l.archive_len(), 1);
    }
    assert_eq!(engine.in_flight_count(), 1);

    backend.release();
    let report = engine.await_completions(WAIT);
    assert_eq!(report.stale_discarded, 1);
    assert_eq!(report.completions_applied, 0);
    assert_eq!(engine.in_flight_count(), 0);

    let l = engine.lane(lane).unwrap();
    assert_eq!(l.iteration_count(), 1);
    assert_eq!(l.archive_len(), 1);
    assert_eq!(l.status(), &LaneStatus::Idle);
}

#[test]
fn test_toggle_processing() {
    let backend = MockBackend::new();
    let mut engine = test_engine(&backend);
    let lane = add_quiet_lane(&mut engine, "a");

    assert!(engine.toggle_processing());
    assert!(engine.lane(lane).unwrap().is_running());
    assert!(!engine.toggle_processing());
    assert!(!engine.lane(lane).unwrap().is_running());
}

#[test]
fn test_lane_added_while_processing_starts_running() {
    let backend = MockBackend::new();
    let mut engine = test_engine(&backend);
    engine.start_processing();
    let lane = add_quiet_lane(&mut engine, "late");
    assert!(engine.lane(lane).unwrap().is_running());
}

#[test]
fn test_master_mix_follows_mute_and_solo() {
    let backend = MockBackend::new();
    let mut engine = test_engine(&backend);
    let a = engine.add_lane(&passthrough_preset("a")).unwrap();
    let b = engine.add_lane(&passthrough_preset("b")).unwrap();
    engine.set_volume(b, 0.5).unwrap();

    engine.start_processing();
    engine.tick();

    let mix = engine.master_mix(4);
    assert!(mix.iter().all(|&s| (s - 0.75).abs() < FLOAT_EPSILON));

    engine.set_solo(b, true).unwrap();
    assert!(!engine.lane(a).unwrap().is_audible());
    assert!(engine
        .master_mix(4)
        .iter()
        .all(|&s| (s - 0.25).abs() < FLOAT_EPSILON));

    // Solo wins over mute.
    engine.set_mute(b, true).unwrap();
    assert!(engine.lane(b).unwrap().is_audible());

    engine.set_solo(b, false).unwrap();
    assert!(!engine.lane(b).unwrap().is_audible());
    assert!(engine
        .master_mix(4)
        .iter()
        .all(|&s| (s - 0.5).abs() < FLOAT_EPSILON));

    // Past the end of the lane buffers the mix is silent.
    let long = engine.master_mix(TEST_BUFFER_SIZE * 2);
    assert_eq!(long.len(), TEST_BUFFER_SIZE * 2);
    assert_eq!(long[TEST_BUFFER_SIZE], 0.0);
}

#[test]
fn test_volume_is_clamped() {
    let backend = MockBackend::new();
    let mut engine = test_engine(&backend);
    let lane = add_quiet_lane(&mut engine, "a");
    engine.set_volume(lane, 3.0).unwrap();
    assert_eq!(engine.lane(lane).unwrap().volume(), 1.0);
    engine.set_volume(lane, -1.0).unwrap();
    assert_eq!(engine.lane(lane).unwrap().volume(), 0.0);
}

#[test]
fn test_recall_substitutes_archived_output() {
    let backend = MockBackend::new();
    let mut engine = test_engine(&backend);
    let lane = engine.add_lane(&passthrough_preset("a")).unwrap();

    engine.start_processing();
    engine.tick();
    // Noise makes the second iteration differ from the first.
    engine.set_param(lane, ParamId::Entropy, 1.0).unwrap();
    engine.set_param(lane, ParamId::NoiseDensity, 1.0).unwrap();
    engine.tap(lane).unwrap();

    let l = engine.lane_mut(lane).unwrap();
    assert_eq!(l.archive_len(), 2);
    assert_ne!(l.archived(0), l.archived(1));

    l.recall(Some(0));
    assert_eq!(l.recall_index(), Some(0));
    assert_eq!(l.effective_output(), l.archived(0).unwrap());

    l.recall(Some(99));
    assert_eq!(l.recall_index(), Some(1));

    l.recall(None);
    assert_eq!(l.effective_output(), l.output());
}

#[test]
fn test_monitor_tracks_lane() {
    let backend = MockBackend::new();
    let mut engine = test_engine(&backend);
    let lane = add_quiet_lane(&mut engine, "a");
    let monitor = engine.lane_monitor(lane).unwrap();
    assert_eq!(monitor.chain_length(), 4);

    engine.start_processing();
    engine.tick();
    assert!(monitor.is_running());
    assert!(monitor.is_inferring());

    engine.await_completions(WAIT);
    assert_eq!(monitor.iteration_count(), 1);
    assert!(!monitor.is_inferring());
    assert!(monitor.rms() > 0.0);
}

#[test]
fn test_totals_accumulate() {
    let backend = MockBackend::new();
    let mut engine = test_engine(&backend);
    add_quiet_lane(&mut engine, "a");
    add_quiet_lane(&mut engine, "b");

    engine.start_processing();
    engine.tick();
    engine.await_completions(WAIT);

    assert_eq!(engine.totals().requests_issued, 2);
    assert_eq!(engine.totals().completions_applied, 2);
    assert_eq!(engine.cycle_count(), 1);
}
