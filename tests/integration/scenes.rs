//! Scene and crossfader integration tests

use crate::helpers::*;
use approx::assert_relative_eq;
use latent_resonator::prelude::*;
use latent_resonator::SCENE_SLOTS;
use std::time::{Duration, Instant};

/// One lane with feedback 0.2 in slot 0 and 0.8 in slot 1.
fn engine_with_two_scenes(backend: &MockBackend, glide: Duration) -> (NeuralEngine, LaneId) {
    let mut engine = test_engine(backend);
    let lane = add_quiet_lane(&mut engine, "scene");

    engine.set_param(lane, ParamId::Feedback, 0.2).unwrap();
    engine.capture_scene(0, glide).unwrap();
    engine.set_param(lane, ParamId::Feedback, 0.8).unwrap();
    engine.capture_scene(1, glide).unwrap();
    (engine, lane)
}

fn feedback(engine: &NeuralEngine, lane: LaneId) -> f32 {
    engine.lane(lane).unwrap().params().feedback
}

#[test]
fn test_crossfader_blends_scenes() {
    let backend = MockBackend::new();
    let (mut engine, lane) = engine_with_two_scenes(&backend, Duration::ZERO);

    engine.load_scene_a(0).unwrap();
    assert_eq!(engine.crossfader_position(), 0.0);
    assert_relative_eq!(feedback(&engine, lane), 0.2);

    engine.load_scene_b(1).unwrap();
    assert_eq!(engine.crossfader_position(), 1.0);
    assert_relative_eq!(feedback(&engine, lane), 0.8);

    engine.set_crossfader(0.5);
    assert_relative_eq!(feedback(&engine, lane), 0.5, epsilon = 1e-6);

    engine.set_crossfader(0.0);
    assert_relative_eq!(feedback(&engine, lane), 0.2, epsilon = 1e-6);

    engine.set_crossfader(1.0);
    assert_relative_eq!(feedback(&engine, lane), 0.8, epsilon = 1e-6);

    engine.set_crossfader(7.0);
    assert_eq!(engine.crossfader_position(), 1.0);
    assert_eq!(engine.crossfader_readout().get(), 1.0);
}

#[test]
fn test_apply_scene_is_instant() {
    let backend = MockBackend::new();
    let (mut engine, lane) = engine_with_two_scenes(&backend, Duration::from_secs(10));

    engine.apply_scene(0).unwrap();
    assert_relative_eq!(feedback(&engine, lane), 0.2);
    assert!(!engine.is_scene_gliding());
}

#[test]
fn test_lanes_outside_scene_are_untouched() {
    let backend = MockBackend::new();
    let (mut engine, lane) = engine_with_two_scenes(&backend, Duration::ZERO);
    let late = add_quiet_lane(&mut engine, "late");
    engine.set_param(late, ParamId::Feedback, 0.33).unwrap();

    engine.apply_scene(0).unwrap();
    assert_relative_eq!(feedback(&engine, lane), 0.2);
    assert_relative_eq!(feedback(&engine, late), 0.33);
}

#[test]
fn test_scene_load_glides() {
    let backend = MockBackend::new();
    let (mut engine, lane) = engine_with_two_scenes(&backend, Duration::from_secs(1));
    engine.apply_scene(0).unwrap();

    let t0 = Instant::now();
    engine.tick_at(t0);
    engine.load_scene_b(1).unwrap();
    assert!(engine.is_scene_gliding());
    // Nothing moves until a cycle runs.
    assert_relative_eq!(feedback(&engine, lane), 0.2);

    engine.tick_at(t0 + Duration::from_millis(500));
    assert_relative_eq!(feedback(&engine, lane), 0.5, epsilon = 1e-4);
    assert!(engine.is_scene_gliding());

    engine.tick_at(t0 + Duration::from_millis(1500));
    assert_relative_eq!(feedback(&engine, lane), 0.8, epsilon = 1e-6);
    assert!(!engine.is_scene_gliding());
}

#[test]
fn test_crossfader_move_cancels_glide() {
    let backend = MockBackend::new();
    let (mut engine, lane) = engine_with_two_scenes(&backend, Duration::from_secs(1));
    engine.apply_scene(0).unwrap();

    let t0 = Instant::now();
    engine.tick_at(t0);
    engine.load_scene_a(0).unwrap();
    engine.load_scene_b(1).unwrap();
    assert!(engine.is_scene_gliding());

    engine.set_crossfader(0.25);
    assert!(!engine.is_scene_gliding());
    assert_relative_eq!(feedback(&engine, lane), 0.35, epsilon = 1e-6);

    engine.tick_at(t0 + Duration::from_secs(2));
    assert_relative_eq!(feedback(&engine, lane), 0.35, epsilon = 1e-6);
}

#[test]
fn test_scene_slots_are_bounded() {
    let backend = MockBackend::new();
    let mut engine = test_engine(&backend);
    add_quiet_lane(&mut engine, "a");

    assert!(engine.capture_scene(SCENE_SLOTS, Duration::ZERO).is_err());
    assert!(engine.apply_scene(3).is_err());
    assert!(engine.load_scene_a(3).is_err());

    engine.capture_scene(3, Duration::ZERO).unwrap();
    assert!(engine.scenes().is_occupied(3));
    engine.clear_scene(3).unwrap();
    assert!(!engine.scenes().is_occupied(3));
}

#[test]
fn test_capture_overwrites_slot() {
    let backend = MockBackend::new();
    let (mut engine, lane) = engine_with_two_scenes(&backend, Duration::ZERO);

    engine.set_param(lane, ParamId::Feedback, 0.6).unwrap();
    engine.capture_scene(0, Duration::ZERO).unwrap();
    engine.set_param(lane, ParamId::Feedback, 0.0).unwrap();
    engine.apply_scene(0).unwrap();
    assert_relative_eq!(feedback(&engine, lane), 0.6);
}
