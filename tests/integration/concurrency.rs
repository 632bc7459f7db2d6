//! Concurrency integration tests
//!
//! At most one call per lane reaches the backend at a time, whatever the
//! trigger rate, and results that outlive a stop never land.

use crate::helpers::*;
use latent_resonator::prelude::*;
use std::time::Duration;

fn engine_with_policy(backend: &MockBackend, policy: CollisionPolicy) -> NeuralEngine {
    test_engine_with(
        backend,
        EngineConfig {
            collision_policy: policy,
            ..test_config()
        },
    )
}

#[test]
fn test_at_most_one_call_per_lane() {
    let backend = MockBackend::with_delay(Duration::from_millis(20));
    let mut engine = engine_with_policy(&backend, CollisionPolicy::Coalesce);
    let prompts = ["one", "two", "three"];
    for prompt in prompts {
        add_quiet_lane(&mut engine, prompt);
    }

    engine.start_processing();
    for _ in 0..20 {
        engine.trigger_all();
        engine.tick();
        std::thread::sleep(Duration::from_millis(5));
    }
    engine.await_completions(WAIT);

    for prompt in prompts {
        assert_eq!(backend.max_concurrent(prompt), 1, "{}", prompt);
    }
    assert!(engine.totals().collisions > 0);
    assert_eq!(engine.in_flight_count(), 0);
}

#[test]
fn test_drop_policy_discards_trigger() {
    let backend = MockBackend::new();
    let mut engine = engine_with_policy(&backend, CollisionPolicy::Drop);
    let lane = add_quiet_lane(&mut engine, "drop");

    backend.hold();
    engine.start_processing();
    assert_eq!(engine.tick().requests_issued, 1);
    assert!(backend.wait_in_backend(1));

    engine.tap(lane).unwrap();
    let l = engine.lane(lane).unwrap();
    assert_eq!(l.collision_count(), 1);
    assert!(!l.has_pending_trigger());

    backend.release();
    engine.await_completions(WAIT);
    assert_eq!(backend.call_count(), 1);
    assert_eq!(engine.lane(lane).unwrap().iteration_count(), 1);
}

#[test]
fn test_coalesce_policy_runs_once_after_completion() {
    let backend = MockBackend::new();
    let mut engine = engine_with_policy(&backend, CollisionPolicy::Coalesce);
    let lane = add_quiet_lane(&mut engine, "coalesce");

    backend.hold();
    engine.start_processing();
    engine.tick();
    assert!(backend.wait_in_backend(1));

    // Several triggers while busy collapse into one.
    engine.tap(lane).unwrap();
    engine.tap(lane).unwrap();
    let l = engine.lane(lane).unwrap();
    assert_eq!(l.collision_count(), 2);
    assert!(l.has_pending_trigger());

    backend.release();
    engine.await_completions(WAIT);
    assert_eq!(backend.call_count(), 2);
    let l = engine.lane(lane).unwrap();
    assert_eq!(l.iteration_count(), 2);
    assert!(!l.has_pending_trigger());
}

#[test]
fn test_cancelled_call_blocks_until_it_returns() {
    let backend = MockBackend::new();
    let mut engine = engine_with_policy(&backend, CollisionPolicy::Coalesce);
    let lane = add_quiet_lane(&mut engine, "restart");

    backend.hold();
    engine.start_processing();
    engine.tick();
    assert!(backend.wait_in_backend(1));

    engine.stop_processing();
    engine.start_processing();
    // The primed step finds the cancelled call still running.
    let report = engine.tick();
    assert_eq!(report.requests_issued, 0);
    assert_eq!(report.collisions, 1);
    assert_eq!(engine.in_flight_count(), 1);
    assert!(engine.lane(lane).unwrap().has_pending_trigger());

    backend.release();
    let report = engine.await_completions(WAIT);
    assert_eq!(report.stale_discarded, 1);
    assert_eq!(report.requests_issued, 1);
    assert_eq!(report.completions_applied, 1);

    assert_eq!(backend.call_count(), 2);
    assert_eq!(backend.max_concurrent("restart"), 1);
    assert_eq!(engine.lane(lane).unwrap().iteration_count(), 1);
}

#[test]
fn test_full_queue_drops_request() {
    let backend = MockBackend::new();
    let mut engine = test_engine_with(
        &backend,
        EngineConfig {
            inference_workers: 1,
            request_queue: 1,
            ..test_config()
        },
    );
    let busy = add_quiet_lane(&mut engine, "busy");
    let queued = add_quiet_lane(&mut engine, "queued");
    let dropped = add_quiet_lane(&mut engine, "dropped");
    for id in [queued, dropped] {
        engine.set_step_trig(id, 0, TrigType::Skip).unwrap();
    }

    backend.hold();
    engine.start_processing();
    engine.tick();
    assert!(backend.wait_in_backend(1));

    // The worker is parked on `busy`; one more fits in the queue.
    engine.tap(queued).unwrap();
    engine.tap(dropped).unwrap();
    assert_eq!(engine.totals().dropped, 1);
    assert!(engine.lane(queued).unwrap().is_inferring());
    let l = engine.lane(dropped).unwrap();
    assert!(!l.is_inferring());
    assert!(matches!(l.status(), LaneStatus::Failed(_)));

    backend.release();
    engine.await_completions(WAIT);
    assert_eq!(engine.lane(busy).unwrap().iteration_count(), 1);
    assert_eq!(engine.lane(queued).unwrap().iteration_count(), 1);
    assert_eq!(engine.lane(dropped).unwrap().iteration_count(), 0);
}

#[test]
fn test_scheduler_drives_time_lanes() {
    let backend = MockBackend::new();
    let engine = test_engine_with(
        &backend,
        EngineConfig {
            tick_interval_ms: 2,
            ..test_config()
        },
    );
    let handle = EngineHandle::new(engine);
    let lane = handle.with(|e| {
        let id = add_quiet_lane(e, "clocked");
        e.set_advance_mode(id, AdvanceMode::Time)?;
        e.set_step_bpm(id, 999.0)?;
        e.start_processing();
        Ok::<_, Error>(id)
    })
    .unwrap();
    let monitor = handle.monitor(lane).unwrap();

    handle.start_scheduler().unwrap();
    assert!(wait_until(|| monitor.iteration_count() >= 2));
    handle.stop_scheduler();

    assert!(!handle.is_scheduling());
    assert_eq!(backend.max_concurrent("clocked"), 1);
    assert!(monitor.is_running());
}
