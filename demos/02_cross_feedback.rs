//! # 02 - Cross Feedback
//!
//! Two lanes feeding each other, a Time-mode lane with step locks, and a
//! crossfade between two captured scenes.
//!
//! **Concepts:** Feedback routing, step locks, scenes, crossfader, ticking by hand
//!
//! ```bash
//! cargo run --example 02_cross_feedback
//! ```

use latent_resonator::prelude::*;
use std::time::Duration;

fn main() -> latent_resonator::Result<()> {
    tracing_subscriber::fmt::init();

    let mut engine = NeuralEngine::builder().seed(7).build()?;

    let drone = engine.add_lane(&LanePreset::drone())?;
    let grains = engine.add_lane(&LanePreset::granular())?;

    // Each lane hears the other.
    engine.set_feedback_source(drone, Some(grains))?;
    engine.set_feedback_source(grains, Some(drone))?;
    engine.set_param(drone, ParamId::Feedback, 0.7)?;
    engine.set_param(grains, ParamId::Feedback, 0.4)?;

    // Accent every fourth grain step.
    for step in (0..8).step_by(4) {
        engine.set_step_lock(
            grains,
            step,
            LockValue::Param(ParamId::DenoiseStrength, 0.9),
        )?;
    }
    engine.set_step_probability(grains, 2, Some(0.5))?;

    engine.capture_scene(0, Duration::from_millis(400))?;
    engine.set_macro(drone, MacroKind::Warmth, 1.0)?;
    engine.set_macro(grains, MacroKind::Chaos, 0.8)?;
    engine.capture_scene(1, Duration::from_millis(400))?;

    engine.load_scene_a(0)?;
    engine.start_processing();

    for cycle in 0..60 {
        if cycle == 20 {
            println!("-> gliding to scene B");
            engine.load_scene_b(1)?;
        }
        if cycle == 40 {
            println!("-> crossfader at 0.5");
            engine.set_crossfader(0.5);
        }

        let report = engine.tick();
        engine.await_completions(Duration::from_millis(50));

        if cycle % 10 == 0 {
            for id in engine.lane_ids() {
                if let Some(lane) = engine.lane(id) {
                    println!(
                        "cycle {:>2} {:<10} iter {:>3} step {:>2} fb {:.2} ({} requests)",
                        cycle,
                        lane.name(),
                        lane.iteration_count(),
                        lane.grid().current_step_index(),
                        lane.params().feedback,
                        report.requests_issued
                    );
                }
            }
        }
        std::thread::sleep(Duration::from_millis(20));
    }

    engine.stop_processing();
    println!("totals: {:?}", engine.totals());
    println!("edges: {:?}", engine.routing().edges().collect::<Vec<_>>());
    Ok(())
}
