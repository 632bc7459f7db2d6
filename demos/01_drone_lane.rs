//! # 01 - Drone Lane
//!
//! Run one iteration-mode lane against a stand-in model and watch it evolve.
//!
//! **Concepts:** Engine setup, presets, scheduler thread, lane monitors
//!
//! ```bash
//! cargo run --example 01_drone_lane
//! ```

use latent_resonator::prelude::*;
use std::time::Duration;

/// One-pole lowpass standing in for a diffusion model. Lower denoise keeps
/// more of the input.
fn smear(
    audio: &[f32],
    _prompt: &str,
    params: &InferenceParams,
) -> std::result::Result<InferenceOutput, InferenceError> {
    let coeff = 0.2 + 0.7 * params.denoise_strength;
    let mut state = 0.0;
    let audio = audio
        .iter()
        .map(|&x| {
            state += coeff * (x - state);
            state
        })
        .collect();
    Ok(InferenceOutput {
        audio,
        device: "cpu".into(),
        latency_ms: 0.0,
    })
}

fn main() -> latent_resonator::Result<()> {
    tracing_subscriber::fmt::init();

    let engine = NeuralEngine::builder()
        .backend(FnBackend::new("smear", smear))
        .tick_interval_ms(20)
        .build()?;
    let handle = EngineHandle::new(engine);

    let lane = handle.with(|e| e.add_lane(&LanePreset::drone()))?;
    let monitor = handle.monitor(lane).ok_or(Error::LaneNotFound(lane))?;

    handle.start_scheduler()?;
    handle.with(|e| e.start_processing());

    for _ in 0..8 {
        std::thread::sleep(Duration::from_millis(250));
        println!(
            "iteration {:>4}  step {:>2}/{}  rms {:.4}",
            monitor.iteration_count(),
            monitor.current_step() + 1,
            monitor.chain_length(),
            monitor.rms()
        );
    }

    // Push the lane towards noise halfway through.
    handle.with(|e| e.set_macro(lane, MacroKind::Chaos, 0.9))?;
    std::thread::sleep(Duration::from_millis(500));

    handle.with(|e| e.stop_processing());
    handle.stop_scheduler();

    let mix = handle.with(|e| e.master_mix(512));
    println!("final mix rms {:.4}", rms(&mix));
    Ok(())
}

fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
}
