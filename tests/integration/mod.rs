//! Integration test modules for latent-resonator
//!
//! Test categories:
//! - engine: construction, lanes, bridge gating, failures, panic stop, mixer
//! - sequencing: trig types, probability, advance modes, step locks
//! - feedback: excitation seeding, cross-lane routing, fallback
//! - scenes: capture, apply, crossfader, glides
//! - concurrency: one call per lane, collisions, queue limits, scheduler thread

pub mod concurrency;
pub mod engine;
pub mod feedback;
pub mod scenes;
