//! Centralized error type for the latent-resonator umbrella crate.
//!
//! Wraps the subsystem errors so `?` propagates naturally across crate boundaries.

use resonator_core::LaneId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] resonator_core::Error),

    #[error("Neural: {0}")]
    Neural(#[from] resonator_neural::Error),

    #[error("{0} not found")]
    LaneNotFound(LaneId),

    #[error("Lane limit reached ({0} lanes)")]
    LaneLimit(usize),

    #[error("Failed to spawn scheduler thread: {0}")]
    SchedulerSpawn(String),
}

pub type Result<T> = std::result::Result<T, Error>;
