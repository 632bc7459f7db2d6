//! Error types for the inference boundary.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Resonator core error: {0}")]
    Core(#[from] resonator_core::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to spawn inference worker: {0}")]
    WorkerSpawn(String),
}

/// Per-call failure reported by a backend.
///
/// These never escape the engine as errors; they become lane status.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InferenceError {
    #[error("Bridge unreachable: {0}")]
    Unavailable(String),

    #[error("No model loaded")]
    ModelNotLoaded,

    #[error("Inference failed: {0}")]
    Failed(String),
}
