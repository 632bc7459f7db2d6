//! Error types for resonator-core.

use thiserror::Error;

/// Error type for resonator-core operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Invalid step tempo: {0}. Must be between 20.0 and 999.0 BPM")]
    InvalidTempo(f32),

    #[error("Step index {index} out of range (capacity {capacity})")]
    StepOutOfRange { index: usize, capacity: usize },

    #[error("Scene slot {0} out of range (0-7)")]
    SceneSlotOutOfRange(usize),

    #[error("Scene slot {0} is empty")]
    EmptyScene(usize),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Result type alias.
pub type Result<T> = core::result::Result<T, Error>;
