//! Inference boundary for the latent resonator.
//!
//! The external model is consumed as a black box through [`ResonatorBackend`].
//! [`InferencePool`] runs calls on dedicated worker threads and hands results
//! back over a channel, and [`SharedBridgeStatus`] gates whether calls may be
//! attempted at all.
//!
//! ## Usage
//!
//! ```rust
//! use resonator_neural::*;
//! use resonator_core::LaneId;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let pool = InferencePool::start(Arc::new(PassthroughBackend), PoolConfig::default())?;
//! pool.submit(InferenceRequest {
//!     lane: LaneId::new(),
//!     audio: vec![0.5; 16],
//!     prompt: "metallic drone".into(),
//!     params: InferenceParams::default(),
//! });
//! let done = pool.wait_completion(Duration::from_secs(1)).unwrap();
//! assert_eq!(done.result.unwrap().audio.len(), 16);
//! # Ok::<(), resonator_neural::Error>(())
//! ```

mod error;
pub use error::{Error, InferenceError, Result};

mod backend;
pub use backend::{
    BackendCapabilities, FnBackend, InferenceOutput, InferenceParams, PassthroughBackend,
    ResonatorBackend,
};

mod status;
pub use status::{BridgeStatus, SharedBridgeStatus};

mod pool;
pub use pool::{InferenceCompletion, InferencePool, InferenceRequest, PoolConfig, Ticket};
