//! Bridge readiness, shared between whoever polls the bridge and the engine.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BridgeStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    ModelLoaded,
    Error,
}

impl BridgeStatus {
    /// Inference may only be attempted once a model is loaded.
    pub fn allows_inference(self) -> bool {
        self == BridgeStatus::ModelLoaded
    }

    fn as_u8(self) -> u8 {
        match self {
            BridgeStatus::Disconnected => 0,
            BridgeStatus::Connecting => 1,
            BridgeStatus::Connected => 2,
            BridgeStatus::ModelLoaded => 3,
            BridgeStatus::Error => 4,
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            1 => BridgeStatus::Connecting,
            2 => BridgeStatus::Connected,
            3 => BridgeStatus::ModelLoaded,
            4 => BridgeStatus::Error,
            _ => BridgeStatus::Disconnected,
        }
    }
}

/// Cloneable handle to the current [`BridgeStatus`]. Read-only for the engine.
#[derive(Debug, Clone, Default)]
pub struct SharedBridgeStatus {
    inner: Arc<AtomicU8>,
}

impl SharedBridgeStatus {
    pub fn new(status: BridgeStatus) -> Self {
        Self {
            inner: Arc::new(AtomicU8::new(status.as_u8())),
        }
    }

    #[inline]
    pub fn get(&self) -> BridgeStatus {
        BridgeStatus::from_u8(self.inner.load(Ordering::Acquire))
    }

    pub fn set(&self, status: BridgeStatus) {
        let prev = BridgeStatus::from_u8(self.inner.swap(status.as_u8(), Ordering::AcqRel));
        if prev != status {
            tracing::info!("Bridge status {:?} -> {:?}", prev, status);
        }
    }
}
