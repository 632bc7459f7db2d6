//! Lane identity.

use core::sync::atomic::{AtomicU64, Ordering};
use serde::{Deserialize, Serialize};

/// Counter for generating unique lane IDs
static LANE_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a resonator lane.
///
/// IDs are never reused within a process, so a stale reference to a removed
/// lane can never alias a newer one.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LaneId(pub u64);

impl LaneId {
    /// Creates a new unique lane ID.
    pub fn new() -> Self {
        Self(LANE_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn from_raw(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for LaneId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for LaneId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Lane({})", self.0)
    }
}
