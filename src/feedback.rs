//! Cross-lane feedback routing.
//!
//! Each lane names at most one feedback source. Routing is resolved once per
//! cycle into an immutable [`FeedbackRouting`] and is evaluated against a
//! [`BufferSnapshot`] of the outputs completed before the cycle started.
//!
//! ```text
//! feedback_source ids ──resolve()──▶ FeedbackRouting (one hop)
//!                                          │
//! completed outputs ───capture()──▶ BufferSnapshot
//!                                          │
//!                                          ▼
//!                              input buffer for each due lane
//! ```
//!
//! Resolution never follows more than one hop and never reads a buffer being
//! produced in the same cycle, so cycles such as A←B, B←A are legal without
//! any cycle detection.

use resonator_core::LaneId;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Completed output buffer, shared between the lane, the archive and snapshots.
pub type SharedBuffer = Arc<Vec<f32>>;

/// Outputs of every lane as they stood at the start of a cycle.
#[derive(Debug, Clone, Default)]
pub struct BufferSnapshot {
    buffers: BTreeMap<LaneId, SharedBuffer>,
}

impl BufferSnapshot {
    pub fn capture(buffers: impl IntoIterator<Item = (LaneId, SharedBuffer)>) -> Self {
        Self {
            buffers: buffers.into_iter().collect(),
        }
    }

    /// A lane's buffer, or `None` if the lane is unknown or has not produced
    /// anything yet.
    pub fn get(&self, id: LaneId) -> Option<&[f32]> {
        self.buffers
            .get(&id)
            .map(|b| b.as_slice())
            .filter(|b| !b.is_empty())
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}

/// Where a lane's recursive input comes from this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackInput {
    /// The lane's own prior output.
    Own,
    /// Another lane's prior output, blended in by the feedback amount.
    Lane(LaneId),
    /// The named source no longer exists; the lane feeds on itself.
    Fallback { missing: LaneId },
}

impl FeedbackInput {
    /// Lane whose buffer is read, given the lane being resolved.
    pub fn source(self, own: LaneId) -> LaneId {
        match self {
            FeedbackInput::Lane(src) => src,
            FeedbackInput::Own | FeedbackInput::Fallback { .. } => own,
        }
    }

    pub fn is_fallback(self) -> bool {
        matches!(self, FeedbackInput::Fallback { .. })
    }
}

/// One cycle's resolved feedback graph.
#[derive(Debug, Clone, Default)]
pub struct FeedbackRouting {
    routes: BTreeMap<LaneId, FeedbackInput>,
}

impl FeedbackRouting {
    /// Resolve `(lane, feedback_source)` pairs against the set of lanes that
    /// exist right now.
    pub fn resolve(lanes: impl IntoIterator<Item = (LaneId, Option<LaneId>)>) -> Self {
        let lanes: Vec<_> = lanes.into_iter().collect();
        let live: BTreeSet<LaneId> = lanes.iter().map(|(id, _)| *id).collect();

        let routes = lanes
            .into_iter()
            .map(|(id, source)| {
                let input = match source {
                    None => FeedbackInput::Own,
                    Some(src) if src == id => FeedbackInput::Own,
                    Some(src) if live.contains(&src) => FeedbackInput::Lane(src),
                    Some(missing) => {
                        tracing::debug!(
                            "{} feeds from removed {}, falling back to self",
                            id,
                            missing
                        );
                        FeedbackInput::Fallback { missing }
                    }
                };
                (id, input)
            })
            .collect();

        Self { routes }
    }

    /// Input for `lane`. Unknown lanes feed on themselves.
    pub fn input(&self, lane: LaneId) -> FeedbackInput {
        self.routes.get(&lane).copied().unwrap_or(FeedbackInput::Own)
    }

    /// Cross-lane edges as `(source, destination)`.
    pub fn edges(&self) -> impl Iterator<Item = (LaneId, LaneId)> + '_ {
        self.routes.iter().filter_map(|(dst, input)| match input {
            FeedbackInput::Lane(src) => Some((*src, *dst)),
            _ => None,
        })
    }

    pub fn fallback_count(&self) -> usize {
        self.routes.values().filter(|i| i.is_fallback()).count()
    }
}

/// Blend `source` into `own`: `own·(1−amount) + source·amount`.
///
/// Without a source (or with a non-positive amount) the lane's own buffer is
/// returned unchanged. Buffers of different lengths are zero-padded to the
/// longer one.
pub fn mix_input(own: &[f32], source: Option<&[f32]>, amount: f32) -> Vec<f32> {
    let amount = amount.clamp(0.0, 1.0);
    let source = match source {
        Some(src) if amount > 0.0 && !src.is_empty() => src,
        _ => return own.to_vec(),
    };
    let len = own.len().max(source.len());
    (0..len)
        .map(|i| {
            let a = own.get(i).copied().unwrap_or(0.0);
            let b = source.get(i).copied().unwrap_or(0.0);
            a * (1.0 - amount) + b * amount
        })
        .collect()
}
