//! Scene snapshots, the 8-slot bank, the A/B crossfader and scene-load glides.

use crate::error::{Error, Result};
use crate::id::LaneId;
use crate::params::LaneParams;
use crate::smooth::ParamGlide;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

pub const SCENE_SLOTS: usize = 8;

/// Parameter sets of every lane at capture time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub lanes: BTreeMap<LaneId, LaneParams>,
    /// Glide time used when this scene is loaded into A or B.
    #[serde(default)]
    pub crossfade_duration: Duration,
}

impl Scene {
    pub fn capture<'a>(
        lanes: impl IntoIterator<Item = (LaneId, &'a LaneParams)>,
        crossfade_duration: Duration,
    ) -> Self {
        Self {
            lanes: lanes.into_iter().map(|(id, p)| (id, p.clone())).collect(),
            crossfade_duration,
        }
    }

    pub fn params(&self, id: LaneId) -> Option<&LaneParams> {
        self.lanes.get(&id)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SceneBank {
    slots: [Option<Scene>; SCENE_SLOTS],
}

impl SceneBank {
    pub fn new() -> Self {
        Self::default()
    }

    fn check(slot: usize) -> Result<()> {
        if slot < SCENE_SLOTS {
            Ok(())
        } else {
            Err(Error::SceneSlotOutOfRange(slot))
        }
    }

    /// Overwrite `slot`. Any previous content is discarded.
    pub fn store(&mut self, slot: usize, scene: Scene) -> Result<()> {
        Self::check(slot)?;
        self.slots[slot] = Some(scene);
        Ok(())
    }

    pub fn get(&self, slot: usize) -> Result<&Scene> {
        Self::check(slot)?;
        self.slots[slot].as_ref().ok_or(Error::EmptyScene(slot))
    }

    pub fn clear(&mut self, slot: usize) -> Result<()> {
        Self::check(slot)?;
        self.slots[slot] = None;
        Ok(())
    }

    pub fn is_occupied(&self, slot: usize) -> bool {
        self.slots.get(slot).is_some_and(Option::is_some)
    }

    /// Indices of non-empty slots.
    pub fn occupied(&self) -> impl Iterator<Item = usize> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|_| i))
    }
}

/// A/B blend between two bank slots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Crossfader {
    position: f32,
    scene_a: Option<usize>,
    scene_b: Option<usize>,
}

impl Crossfader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self) -> f32 {
        self.position
    }

    pub fn set_position(&mut self, position: f32) {
        self.position = if position.is_nan() {
            0.0
        } else {
            position.clamp(0.0, 1.0)
        };
    }

    pub fn scene_a(&self) -> Option<usize> {
        self.scene_a
    }

    pub fn scene_b(&self) -> Option<usize> {
        self.scene_b
    }

    /// Load a slot as A and jump to position 0.
    pub fn load_a(&mut self, slot: usize) {
        self.scene_a = Some(slot);
        self.position = 0.0;
    }

    /// Load a slot as B and jump to position 1.
    pub fn load_b(&mut self, slot: usize) {
        self.scene_b = Some(slot);
        self.position = 1.0;
    }

    /// Blended parameters for one lane at the current position.
    ///
    /// A lane present in only one loaded scene takes that scene's values.
    pub fn blend(&self, bank: &SceneBank, id: LaneId) -> Option<LaneParams> {
        let side = |slot: Option<usize>| {
            slot.and_then(|s| bank.get(s).ok())
                .and_then(|scene| scene.params(id))
        };
        match (side(self.scene_a), side(self.scene_b)) {
            (Some(a), Some(b)) => Some(LaneParams::lerp(a, b, self.position)),
            (Some(only), None) | (None, Some(only)) => Some(only.clone()),
            (None, None) => None,
        }
    }
}

/// In-progress scene-load glides, one per lane.
#[derive(Debug, Clone, Default)]
pub struct SceneGlide {
    glides: BTreeMap<LaneId, ParamGlide>,
}

impl SceneGlide {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, id: LaneId, from: LaneParams, to: LaneParams, duration: Duration) {
        self.glides.insert(id, ParamGlide::new(from, to, duration));
    }

    /// Advance every glide and return the new baselines. Finished glides
    /// are dropped after reporting their final value.
    pub fn advance(&mut self, dt: Duration) -> Vec<(LaneId, LaneParams)> {
        let out: Vec<_> = self
            .glides
            .iter_mut()
            .map(|(id, glide)| (*id, glide.advance(dt)))
            .collect();
        self.glides.retain(|_, g| g.is_gliding());
        out
    }

    pub fn cancel(&mut self) {
        self.glides.clear();
    }

    pub fn remove_lane(&mut self, id: LaneId) {
        self.glides.remove(&id);
    }

    pub fn is_active(&self) -> bool {
        !self.glides.is_empty()
    }
}
