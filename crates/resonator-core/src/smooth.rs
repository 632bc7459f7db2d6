//! Timed glide between two parameter sets.
//!
//! Scene loads with a non-zero crossfade duration ramp a lane's baseline
//! linearly instead of jumping. The scheduler advances the glide by the wall
//! time elapsed since the previous cycle.
//!
//! # Example
//!
//! ```
//! use resonator_core::{LaneParams, ParamGlide, ParamId};
//! use std::time::Duration;
//!
//! let start = LaneParams::default();
//! let mut target = LaneParams::default();
//! target.set(ParamId::Feedback, 1.0);
//!
//! let mut glide = ParamGlide::new(start, target.clone(), Duration::from_secs(2));
//! let halfway = glide.advance(Duration::from_secs(1));
//! assert!((halfway.feedback - 0.75).abs() < 1e-6);
//!
//! let done = glide.advance(Duration::from_secs(5));
//! assert_eq!(done, target);
//! assert!(!glide.is_gliding());
//! ```

use crate::params::LaneParams;
use std::time::Duration;

/// Linear ramp from one [`LaneParams`] to another over a fixed duration.
#[derive(Debug, Clone)]
pub struct ParamGlide {
    start: LaneParams,
    target: LaneParams,
    duration: Duration,
    elapsed: Duration,
}

impl ParamGlide {
    pub fn new(start: LaneParams, target: LaneParams, duration: Duration) -> Self {
        Self {
            start,
            target,
            duration,
            elapsed: Duration::ZERO,
        }
    }

    /// Move the ramp forward by `dt` and return the current value.
    ///
    /// Snaps exactly to the target once the duration has elapsed.
    pub fn advance(&mut self, dt: Duration) -> LaneParams {
        self.elapsed = self.elapsed.saturating_add(dt).min(self.duration);
        self.current()
    }

    pub fn current(&self) -> LaneParams {
        if !self.is_gliding() {
            return self.target.clone();
        }
        LaneParams::lerp(&self.start, &self.target, self.progress())
    }

    /// 0.0 at start, 1.0 when complete.
    pub fn progress(&self) -> f32 {
        if self.duration.is_zero() {
            return 1.0;
        }
        (self.elapsed.as_secs_f64() / self.duration.as_secs_f64()).clamp(0.0, 1.0) as f32
    }

    #[inline]
    pub fn is_gliding(&self) -> bool {
        self.elapsed < self.duration
    }

    pub fn target(&self) -> &LaneParams {
        &self.target
    }

    pub fn skip_to_target(&mut self) -> LaneParams {
        self.elapsed = self.duration;
        self.target.clone()
    }
}
