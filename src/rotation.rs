//! Rotation animation and sector navigation
//!
//! A single scalar angle is eased from its current value to a target over a
//! fixed duration. Advancement is a step function driven once per rendered
//! frame; there is no timer of its own. While an animation is in flight,
//! new rotation requests are ignored outright (single-flight, no queueing).

use crate::error::VizError;
use crate::geometry::DEFAULT_ROTATION;
use std::f32::consts::TAU;
use std::time::{Duration, Instant};

/// Default rotation animation duration
pub const ROTATION_DURATION: Duration = Duration::from_millis(500);

/// Smoothstep easing: t^2 * (3 - 2t)
fn smoothstep(t: f32) -> f32 {
    t * t * (3.0 - 2.0 * t)
}

/// In-flight rotation from one angle to another
#[derive(Debug)]
pub struct RotationAnimation {
    started_at: Instant,
    duration: Duration,
    from: f32,
    to: f32,
}

impl RotationAnimation {
    pub fn new(from: f32, to: f32, duration: Duration, started_at: Instant) -> Self {
        Self {
            started_at,
            duration,
            from,
            to,
        }
    }

    /// Get the current eased angle and whether the animation is complete.
    ///
    /// At completion the returned angle is exactly the target, with no
    /// residual float drift. A zero duration completes on the first tick.
    pub fn tick(&self, now: Instant) -> (f32, bool) {
        if self.duration.is_zero() {
            return (self.to, true);
        }
        let elapsed = now.saturating_duration_since(self.started_at).as_secs_f32();
        let t = (elapsed / self.duration.as_secs_f32()).clamp(0.0, 1.0);
        if t >= 1.0 {
            (self.to, true)
        } else {
            (self.from + (self.to - self.from) * smoothstep(t), false)
        }
    }
}

/// Owns the grid's rotation offset and the current sector selection
#[derive(Debug)]
pub struct SectorNavigator {
    sectors: usize,
    current_sector: usize,
    rotation_offset: f32,
    animation: Option<RotationAnimation>,
    duration: Duration,
}

impl SectorNavigator {
    pub fn new(sectors: usize) -> Result<Self, VizError> {
        if sectors == 0 {
            return Err(VizError::InvalidGrid { rings: 1, sectors });
        }
        Ok(Self {
            sectors,
            current_sector: 0,
            rotation_offset: DEFAULT_ROTATION,
            animation: None,
            duration: ROTATION_DURATION,
        })
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn rotation_offset(&self) -> f32 {
        self.rotation_offset
    }

    pub fn current_sector(&self) -> usize {
        self.current_sector
    }

    pub fn is_animating(&self) -> bool {
        self.animation.is_some()
    }

    /// Rotation offset that centers the given sector at the top of the grid
    pub fn alignment_for(&self, sector: usize) -> f32 {
        let step = TAU / self.sectors as f32;
        DEFAULT_ROTATION - (sector as f32 * step + step / 2.0)
    }

    /// Advance to the next sector (clockwise). Ignored while animating;
    /// returns whether the request was accepted.
    pub fn next(&mut self, now: Instant) -> bool {
        if self.animation.is_some() {
            return false;
        }
        self.current_sector = (self.current_sector + 1) % self.sectors;
        self.start_rotation(now);
        true
    }

    /// Move to the previous sector (counter-clockwise). Ignored while
    /// animating; returns whether the request was accepted.
    pub fn previous(&mut self, now: Instant) -> bool {
        if self.animation.is_some() {
            return false;
        }
        self.current_sector = (self.current_sector + self.sectors - 1) % self.sectors;
        self.start_rotation(now);
        true
    }

    fn start_rotation(&mut self, now: Instant) {
        let target = self.alignment_for(self.current_sector);
        self.animation = Some(RotationAnimation::new(
            self.rotation_offset,
            target,
            self.duration,
            now,
        ));
    }

    /// Advance any in-flight animation one frame.
    ///
    /// Returns whether the rotation offset changed, i.e. whether the caller
    /// needs to rebuild the grid.
    pub fn tick(&mut self, now: Instant) -> bool {
        let Some(animation) = &self.animation else {
            return false;
        };
        let (angle, done) = animation.tick(now);
        let changed = angle != self.rotation_offset;
        self.rotation_offset = angle;
        if done {
            self.animation = None;
        }
        changed
    }
}
