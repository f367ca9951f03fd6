use glam::Vec2;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    effects::{EffectKind, EffectPool},
    timeline::Millis,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SwipeDirection {
    Left,
    Right,
    Up,
    Down,
}

impl SwipeDirection {
    /// Screen-space unit vector, y pointing down.
    pub fn unit(self) -> Vec2 {
        match self {
            SwipeDirection::Left => Vec2::NEG_X,
            SwipeDirection::Right => Vec2::X,
            SwipeDirection::Up => Vec2::NEG_Y,
            SwipeDirection::Down => Vec2::Y,
        }
    }

    /// Dominant-axis classification of a displacement. Returns `None` when
    /// neither axis reaches `threshold`.
    pub fn classify(delta: Vec2, threshold: f32) -> Option<Self> {
        if !delta.is_finite() {
            return None;
        }
        let (abs_x, abs_y) = (delta.x.abs(), delta.y.abs());
        if abs_x < threshold && abs_y < threshold {
            return None;
        }
        let direction = if abs_x > abs_y {
            if delta.x > 0.0 {
                SwipeDirection::Right
            } else {
                SwipeDirection::Left
            }
        } else if delta.y > 0.0 {
            SwipeDirection::Down
        } else {
            SwipeDirection::Up
        };
        Some(direction)
    }
}

/// A recognised and dispatched swipe.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Swipe {
    pub direction: SwipeDirection,
    pub origin: Vec2,
    pub delta: Vec2,
}

/// Turns touch start/move/end into at most one swipe per gesture.
///
/// Only directions bound by the current scene are dispatched. When the
/// dispatcher is disarmed, or the caller reports it disabled, recognised
/// swipes are dropped without feedback.
#[derive(Debug)]
pub struct GestureDispatcher {
    threshold: f32,
    bound: Vec<SwipeDirection>,
    start: Option<Vec2>,
    last: Vec2,
}

impl GestureDispatcher {
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold: threshold.abs(),
            bound: Vec::new(),
            start: None,
            last: Vec2::ZERO,
        }
    }

    pub fn arm(&mut self, directions: &[SwipeDirection]) {
        self.bound = directions.to_vec();
    }

    pub fn disarm(&mut self) {
        self.bound.clear();
        self.start = None;
    }

    pub fn is_armed(&self) -> bool {
        !self.bound.is_empty()
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn touch_start(&mut self, point: Vec2) {
        self.start = Some(point);
        self.last = point;
    }

    pub fn touch_move(&mut self, point: Vec2) {
        if self.start.is_some() {
            self.last = point;
        }
    }

    pub fn touch_cancel(&mut self) {
        self.start = None;
    }

    /// Completes the gesture. On dispatch a swipe indicator is spawned at the
    /// gesture's start point.
    pub fn touch_end(
        &mut self,
        point: Vec2,
        disabled: bool,
        effects: &mut EffectPool,
        now: Millis,
    ) -> Option<Swipe> {
        let origin = self.start.take()?;
        self.last = point;
        let delta = point - origin;
        let direction = SwipeDirection::classify(delta, self.threshold)?;

        if disabled || !self.bound.contains(&direction) {
            debug!(?direction, disabled, "swipe suppressed");
            return None;
        }

        effects.spawn(EffectKind::SwipeIndicator { direction }, origin, now);
        Some(Swipe {
            direction,
            origin,
            delta,
        })
    }

    pub fn is_tracking(&self) -> bool {
        self.start.is_some()
    }

    pub fn teardown(&mut self) {
        self.disarm();
    }
}
