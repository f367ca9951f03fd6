use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::config::ViewportConfig;

/// Maps raw viewport pixel coordinates into the normalised space the
/// particle field works in.
///
/// Pointer samples may arrive from outside the viewport (drags that leave the
/// window, stale events after a resize); they are clamped to the viewport
/// edges before mapping so the resulting coordinates are always finite and
/// within `[-1, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportMapping {
    width: f32,
    height: f32,
}

impl ViewportMapping {
    pub fn new(width: f32, height: f32) -> Self {
        let mut mapping = Self {
            width: 1.0,
            height: 1.0,
        };
        mapping.resize(width, height);
        mapping
    }

    pub fn from_config(config: &ViewportConfig) -> Self {
        Self::new(config.width, config.height)
    }

    /// Updates the viewport size. Degenerate sizes fall back to one pixel.
    pub fn resize(&mut self, width: f32, height: f32) {
        self.width = sanitize_extent(width);
        self.height = sanitize_extent(height);
    }

    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width, self.height)
    }

    pub fn clamp(&self, point: Vec2) -> Vec2 {
        let x = if point.x.is_nan() { 0.0 } else { point.x };
        let y = if point.y.is_nan() { 0.0 } else { point.y };
        Vec2::new(x.clamp(0.0, self.width), y.clamp(0.0, self.height))
    }

    /// Viewport pixels to normalised device coordinates, y pointing up.
    pub fn to_ndc(&self, point: Vec2) -> Vec2 {
        let clamped = self.clamp(point);
        Vec2::new(
            clamped.x / self.width * 2.0 - 1.0,
            -(clamped.y / self.height * 2.0 - 1.0),
        )
    }
}

impl Default for ViewportMapping {
    fn default() -> Self {
        Self::from_config(&ViewportConfig::default())
    }
}

fn sanitize_extent(extent: f32) -> f32 {
    if extent.is_finite() && extent >= 1.0 {
        extent
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn maps_corners_and_centre() {
        let mapping = ViewportMapping::new(800.0, 600.0);

        assert_eq!(mapping.to_ndc(Vec2::new(0.0, 0.0)), Vec2::new(-1.0, 1.0));
        assert_eq!(mapping.to_ndc(Vec2::new(800.0, 600.0)), Vec2::new(1.0, -1.0));
        let centre = mapping.to_ndc(Vec2::new(400.0, 300.0));
        assert_relative_eq!(centre.x, 0.0);
        assert_relative_eq!(centre.y, 0.0);
    }

    #[test]
    fn clamps_points_outside_viewport() {
        let mapping = ViewportMapping::new(800.0, 600.0);
        let far = mapping.to_ndc(Vec2::new(-5_000.0, 1.0e9));
        assert_eq!(far, Vec2::new(-1.0, -1.0));

        let weird = mapping.to_ndc(Vec2::new(f32::NAN, f32::INFINITY));
        assert!(weird.is_finite());
    }

    #[test]
    fn degenerate_viewport_stays_finite() {
        let mut mapping = ViewportMapping::new(0.0, -10.0);
        assert_eq!(mapping.size(), Vec2::ONE);
        assert!(mapping.to_ndc(Vec2::new(3.0, 3.0)).is_finite());

        mapping.resize(1920.0, 1080.0);
        assert_eq!(mapping.size(), Vec2::new(1920.0, 1080.0));
    }
}
