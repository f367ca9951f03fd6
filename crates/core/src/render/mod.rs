use glam::Vec3;
use serde::Serialize;

use crate::Result;

/// Flat `xyz` position buffer, laid out the way point renderers upload it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointBuffer {
    positions: Vec<f32>,
}

impl PointBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_points(count: usize) -> Self {
        Self {
            positions: vec![0.0; count * 3],
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Resizes to `count` points. New points start at the origin.
    pub fn resize(&mut self, count: usize) {
        self.positions.resize(count * 3, 0.0);
    }

    pub fn set(&mut self, index: usize, point: Vec3) {
        let base = index * 3;
        if let Some(slot) = self.positions.get_mut(base..base + 3) {
            slot.copy_from_slice(&point.to_array());
        }
    }

    pub fn point(&self, index: usize) -> Option<Vec3> {
        let base = index * 3;
        self.positions.get(base..base + 3).map(Vec3::from_slice)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.positions
    }
}

/// Whole-field transform applied by the renderer on top of the positions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FieldTransform {
    pub rotation_y: f32,
    pub scale: f32,
}

impl Default for FieldTransform {
    fn default() -> Self {
        Self {
            rotation_y: 0.0,
            scale: 1.0,
        }
    }
}

/// Surface that owns the point buffers the simulator writes each frame.
pub trait RenderSurface {
    fn field_points(&mut self) -> &mut PointBuffer;
    fn trail_points(&mut self) -> &mut PointBuffer;
    fn ambient_points(&mut self) -> &mut PointBuffer;
    fn set_field_transform(&mut self, transform: FieldTransform);

    fn present(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Surface without a GPU behind it. Used by the CLI and by tests.
#[derive(Debug, Default)]
pub struct HeadlessSurface {
    field: PointBuffer,
    trail: PointBuffer,
    ambient: PointBuffer,
    transform: FieldTransform,
    frames_presented: u64,
}

impl HeadlessSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(&self) -> &PointBuffer {
        &self.field
    }

    pub fn trail(&self) -> &PointBuffer {
        &self.trail
    }

    pub fn ambient(&self) -> &PointBuffer {
        &self.ambient
    }

    pub fn transform(&self) -> FieldTransform {
        self.transform
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }
}

impl RenderSurface for HeadlessSurface {
    fn field_points(&mut self) -> &mut PointBuffer {
        &mut self.field
    }

    fn trail_points(&mut self) -> &mut PointBuffer {
        &mut self.trail
    }

    fn ambient_points(&mut self) -> &mut PointBuffer {
        &mut self.ambient
    }

    fn set_field_transform(&mut self, transform: FieldTransform) {
        self.transform = transform;
    }

    fn present(&mut self) -> Result<()> {
        self.frames_presented += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_back_written_points() {
        let mut buffer = PointBuffer::with_points(2);
        buffer.set(1, Vec3::new(1.0, 2.0, 3.0));

        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.point(0), Some(Vec3::ZERO));
        assert_eq!(buffer.point(1), Some(Vec3::new(1.0, 2.0, 3.0)));
        assert_eq!(buffer.as_slice()[3..], [1.0, 2.0, 3.0]);
    }

    #[test]
    fn out_of_range_writes_are_ignored() {
        let mut buffer = PointBuffer::with_points(1);
        buffer.set(4, Vec3::ONE);
        assert_eq!(buffer.point(4), None);
        assert_eq!(buffer.len(), 1);

        buffer.resize(0);
        assert!(buffer.is_empty());
    }

    #[test]
    fn headless_surface_counts_frames() {
        let mut surface = HeadlessSurface::new();
        surface.present().unwrap();
        surface.present().unwrap();
        assert_eq!(surface.frames_presented(), 2);
    }
}
