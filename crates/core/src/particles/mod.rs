//! Particle simulation behind the show.
//!
//! Three independent sets are simulated every frame:
//!
//! - [`ParticleField`]: a fixed set of points pushed away from (or, while the
//!   pointer is held, pulled towards) the pointer, always recomputed from
//!   their rest positions so nothing accumulates between frames.
//! - [`PointerTrail`]: a bounded ring of recent pointer samples.
//! - [`AmbientDrift`]: free-floating points that wrap around a box.

use std::collections::VecDeque;
use std::f32::consts::TAU;

use glam::{Vec2, Vec3};
use rand::Rng;

use crate::{
    config::ParticleConfig,
    render::{FieldTransform, PointBuffer, RenderSurface},
    timeline::Millis,
};

/// Smallest distance treated as non-zero when normalising displacements.
const MIN_DISTANCE: f32 = 1.0e-4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    pub original: Vec3,
    pub current: Vec3,
}

/// Pointer input as seen by one frame of the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PointerSample {
    /// Normalised device coordinates, both axes in `[-1, 1]`.
    pub ndc: Vec2,
    /// Attraction instead of repulsion while asserted.
    pub active: bool,
}

#[derive(Debug, Clone)]
pub struct ParticleField {
    particles: Box<[Particle]>,
    repulsion_radius: f32,
    force_gain: f32,
    pointer_scale: f32,
    activation_gain: f32,
    jitter_amplitude: f32,
    jitter_speed: f32,
}

impl ParticleField {
    pub fn new<R: Rng>(config: &ParticleConfig, rng: &mut R) -> Self {
        let extent = config.extent.abs();
        let particles = (0..config.count)
            .map(|_| {
                let original = sample_cube(rng, extent);
                Particle {
                    original,
                    current: original,
                }
            })
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            particles,
            repulsion_radius: config.repulsion_radius.max(0.0),
            force_gain: config.force_gain,
            pointer_scale: config.pointer_scale,
            activation_gain: config.activation_gain,
            jitter_amplitude: config.jitter_amplitude,
            jitter_speed: config.jitter_speed,
        }
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// Field-space position of a pointer sample.
    pub fn pointer_position(&self, pointer: &PointerSample) -> Vec3 {
        (pointer.ndc.clamp(Vec2::NEG_ONE, Vec2::ONE) * self.pointer_scale).extend(0.0)
    }

    /// Recomputes every particle from its rest position for time `t` seconds.
    pub fn update(&mut self, t: f32, pointer: &PointerSample) {
        let target = self.pointer_position(pointer);
        for (index, particle) in self.particles.iter_mut().enumerate() {
            let displacement = particle.original - target;
            let distance = displacement.length();
            let force = (self.repulsion_radius - distance).max(0.0) * self.force_gain;

            let mut push = displacement / distance.max(MIN_DISTANCE) * force;
            if pointer.active {
                push *= -self.activation_gain;
            }

            particle.current =
                particle.original + push + jitter(t * self.jitter_speed, index, self.jitter_amplitude);
        }
    }

    pub fn write_into(&self, buffer: &mut PointBuffer) {
        if buffer.len() != self.particles.len() {
            buffer.resize(self.particles.len());
        }
        for (index, particle) in self.particles.iter().enumerate() {
            buffer.set(index, particle.current);
        }
    }
}

fn jitter(phase: f32, index: usize, amplitude: f32) -> Vec3 {
    let i = index as f32;
    Vec3::new((phase + i * 0.05).cos(), (phase + i * 0.1).sin(), 0.0) * amplitude
}

fn sample_cube<R: Rng>(rng: &mut R, extent: f32) -> Vec3 {
    if extent <= 0.0 {
        return Vec3::ZERO;
    }
    Vec3::new(
        rng.random_range(-extent..extent),
        rng.random_range(-extent..extent),
        rng.random_range(-extent..extent),
    )
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrailSample {
    pub position: Vec3,
    /// Frames since the sample was taken.
    pub age: usize,
}

/// Bounded history of recent pointer positions, newest first.
#[derive(Debug, Clone)]
pub struct PointerTrail {
    samples: VecDeque<TrailSample>,
    length: usize,
}

impl PointerTrail {
    pub fn new(length: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(length),
            length,
        }
    }

    pub fn push(&mut self, position: Vec3) {
        for sample in &mut self.samples {
            sample.age += 1;
        }
        let length = self.length;
        self.samples.retain(|sample| sample.age < length);
        if length > 0 {
            self.samples.push_front(TrailSample { position, age: 0 });
        }
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> impl Iterator<Item = &TrailSample> {
        self.samples.iter()
    }

    pub fn write_into(&self, buffer: &mut PointBuffer) {
        buffer.resize(self.samples.len());
        for (index, sample) in self.samples.iter().enumerate() {
            buffer.set(index, sample.position);
        }
    }
}

/// Pointer-independent particles drifting inside a box with wrap-around.
#[derive(Debug, Clone)]
pub struct AmbientDrift {
    positions: Vec<Vec3>,
    velocities: Vec<Vec3>,
    extent: f32,
}

impl AmbientDrift {
    pub fn new<R: Rng>(count: usize, extent: f32, max_speed: f32, rng: &mut R) -> Self {
        let extent = extent.abs();
        let speed = max_speed.abs();
        let positions = (0..count).map(|_| sample_cube(rng, extent)).collect();
        let velocities = (0..count).map(|_| sample_cube(rng, speed)).collect();
        Self {
            positions,
            velocities,
            extent,
        }
    }

    pub fn step(&mut self) {
        let extent = self.extent;
        for (position, velocity) in self.positions.iter_mut().zip(&self.velocities) {
            *position += *velocity;
            position.x = wrap(position.x, extent);
            position.y = wrap(position.y, extent);
            position.z = wrap(position.z, extent);
        }
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    pub fn write_into(&self, buffer: &mut PointBuffer) {
        if buffer.len() != self.positions.len() {
            buffer.resize(self.positions.len());
        }
        for (index, position) in self.positions.iter().enumerate() {
            buffer.set(index, *position);
        }
    }
}

/// Toroidal wrap: leaving through one face re-enters through the opposite one.
fn wrap(value: f32, extent: f32) -> f32 {
    if extent <= 0.0 {
        return 0.0;
    }
    if (-extent..=extent).contains(&value) {
        return value;
    }
    // rem_euclid can round up to the full period; clamp that back inside.
    ((value + extent).rem_euclid(2.0 * extent) - extent).min(extent)
}

/// The three particle sets plus the whole-field breathing and rotation.
#[derive(Debug, Clone)]
pub struct ParticleSimulator {
    field: ParticleField,
    trail: PointerTrail,
    ambient: AmbientDrift,
    rotation_speed: f32,
    breathing_amplitude: f32,
    breathing_period_ms: Millis,
    transform: FieldTransform,
}

impl ParticleSimulator {
    pub fn new<R: Rng>(config: &ParticleConfig, rng: &mut R) -> Self {
        Self {
            field: ParticleField::new(config, rng),
            trail: PointerTrail::new(config.trail_length),
            ambient: AmbientDrift::new(
                config.ambient_count,
                config.ambient_extent,
                config.ambient_max_speed,
                rng,
            ),
            rotation_speed: config.rotation_speed,
            breathing_amplitude: config.breathing_amplitude,
            breathing_period_ms: config.breathing_period_ms,
            transform: FieldTransform::default(),
        }
    }

    /// Advances every set by one frame and writes the result into `surface`.
    pub fn frame<S: RenderSurface + ?Sized>(
        &mut self,
        elapsed_ms: Millis,
        pointer: &PointerSample,
        surface: &mut S,
    ) {
        let t = elapsed_ms as f32 / 1_000.0;

        self.field.update(t, pointer);
        self.trail.push(self.field.pointer_position(pointer));
        self.ambient.step();
        self.transform = FieldTransform {
            rotation_y: t * self.rotation_speed,
            scale: self.breathing_scale(elapsed_ms),
        };

        self.field.write_into(surface.field_points());
        self.trail.write_into(surface.trail_points());
        self.ambient.write_into(surface.ambient_points());
        surface.set_field_transform(self.transform);
    }

    /// Scale oscillating between `1` and `1 + amplitude` over one period.
    pub fn breathing_scale(&self, elapsed_ms: Millis) -> f32 {
        if self.breathing_period_ms == 0 {
            return 1.0;
        }
        let phase = (elapsed_ms % self.breathing_period_ms) as f32 / self.breathing_period_ms as f32;
        1.0 + self.breathing_amplitude * (1.0 - (phase * TAU).cos()) * 0.5
    }

    pub fn clear_trail(&mut self) {
        self.trail.clear();
    }

    pub fn field(&self) -> &ParticleField {
        &self.field
    }

    pub fn trail(&self) -> &PointerTrail {
        &self.trail
    }

    pub fn ambient(&self) -> &AmbientDrift {
        &self.ambient
    }

    pub fn transform(&self) -> FieldTransform {
        self.transform
    }
}
