//! Short-lived visual objects: click ripples (with their radial sparks),
//! swipe indicators and trail particles.
//!
//! Every effect is removed exactly once, by identity, when its time-to-live
//! elapses. Motion is derived purely from the spawn time so it always
//! finishes inside the TTL.

use std::f32::consts::TAU;

use glam::Vec2;
use rand::Rng;
use serde::Serialize;

use crate::{
    config::EffectConfig,
    gesture::SwipeDirection,
    timeline::{Millis, Scheduler},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct EffectId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum EffectKind {
    ClickRipple,
    SwipeIndicator { direction: SwipeDirection },
    TrailParticle,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EphemeralEffect {
    pub id: EffectId,
    pub kind: EffectKind,
    pub origin: Vec2,
    pub spawned_at: Millis,
    pub ttl_ms: Millis,
    /// Empty for everything but click ripples.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sparks: Vec<Spark>,
}

/// One radial spark of a click ripple, fixed at spawn time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Spark {
    pub direction: Vec2,
    pub distance: f32,
    pub delay_ms: Millis,
    pub duration_ms: Millis,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SparkMotion {
    pub offset: Vec2,
    pub scale: f32,
    pub opacity: f32,
}

/// Presentational state of an effect at one instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EffectMotion {
    pub scale: f32,
    pub opacity: f32,
    pub offset: Vec2,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sparks: Vec<SparkMotion>,
}

#[derive(Debug)]
pub struct EffectPool {
    live: Vec<EphemeralEffect>,
    expiries: Scheduler<EffectId>,
    next_id: u64,
    config: EffectConfig,
}

impl EffectPool {
    pub fn new(config: EffectConfig) -> Self {
        Self {
            live: Vec::new(),
            expiries: Scheduler::new(),
            next_id: 0,
            config,
        }
    }

    /// TTL for `kind`, never below the configured minimum (or 1 ms).
    pub fn ttl(&self, kind: &EffectKind) -> Millis {
        let configured = match kind {
            EffectKind::ClickRipple => self.config.ripple_ttl_ms,
            EffectKind::SwipeIndicator { .. } => self.config.indicator_ttl_ms,
            EffectKind::TrailParticle => self.config.trail_ttl_ms,
        };
        configured.max(self.config.min_ttl_ms).max(1)
    }

    pub fn spawn(&mut self, kind: EffectKind, origin: Vec2, now: Millis) -> EffectId {
        self.insert(kind, origin, now, Vec::new())
    }

    /// Spawns a click ripple with its ring of sparks. Spark travel, timing
    /// and delay are jittered from `rng`.
    pub fn spawn_ripple<R: Rng>(&mut self, origin: Vec2, now: Millis, rng: &mut R) -> EffectId {
        let cfg = &self.config;
        let count = cfg.ripple_sparks;
        let sparks = (0..count)
            .map(|index| Spark {
                direction: Vec2::from_angle(index as f32 / count as f32 * TAU),
                distance: cfg.spark_distance + jitter_f32(rng, cfg.spark_distance_jitter),
                delay_ms: jitter_ms(rng, cfg.spark_max_delay_ms),
                duration_ms: cfg.spark_duration_ms + jitter_ms(rng, cfg.spark_duration_jitter_ms),
            })
            .collect();
        self.insert(EffectKind::ClickRipple, origin, now, sparks)
    }

    fn insert(&mut self, kind: EffectKind, origin: Vec2, now: Millis, sparks: Vec<Spark>) -> EffectId {
        let id = EffectId(self.next_id);
        self.next_id += 1;
        let ttl_ms = self.ttl(&kind);
        self.live.push(EphemeralEffect {
            id,
            kind,
            origin,
            spawned_at: now,
            ttl_ms,
            sparks,
        });
        self.expiries.schedule(now, ttl_ms, id);
        id
    }

    pub fn next_due(&self) -> Option<Millis> {
        self.expiries.next_due()
    }

    /// Expires the earliest effect due at `now` and returns its id.
    pub fn fire_next(&mut self, now: Millis) -> Option<EffectId> {
        let expired = self.expiries.pop_due(now)?.payload;
        self.live.retain(|effect| effect.id != expired);
        Some(expired)
    }

    pub fn live(&self) -> &[EphemeralEffect] {
        &self.live
    }

    pub fn contains(&self, id: EffectId) -> bool {
        self.live.iter().any(|effect| effect.id == id)
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    pub fn pending_timers(&self) -> usize {
        self.expiries.pending()
    }

    /// Drops every live effect together with its pending removal and
    /// returns the ids that were dropped.
    pub fn teardown(&mut self) -> Vec<EffectId> {
        self.expiries.cancel_all();
        self.live.drain(..).map(|effect| effect.id).collect()
    }

    pub fn motion(&self, effect: &EphemeralEffect, now: Millis) -> EffectMotion {
        let elapsed = now.saturating_sub(effect.spawned_at) as f32;
        let progress = (elapsed / effect.ttl_ms.max(1) as f32).clamp(0.0, 1.0);
        let eased = ease_out_cubic(progress);

        match effect.kind {
            EffectKind::ClickRipple => EffectMotion {
                scale: self.config.ripple_max_scale * eased,
                opacity: 1.0 - eased,
                offset: Vec2::ZERO,
                sparks: effect
                    .sparks
                    .iter()
                    .map(|spark| spark_motion(spark, effect, now))
                    .collect(),
            },
            EffectKind::SwipeIndicator { direction } => EffectMotion {
                scale: 1.0 - 0.5 * eased,
                opacity: 1.0 - eased,
                offset: direction.unit() * self.config.indicator_travel * eased,
                sparks: Vec::new(),
            },
            EffectKind::TrailParticle => EffectMotion {
                scale: 1.0 - eased,
                opacity: 1.0 - eased,
                offset: Vec2::ZERO,
                sparks: Vec::new(),
            },
        }
    }
}

/// A spark's flight is cut short so it always lands inside the ripple's TTL.
fn spark_motion(spark: &Spark, effect: &EphemeralEffect, now: Millis) -> SparkMotion {
    let start = spark.delay_ms.min(effect.ttl_ms);
    let end = (spark.delay_ms + spark.duration_ms).min(effect.ttl_ms);
    let elapsed = now.saturating_sub(effect.spawned_at);
    let progress = if elapsed >= end {
        1.0
    } else if elapsed <= start {
        0.0
    } else {
        (elapsed - start) as f32 / (end - start) as f32
    };
    let eased = ease_out_cubic(progress);
    SparkMotion {
        offset: spark.direction * spark.distance * eased,
        scale: 1.0 - eased,
        opacity: 1.0 - eased,
    }
}

/// GSAP's `power2.out`.
fn ease_out_cubic(t: f32) -> f32 {
    let inv = 1.0 - t;
    1.0 - inv * inv * inv
}

fn jitter_f32<R: Rng>(rng: &mut R, max: f32) -> f32 {
    if max > 0.0 {
        rng.random_range(0.0..max)
    } else {
        0.0
    }
}

fn jitter_ms<R: Rng>(rng: &mut R, max: Millis) -> Millis {
    if max > 0 {
        rng.random_range(0..=max)
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    fn expire_until(pool: &mut EffectPool, until: Millis) -> Vec<EffectId> {
        let mut expired = Vec::new();
        while let Some(due) = pool.next_due() {
            if due > until {
                break;
            }
            expired.extend(pool.fire_next(due));
        }
        expired
    }

    #[test]
    fn ripple_lives_exactly_its_ttl() {
        let mut pool = EffectPool::new(EffectConfig::default());
        let id = pool.spawn(EffectKind::ClickRipple, Vec2::new(10.0, 20.0), 0);

        expire_until(&mut pool, 799);
        assert!(pool.contains(id));

        assert_eq!(expire_until(&mut pool, 801), vec![id]);
        assert!(!pool.contains(id));
        assert_eq!(pool.pending_timers(), 0);
    }

    #[test]
    fn removal_is_by_identity_under_interleaved_spawns() {
        let mut pool = EffectPool::new(EffectConfig::default());
        let first = pool.spawn(EffectKind::TrailParticle, Vec2::ZERO, 0);
        let ripple = pool.spawn(EffectKind::ClickRipple, Vec2::ONE, 100);
        let second = pool.spawn(EffectKind::TrailParticle, Vec2::ONE, 150);

        assert_eq!(expire_until(&mut pool, 900), vec![ripple]);
        assert!(pool.contains(first));
        assert!(pool.contains(second));

        assert_eq!(expire_until(&mut pool, 1_150), vec![first, second]);
        assert!(pool.is_empty());
    }

    #[test]
    fn zero_ttl_is_clamped() {
        let mut pool = EffectPool::new(EffectConfig {
            ripple_ttl_ms: 0,
            min_ttl_ms: 0,
            ..EffectConfig::default()
        });
        assert_eq!(pool.ttl(&EffectKind::ClickRipple), 1);

        let id = pool.spawn(EffectKind::ClickRipple, Vec2::ZERO, 5);
        assert!(pool.contains(id));
        assert_eq!(expire_until(&mut pool, 6), vec![id]);
    }

    #[test]
    fn teardown_cancels_pending_removals() {
        let mut pool = EffectPool::new(EffectConfig::default());
        pool.spawn(EffectKind::ClickRipple, Vec2::ZERO, 0);
        pool.spawn(EffectKind::TrailParticle, Vec2::ZERO, 0);

        assert_eq!(pool.teardown().len(), 2);
        assert!(pool.is_empty());
        assert!(pool.next_due().is_none());
        assert!(expire_until(&mut pool, Millis::MAX).is_empty());
    }

    #[test]
    fn motion_finishes_within_ttl() {
        let mut pool = EffectPool::new(EffectConfig::default());
        pool.spawn(
            EffectKind::SwipeIndicator {
                direction: SwipeDirection::Left,
            },
            Vec2::ZERO,
            1_000,
        );
        let effect = pool.live()[0].clone();

        let start = pool.motion(&effect, 1_000);
        assert_relative_eq!(start.opacity, 1.0);
        assert_relative_eq!(start.scale, 1.0);

        let end = pool.motion(&effect, 1_800);
        assert_relative_eq!(end.opacity, 0.0);
        assert_relative_eq!(end.scale, 0.5);
        assert_relative_eq!(end.offset.x, -100.0);
        assert_eq!(pool.motion(&effect, 5_000), end);
    }

    #[test]
    fn ripple_eases_like_power2_out() {
        let mut pool = EffectPool::new(EffectConfig::default());
        pool.spawn(EffectKind::ClickRipple, Vec2::ZERO, 0);
        let effect = pool.live()[0].clone();

        let half = pool.motion(&effect, 400);
        assert_relative_eq!(half.scale, 3.5);
        assert_relative_eq!(half.opacity, 0.125);
    }

    #[test]
    fn ripple_sparks_fan_out_and_settle_within_ttl() {
        let mut pool = EffectPool::new(EffectConfig::default());
        let id = pool.spawn_ripple(Vec2::new(50.0, 50.0), 0, &mut StdRng::seed_from_u64(4));
        let effect = pool.live()[0].clone();
        assert_eq!(effect.id, id);
        assert_eq!(effect.kind, EffectKind::ClickRipple);
        assert_eq!(effect.sparks.len(), 8);

        for (index, spark) in effect.sparks.iter().enumerate() {
            let angle = index as f32 / 8.0 * TAU;
            assert_relative_eq!(spark.direction.x, angle.cos(), epsilon = 1.0e-6);
            assert_relative_eq!(spark.direction.y, angle.sin(), epsilon = 1.0e-6);
            assert!((50.0..80.0).contains(&spark.distance));
            assert!(spark.delay_ms <= 100);
            assert!((600..=1_000).contains(&spark.duration_ms));
        }

        let start = pool.motion(&effect, 0);
        assert!(start.sparks.iter().all(|s| s.offset == Vec2::ZERO && s.opacity == 1.0));

        let end = pool.motion(&effect, effect.ttl_ms);
        assert_eq!(end.sparks.len(), 8);
        for (spark, motion) in effect.sparks.iter().zip(&end.sparks) {
            assert_relative_eq!(motion.opacity, 0.0);
            assert_relative_eq!(motion.offset.length(), spark.distance, epsilon = 1.0e-3);
        }
    }

    #[test]
    fn plain_spawns_carry_no_sparks() {
        let mut pool = EffectPool::new(EffectConfig::default());
        pool.spawn(EffectKind::TrailParticle, Vec2::ZERO, 0);
        let effect = pool.live()[0].clone();
        assert!(effect.sparks.is_empty());
        assert!(pool.motion(&effect, 100).sparks.is_empty());
    }
}
