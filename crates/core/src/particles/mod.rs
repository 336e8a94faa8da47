use std::f32::consts::TAU;

use glam::Vec2;
use rand::{rngs::StdRng, Rng, SeedableRng};
use tracing::trace;

use crate::{config::ParticleConfig, scene::Rgb};

/// Short-lived spark emitted by a prime burst. Positions live in the scene's
/// XY plane; `velocity` is units per second along `angle`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    pub position: Vec2,
    pub angle: f32,
    pub velocity: f32,
    pub radius: f32,
    pub color: Rgb,
    /// Seconds since spawn.
    pub age: f32,
    pub max_life: f32,
    pub opacity: f32,
}

impl Particle {
    pub fn is_expired(&self) -> bool {
        self.age >= self.max_life
    }
}

/// Spawns, advances and culls burst particles. It never touches scene or
/// catalog state.
#[derive(Debug)]
pub struct ParticleEffectSystem {
    config: ParticleConfig,
    particles: Vec<Particle>,
    rng: StdRng,
}

impl ParticleEffectSystem {
    pub fn new(config: ParticleConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            particles: Vec::with_capacity(*config.burst.end() * 4),
            config,
            rng,
        }
    }

    /// Spawns one burst at `origin` and returns how many particles it added.
    pub fn spawn_burst(&mut self, origin: Vec2, color: Rgb) -> usize {
        let count = self.rng.random_range(self.config.burst.clone());
        for _ in 0..count {
            let particle = Particle {
                position: origin,
                angle: self.rng.random_range(0.0..TAU),
                velocity: self.rng.random_range(self.config.speed.clone()),
                radius: self.rng.random_range(self.config.radius.clone()),
                color,
                age: 0.0,
                max_life: self.rng.random_range(self.config.lifetime.clone()),
                opacity: 1.0,
            };
            self.particles.push(particle);
        }
        trace!(count, live = self.particles.len(), "particle burst");
        count
    }

    /// Moves every particle by `dt` seconds, fades it and drops the expired.
    pub fn advance(&mut self, dt: f32) {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        for particle in &mut self.particles {
            particle.position += Vec2::from_angle(particle.angle) * particle.velocity * dt;
            particle.age += dt;
            particle.opacity = (1.0 - particle.age / particle.max_life).clamp(0.0, 1.0);
        }
        self.particles.retain(|particle| !particle.is_expired());
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn clear(&mut self) {
        self.particles.clear();
    }

    /// Longest lifetime a particle can be given.
    pub fn max_lifetime(&self) -> f32 {
        *self.config.lifetime.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn system() -> ParticleEffectSystem {
        ParticleEffectSystem::new(ParticleConfig {
            seed: Some(7),
            ..ParticleConfig::default()
        })
    }

    #[test]
    fn burst_size_stays_in_configured_range() {
        let mut particles = system();
        for _ in 0..20 {
            let before = particles.len();
            let spawned = particles.spawn_burst(Vec2::ZERO, Rgb::WHITE);
            assert!((20..=30).contains(&spawned));
            assert_eq!(particles.len(), before + spawned);
        }
    }

    #[test]
    fn spawned_particles_respect_ranges() {
        let mut particles = system();
        particles.spawn_burst(Vec2::ZERO, Rgb::WHITE);
        for p in particles.particles() {
            assert!((0.6..=1.8).contains(&p.velocity));
            assert!((0.02..=0.06).contains(&p.radius));
            assert!((1.0..=2.0).contains(&p.max_life));
            assert!((0.0..TAU).contains(&p.angle));
        }
    }

    #[test]
    fn burst_returns_to_baseline_after_max_life() {
        let mut particles = system();
        let baseline = particles.len();
        particles.spawn_burst(Vec2::ZERO, Rgb::WHITE);

        let step = 1.0 / 60.0;
        let mut elapsed = 0.0;
        while elapsed <= particles.max_lifetime() + step {
            particles.advance(step);
            elapsed += step;
            assert!(particles.particles().iter().all(|p| p.age < p.max_life));
        }
        assert_eq!(particles.len(), baseline);
    }

    #[test]
    fn particles_move_along_their_angle_and_fade() {
        let mut particles = system();
        particles.spawn_burst(Vec2::new(0.5, 0.5), Rgb::WHITE);
        let before = particles.particles()[0];

        particles.advance(0.5);
        let after = particles.particles()[0];
        let expected = before.position + Vec2::from_angle(before.angle) * before.velocity * 0.5;
        assert!(after.position.distance(expected) < 1e-5);
        assert!((after.opacity - (1.0 - 0.5 / before.max_life)).abs() < 1e-5);
    }

    #[test]
    fn cull_is_driven_by_time_not_frame_count() {
        let mut coarse = system();
        let mut fine = system();
        coarse.spawn_burst(Vec2::ZERO, Rgb::WHITE);
        fine.spawn_burst(Vec2::ZERO, Rgb::WHITE);

        coarse.advance(0.9);
        for _ in 0..9 {
            fine.advance(0.1);
        }
        assert_eq!(coarse.len(), fine.len());
    }
}
