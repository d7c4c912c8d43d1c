// behavior.rs - steering kernels

use super::{Boid, BoidParams};
use crate::query::GridQuery;
use glam::Vec3;

/// Per-boid steering kernel.
///
/// Called once per boid per tick with a query over the sorted flock.
/// Must be a pure function of its inputs: lanes run in any order.
pub trait BoidBehavior: Send + Sync {
    fn step(&self, boid: &Boid, flock: &GridQuery<'_, Boid>, dt: f32) -> Boid;
}

/// Cohesion, separation and alignment with a speed band and soft walls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Flocking {
    pub min_speed: f32,
    pub max_speed: f32,
    pub turn_speed: f32,
    pub cohesion: f32,
    pub separation: f32,
    pub alignment: f32,
    pub visual_range: f32,
    pub min_distance: f32,
    pub bounds: Vec3,
}

impl Flocking {
    pub fn from_params(params: &BoidParams) -> Self {
        Self {
            min_speed: params.min_speed,
            max_speed: params.max_speed,
            turn_speed: params.turn_speed,
            cohesion: params.cohesion_factor,
            separation: params.separation_factor,
            alignment: params.alignment_factor,
            visual_range: params.visual_range,
            min_distance: params.min_distance,
            bounds: params.bounds(),
        }
    }

    fn clamp_speed(&self, velocity: Vec3, fallback: Vec3) -> Vec3 {
        let speed = velocity.length();
        if speed > self.max_speed {
            velocity * (self.max_speed / speed)
        } else if speed < self.min_speed {
            if speed > f32::EPSILON {
                velocity * (self.min_speed / speed)
            } else {
                fallback.normalize_or(Vec3::X) * self.min_speed
            }
        } else {
            velocity
        }
    }
}

impl Default for Flocking {
    fn default() -> Self {
        Self::from_params(&BoidParams::default())
    }
}

impl BoidBehavior for Flocking {
    fn step(&self, boid: &Boid, flock: &GridQuery<'_, Boid>, dt: f32) -> Boid {
        let visual_sq = self.visual_range * self.visual_range;
        let min_distance_sq = self.min_distance * self.min_distance;

        let mut center = Vec3::ZERO;
        let mut heading = Vec3::ZERO;
        let mut push = Vec3::ZERO;
        let mut seen = 0u32;

        for other in flock.neighbors(boid.position) {
            let offset = other.position - boid.position;
            let dist_sq = offset.length_squared();
            // Zero distance is the boid itself.
            if dist_sq == 0.0 || dist_sq > visual_sq {
                continue;
            }
            center += other.position;
            heading += other.velocity;
            seen += 1;
            if dist_sq < min_distance_sq {
                let dist = dist_sq.sqrt();
                push -= offset / dist * (1.0 - dist / self.min_distance);
            }
        }

        let mut velocity = boid.velocity;
        if seen > 0 {
            let inv = 1.0 / seen as f32;
            velocity += (center * inv - boid.position) * (self.cohesion * dt);
            velocity += (heading * inv - boid.velocity) * (self.alignment * dt);
        }
        velocity += push * (self.separation * dt);

        // Soft walls: steer back once past the bounds.
        let outside_high = boid.position.cmpgt(self.bounds);
        let outside_low = boid.position.cmplt(-self.bounds);
        let turn = Vec3::select(outside_high, Vec3::splat(-1.0), Vec3::ZERO)
            + Vec3::select(outside_low, Vec3::ONE, Vec3::ZERO);
        velocity += turn * (self.turn_speed * dt);

        let velocity = self.clamp_speed(velocity, boid.velocity);
        Boid::new(boid.position + velocity * dt, velocity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DispatchMode;
    use crate::grid::GridLayout;
    use crate::sort::SpatialSorter;

    fn step_all(behavior: &Flocking, boids: &[Boid], dt: f32) -> Vec<Boid> {
        let grid = GridLayout::from_bounds(behavior.bounds, behavior.visual_range, 1.0).unwrap();
        let mut sorter = SpatialSorter::new(grid, boids.len(), DispatchMode::Sequential).unwrap();
        let mut sorted = vec![Boid::default(); boids.len()];
        let spans = sorter.sort(boids, &mut sorted).unwrap();
        let flock = GridQuery::new(&grid, &sorted, spans);
        sorted.iter().map(|b| behavior.step(b, &flock, dt)).collect()
    }

    #[test]
    fn test_speed_stays_in_band() {
        let behavior = Flocking::default();
        let boids = [
            Boid::new(Vec3::ZERO, Vec3::new(50.0, 0.0, 0.0)),
            Boid::new(Vec3::splat(3.0), Vec3::ZERO),
            Boid::new(Vec3::splat(-3.0), Vec3::new(0.0, 0.01, 0.0)),
        ];
        for boid in step_all(&behavior, &boids, 1.0 / 60.0) {
            let speed = boid.velocity.length();
            assert!(speed >= behavior.min_speed - 1e-4 && speed <= behavior.max_speed + 1e-4);
        }
    }

    #[test]
    fn test_close_pair_separates() {
        let behavior = Flocking {
            cohesion: 0.0,
            alignment: 0.0,
            ..Flocking::default()
        };
        let boids = [
            Boid::new(Vec3::new(-0.05, 0.0, 0.0), Vec3::new(0.0, 0.5, 0.0)),
            Boid::new(Vec3::new(0.05, 0.0, 0.0), Vec3::new(0.0, 0.5, 0.0)),
        ];
        let gap_before = 0.1;
        let next = step_all(&behavior, &boids, 0.1);
        let gap_after = (next[0].position.x - next[1].position.x).abs();
        assert!(gap_after > gap_before);
    }

    #[test]
    fn test_turns_back_outside_bounds() {
        let behavior = Flocking::default();
        let boids = [Boid::new(Vec3::new(10.5, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0))];
        let next = step_all(&behavior, &boids, 0.1);
        assert!(next[0].velocity.x < 1.0);
    }
}
