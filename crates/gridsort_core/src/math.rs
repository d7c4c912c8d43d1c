//! Deterministic math utilities
//!
//! Re-exports glam with the seeded generator used to lay out initial boid
//! populations. Same seed, same flock.

pub use glam::*;

/// Seeded linear congruential generator.
///
/// Not statistically strong, but bit-for-bit reproducible across platforms,
/// which is what replayable passes need.
#[derive(Debug, Clone)]
pub struct DeterministicRng {
    seed: u64,
    state: u64,
}

impl DeterministicRng {
    pub fn new(seed: u64) -> Self {
        Self { seed, state: seed }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Rewind to the initial seed.
    pub fn reset(&mut self) {
        self.state = self.seed;
    }

    pub fn next_u32(&mut self) -> u32 {
        // LCG constants (Numerical Recipes)
        const A: u64 = 1664525;
        const C: u64 = 1013904223;
        const M: u64 = 1u64 << 32;

        self.state = (A.wrapping_mul(self.state).wrapping_add(C)) % M;
        self.state as u32
    }

    /// Uniform in `[0, 1]`.
    pub fn next_f32(&mut self) -> f32 {
        self.next_u32() as f32 / u32::MAX as f32
    }

    /// Uniform in `[min, max]`.
    pub fn next_range(&mut self, min: f32, max: f32) -> f32 {
        min + (max - min) * self.next_f32()
    }

    /// Uniform inside the axis-aligned box `[-extent, extent]`.
    pub fn next_in_box(&mut self, extent: Vec3) -> Vec3 {
        Vec3::new(
            self.next_range(-extent.x, extent.x),
            self.next_range(-extent.y, extent.y),
            self.next_range(-extent.z, extent.z),
        )
    }

    /// Uniform inside the unit sphere, by rejection.
    pub fn next_in_unit_sphere(&mut self) -> Vec3 {
        loop {
            let candidate = self.next_in_box(Vec3::ONE);
            if candidate.length_squared() <= 1.0 {
                return candidate;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = DeterministicRng::new(7);
        let mut b = DeterministicRng::new(7);
        for _ in 0..100 {
            assert_eq!(a.next_u32(), b.next_u32());
        }
        a.reset();
        let mut c = DeterministicRng::new(7);
        assert_eq!(a.next_u32(), c.next_u32());
    }

    #[test]
    fn test_ranges_hold() {
        let mut rng = DeterministicRng::new(42);
        for _ in 0..1000 {
            let x = rng.next_range(-2.0, 3.0);
            assert!((-2.0..=3.0).contains(&x));
            assert!(rng.next_in_unit_sphere().length() <= 1.0 + 1e-6);
            let p = rng.next_in_box(Vec3::new(1.0, 2.0, 3.0));
            assert!(p.abs().cmple(Vec3::new(1.0, 2.0, 3.0)).all());
        }
    }
}
