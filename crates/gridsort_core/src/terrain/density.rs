//! Density fields and the sampled lattice
//!
//! Densities are positive inside solid ground. The lattice holds one sample
//! per cell corner, `chunk_size + 1` per axis.

use crate::device::{dispatch_chunks_mut, DispatchMode, LANES_PER_BLOCK};
use glam::{UVec3, Vec3};
use serde::{Deserialize, Serialize};

/// Pure per-point density function.
pub trait DensityField: Send + Sync {
    fn density(&self, position: Vec3) -> f32;
}

impl<F> DensityField for F
where
    F: Fn(Vec3) -> f32 + Send + Sync,
{
    #[inline]
    fn density(&self, position: Vec3) -> f32 {
        self(position)
    }
}

/// Solid ball.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SphereField {
    pub center: [f32; 3],
    pub radius: f32,
}

impl DensityField for SphereField {
    #[inline]
    fn density(&self, position: Vec3) -> f32 {
        self.radius - position.distance(Vec3::from_array(self.center))
    }
}

/// Ground plane at `height` perturbed by sine octaves.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayeredField {
    pub height: f32,
    pub amplitude: f32,
    pub frequency: f32,
    pub octaves: u32,
    /// Amplitude multiplier between octaves.
    pub gain: f32,
}

impl Default for LayeredField {
    fn default() -> Self {
        Self {
            height: 16.0,
            amplitude: 6.0,
            frequency: 0.08,
            octaves: 4,
            gain: 0.5,
        }
    }
}

impl DensityField for LayeredField {
    fn density(&self, position: Vec3) -> f32 {
        let mut density = self.height - position.y;
        let mut amplitude = self.amplitude;
        let mut frequency = self.frequency;
        for octave in 0..self.octaves {
            let phase = octave as f32 * 1.7;
            density += amplitude
                * (position.x * frequency + phase).sin()
                * (position.z * frequency - phase).cos();
            amplitude *= self.gain;
            frequency *= 2.0;
        }
        density
    }
}

/// Field selected from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldConfig {
    Layered(LayeredField),
    Sphere(SphereField),
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self::Layered(LayeredField::default())
    }
}

impl DensityField for FieldConfig {
    #[inline]
    fn density(&self, position: Vec3) -> f32 {
        match self {
            Self::Layered(field) => field.density(position),
            Self::Sphere(field) => field.density(position),
        }
    }
}

/// Cubic lattice of density samples, index `x + dim * (y + dim * z)`.
#[derive(Debug, Clone)]
pub struct DensityVolume {
    dim: u32,
    values: Box<[f32]>,
}

impl DensityVolume {
    pub fn new(dim: u32) -> Self {
        let len = (dim as usize).pow(3);
        Self {
            dim,
            values: vec![0.0; len].into_boxed_slice(),
        }
    }

    /// Wrap precomputed samples. `None` when the length is not `dim³`.
    pub fn from_values(dim: u32, values: Vec<f32>) -> Option<Self> {
        (values.len() == (dim as usize).pow(3)).then(|| Self {
            dim,
            values: values.into_boxed_slice(),
        })
    }

    #[inline]
    pub fn dim(&self) -> u32 {
        self.dim
    }

    #[inline]
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    #[inline]
    pub fn index(&self, p: UVec3) -> usize {
        (p.x + self.dim * (p.y + self.dim * p.z)) as usize
    }

    #[inline]
    pub fn get(&self, p: UVec3) -> f32 {
        self.values[self.index(p)]
    }

    /// Fill the lattice from `field`. Lattice point `p` sits at
    /// `origin + p * spacing`.
    pub fn sample<F: DensityField>(
        &mut self,
        mode: DispatchMode,
        field: &F,
        origin: Vec3,
        spacing: f32,
    ) {
        let dim = self.dim as usize;
        dispatch_chunks_mut(mode, &mut self.values, LANES_PER_BLOCK, |block, out| {
            let base = block * LANES_PER_BLOCK;
            for (lane, value) in out.iter_mut().enumerate() {
                let i = base + lane;
                let p = Vec3::new(
                    (i % dim) as f32,
                    ((i / dim) % dim) as f32,
                    (i / (dim * dim)) as f32,
                );
                *value = field.density(origin + p * spacing);
            }
        });
    }

    /// Central-difference gradient, one-sided at the lattice border.
    pub fn gradient(&self, p: UVec3) -> Vec3 {
        let max = self.dim - 1;
        let axis = |step: UVec3, coord: u32| {
            let lo = if coord > 0 { p - step } else { p };
            let hi = if coord < max { p + step } else { p };
            let span = (hi - lo).element_sum().max(1) as f32;
            (self.get(hi) - self.get(lo)) / span
        };
        Vec3::new(axis(UVec3::X, p.x), axis(UVec3::Y, p.y), axis(UVec3::Z, p.z))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_layout() {
        let mut volume = DensityVolume::new(3);
        let field = |p: Vec3| p.x + 10.0 * p.y + 100.0 * p.z;
        volume.sample(DispatchMode::Parallel, &field, Vec3::ZERO, 1.0);
        assert_eq!(volume.get(UVec3::new(2, 1, 0)), 12.0);
        assert_eq!(volume.get(UVec3::new(0, 2, 2)), 220.0);
        assert_eq!(volume.index(UVec3::new(1, 1, 1)), 13);
    }

    #[test]
    fn test_gradient_of_linear_field() {
        let mut volume = DensityVolume::new(4);
        volume.sample(DispatchMode::Sequential, &|p: Vec3| 2.0 * p.x - p.z, Vec3::ZERO, 1.0);
        for p in [UVec3::ZERO, UVec3::ONE, UVec3::splat(3)] {
            let g = volume.gradient(p);
            assert!((g - Vec3::new(2.0, 0.0, -1.0)).length() < 1e-5, "{p}: {g}");
        }
    }

    #[test]
    fn test_fields() {
        let sphere = SphereField {
            center: [1.0, 2.0, 3.0],
            radius: 2.0,
        };
        assert_eq!(sphere.density(Vec3::new(1.0, 2.0, 3.0)), 2.0);
        assert!(sphere.density(Vec3::splat(10.0)) < 0.0);

        let ground = FieldConfig::default();
        assert!(ground.density(Vec3::new(0.0, -20.0, 0.0)) > 0.0);
        assert!(ground.density(Vec3::new(0.0, 40.0, 0.0)) < 0.0);
    }

    #[test]
    fn test_from_values_checks_length() {
        assert!(DensityVolume::from_values(2, vec![0.0; 8]).is_some());
        assert!(DensityVolume::from_values(2, vec![0.0; 9]).is_none());
    }
}
