//! Boid variant: flock steering on top of the spatial sort
//!
//! Each tick sorts the authoritative boid buffer into the scratch buffer,
//! then the steering kernel reads the sorted scratch buffer through a
//! [`GridQuery`](crate::query::GridQuery) and writes the next state back.

mod behavior;
mod simulation;

pub use behavior::{BoidBehavior, Flocking};
pub use simulation::{seed_flock, BoidSimulation};

use crate::counter::SpatialItem;
use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// GPU-layout boid: two padded `vec3`s, 32 bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct Boid {
    pub velocity: Vec3,
    _pad0: f32,
    pub position: Vec3,
    _pad1: f32,
}

impl Boid {
    pub fn new(position: Vec3, velocity: Vec3) -> Self {
        Self {
            velocity,
            _pad0: 0.0,
            position,
            _pad1: 0.0,
        }
    }
}

impl SpatialItem for Boid {
    #[inline]
    fn position(&self) -> Vec3 {
        self.position
    }
}

/// Flock configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoidParams {
    pub count: usize,
    pub min_speed: f32,
    pub max_speed: f32,
    /// Velocity change per second applied while outside the bounds.
    pub turn_speed: f32,
    pub cohesion_factor: f32,
    pub separation_factor: f32,
    pub alignment_factor: f32,
    pub visual_range: f32,
    pub min_distance: f32,
    /// Half extents of the simulated box.
    pub grid_bounds: [f32; 3],
    /// Cell edge as a multiple of `visual_range`.
    pub grid_cell_scale: f32,
    pub seed: u64,
}

impl BoidParams {
    pub fn bounds(&self) -> Vec3 {
        Vec3::from_array(self.grid_bounds)
    }
}

impl Default for BoidParams {
    fn default() -> Self {
        Self {
            count: 5000,
            min_speed: 0.1,
            max_speed: 2.0,
            turn_speed: 1.0,
            cohesion_factor: 2.0,
            separation_factor: 1.0,
            alignment_factor: 5.0,
            visual_range: 0.5,
            min_distance: 0.15,
            grid_bounds: [10.0; 3],
            grid_cell_scale: 1.0,
            seed: 0x5eed,
        }
    }
}
