//! Ping-pong flock driver

use super::{Boid, BoidBehavior, BoidParams, Flocking};
use crate::device::{dispatch_chunks_mut, DispatchMode, LANES_PER_BLOCK};
use crate::error::SetupError;
use crate::grid::GridLayout;
use crate::math::DeterministicRng;
use crate::query::GridQuery;
use crate::sort::SpatialSorter;
use gridsort_metrics::{time_stage, PassProfiler};
use tracing::{debug, info};

/// A flock, its sorter and its steering kernel.
///
/// `boids` is authoritative between ticks. A tick sorts it into `sorted`,
/// then steering reads `sorted` and overwrites `boids`, so no kernel ever
/// reads the buffer it writes.
pub struct BoidSimulation<B: BoidBehavior = Flocking> {
    params: BoidParams,
    behavior: B,
    sorter: SpatialSorter,
    boids: Vec<Boid>,
    sorted: Vec<Boid>,
    mode: DispatchMode,
    ticks: u64,
    profiler: PassProfiler,
}

impl BoidSimulation<Flocking> {
    /// Seeded flock steered by [`Flocking`].
    pub fn new(params: BoidParams, mode: DispatchMode) -> Result<Self, SetupError> {
        let behavior = Flocking::from_params(&params);
        Self::with_behavior(params, behavior, mode)
    }
}

impl<B: BoidBehavior> BoidSimulation<B> {
    /// Seeded flock of `params.count` boids.
    pub fn with_behavior(
        params: BoidParams,
        behavior: B,
        mode: DispatchMode,
    ) -> Result<Self, SetupError> {
        let boids = seed_flock(&params);
        Self::from_boids(params, behavior, boids, mode)
    }

    /// Start from an explicit population. `params.count` is replaced by its
    /// length.
    pub fn from_boids(
        mut params: BoidParams,
        behavior: B,
        boids: Vec<Boid>,
        mode: DispatchMode,
    ) -> Result<Self, SetupError> {
        params.count = boids.len();
        let grid =
            GridLayout::from_bounds(params.bounds(), params.visual_range, params.grid_cell_scale)?;
        let sorter = SpatialSorter::new(grid, params.count, mode)?;
        info!(boids = params.count, ?mode, "boid simulation ready");

        Ok(Self {
            sorted: vec![Boid::default(); boids.len()],
            boids,
            params,
            behavior,
            sorter,
            mode,
            ticks: 0,
            profiler: PassProfiler::new(),
        })
    }

    /// One sort pass followed by one steering pass.
    pub fn tick(&mut self, dt: f32) -> Result<(), SetupError> {
        let grid = *self.sorter.grid();
        let spans = self.sorter.sort(&self.boids, &mut self.sorted)?;
        let flock = GridQuery::new(&grid, &self.sorted, spans);
        let behavior = &self.behavior;
        let sorted = &self.sorted;

        time_stage!(self.profiler, "steer", {
            dispatch_chunks_mut(self.mode, &mut self.boids, LANES_PER_BLOCK, |block, out| {
                let base = block * LANES_PER_BLOCK;
                for (lane, slot) in out.iter_mut().enumerate() {
                    *slot = behavior.step(&sorted[base + lane], &flock, dt);
                }
            });
        });

        self.ticks += 1;
        debug!(tick = self.ticks, "boid tick");
        Ok(())
    }

    #[inline]
    pub fn boids(&self) -> &[Boid] {
        &self.boids
    }

    #[inline]
    pub fn params(&self) -> &BoidParams {
        &self.params
    }

    #[inline]
    pub fn grid(&self) -> &GridLayout {
        self.sorter.grid()
    }

    #[inline]
    pub fn sorter(&self) -> &SpatialSorter {
        &self.sorter
    }

    #[inline]
    pub fn sorter_mut(&mut self) -> &mut SpatialSorter {
        &mut self.sorter
    }

    #[inline]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Steering stage timings.
    #[inline]
    pub fn profiler(&self) -> &PassProfiler {
        &self.profiler
    }

    #[inline]
    pub fn profiler_mut(&mut self) -> &mut PassProfiler {
        &mut self.profiler
    }
}

/// Positions inside 90% of the bounds, velocities of random direction with a
/// magnitude drawn from the speed band.
pub fn seed_flock(params: &BoidParams) -> Vec<Boid> {
    let mut rng = DeterministicRng::new(params.seed);
    let extent = params.bounds() * 0.9;
    (0..params.count)
        .map(|_| {
            let position = rng.next_in_box(extent);
            let speed = rng.next_range(params.min_speed, params.max_speed);
            Boid::new(position, rng.next_in_unit_sphere() * speed)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_params() -> BoidParams {
        BoidParams {
            count: 600,
            grid_bounds: [3.0; 3],
            ..BoidParams::default()
        }
    }

    #[test]
    fn test_seed_stays_inside_bounds() {
        let params = small_params();
        let flock = seed_flock(&params);
        assert_eq!(flock.len(), 600);
        for boid in &flock {
            assert!(boid.position.abs().cmple(params.bounds() * 0.9).all());
            assert!(boid.velocity.length() <= params.max_speed + 1e-4);
        }
    }

    #[test]
    fn test_tick_keeps_population() {
        let mut sim = BoidSimulation::new(small_params(), DispatchMode::Parallel).unwrap();
        for _ in 0..5 {
            sim.tick(1.0 / 60.0).unwrap();
        }
        assert_eq!(sim.ticks(), 5);
        assert_eq!(sim.boids().len(), 600);
        assert_eq!(sim.sorter().spans().total(), 600);
        assert!(sim.boids().iter().all(|b| b.position.is_finite() && b.velocity.is_finite()));
    }

    #[test]
    fn test_sequential_replays_exactly() {
        let run = || {
            let mut sim = BoidSimulation::new(small_params(), DispatchMode::Sequential).unwrap();
            for _ in 0..3 {
                sim.tick(1.0 / 60.0).unwrap();
            }
            sim.boids().to_vec()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_explicit_population() {
        let boids = vec![Boid::new(glam::Vec3::ZERO, glam::Vec3::X); 3];
        let sim = BoidSimulation::from_boids(
            BoidParams::default(),
            Flocking::default(),
            boids,
            DispatchMode::Parallel,
        )
        .unwrap();
        assert_eq!(sim.params().count, 3);
        assert_eq!(sim.grid().dims(), glam::UVec3::splat(42));
    }
}
