//! gridsort runtime
//!
//! Runs the boid flock for a fixed number of ticks, then extracts the
//! terrain chunk, reporting per-stage timings. With the GPU device every
//! pass is repeated on the adapter and compared against the CPU result.

mod settings;

use anyhow::{Context, Result};
use gridsort_core::boids::BoidSimulation;
use gridsort_core::terrain::TerrainExtractor;
use gridsort_core::time::SimulationTime;
use gridsort_gpu::{GpuBoidGrid, GpuCellCompactor, GpuContext};
use gridsort_metrics::{EventCounter, PassProfiler, TickTimer};
use settings::{DeviceKind, Settings};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("gridsort v{}", gridsort_core::VERSION);
    let settings = Settings::from_args(std::env::args().skip(1));

    let gpu = match settings.run.device {
        DeviceKind::Cpu => None,
        DeviceKind::Gpu => match GpuContext::new_headless() {
            Ok(ctx) => Some(ctx),
            Err(e) => {
                warn!(error = %e, "GPU unavailable, running on the CPU device only");
                None
            }
        },
    };

    run_boids(&settings, gpu.as_ref())?;
    run_terrain(&settings, gpu.as_ref())?;
    Ok(())
}

fn run_boids(settings: &Settings, gpu: Option<&GpuContext>) -> Result<()> {
    let mut sim = BoidSimulation::new(settings.boids.clone(), settings.run.dispatch)
        .context("boid setup")?;
    let device_grid = gpu
        .map(|ctx| GpuBoidGrid::new(ctx, *sim.grid(), sim.boids().len()))
        .transpose()
        .context("device boid grid setup")?;

    let interval = settings.run.report_interval.max(1);
    let mut time = SimulationTime::new();
    let mut timer = TickTimer::new(interval as usize);
    let mut events = EventCounter::new();

    for _ in 0..settings.run.ticks {
        // The device sorts the same state the CPU tick is about to sort.
        let device_sort = match (gpu, &device_grid) {
            (Some(ctx), Some(grid)) => Some(grid.sort(ctx, sim.boids())?),
            _ => None,
        };

        let dt = time.advance_tick();
        timer.begin();
        sim.tick(dt)?;
        timer.end();
        events.add("clamped_keys", u64::from(sim.sorter().clamped_last_pass()));

        if let Some(device_sort) = device_sort {
            if device_sort.offsets.as_slice() != sim.sorter().spans().offsets() {
                events.add("device_mismatches", 1);
            }
        }

        if time.tick_count() % interval == 0 {
            let (min, max) = timer.tick_time_range_ms();
            info!(
                tick = time.tick_count(),
                avg_ms = %format!("{:.3}", timer.tick_time_ms()),
                min_ms = %format!("{min:.3}"),
                max_ms = %format!("{max:.3}"),
                tps = %format!("{:.1}", timer.ticks_per_second()),
                "boids"
            );
            let clamped = events.take("clamped_keys");
            if clamped > 0 {
                warn!(
                    clamped,
                    ticks = interval,
                    "boids outside the grid were clamped into boundary cells"
                );
            }
            let mismatches = events.take("device_mismatches");
            if mismatches > 0 {
                warn!(
                    mismatches,
                    ticks = interval,
                    "device bucket offsets differ from the CPU device"
                );
            }
        }
    }

    info!(
        ticks = time.tick_count(),
        simulated_s = %format!("{:.2}", time.total_time().as_secs_f32()),
        "flock finished"
    );
    report_stages("boid tick", sim.profiler());
    report_stages("boid sort", sim.sorter().profiler());
    Ok(())
}

fn run_terrain(settings: &Settings, gpu: Option<&GpuContext>) -> Result<()> {
    let params = settings.terrain.clone();
    let mut extractor = TerrainExtractor::new(params.clone(), settings.run.dispatch)
        .context("terrain setup")?;

    for pass in 0..settings.run.terrain_passes.max(1) {
        let mesh = extractor.extract_configured()?;
        let args = mesh.args();
        debug!(pass, triangles = mesh.triangle_count(), "terrain pass");
        if pass == 0 {
            info!(
                vertices = mesh.vertices().len(),
                triangles = mesh.triangle_count(),
                index_count_per_instance = args.index_count_per_instance,
                instance_count = args.instance_count,
                draw_mode = ?params.draw_mode,
                "terrain chunk extracted"
            );
        }
    }

    if let Some(ctx) = gpu {
        let device =
            GpuCellCompactor::new(ctx, params.chunk_size, params.iso_level, params.draw_mode)
                .context("device compactor setup")?;
        let compaction = device.compact(ctx, extractor.volume())?;
        let expected = extractor.mesh().args();
        if compaction.args == expected && compaction.total == extractor.compactor().total() {
            info!(
                instance_count = compaction.args.instance_count,
                "device draw args match the CPU device"
            );
        } else {
            warn!(
                device = ?compaction.args,
                cpu = ?expected,
                "device draw args differ from the CPU device"
            );
        }
    }

    report_stages("terrain", extractor.profiler());
    Ok(())
}

fn report_stages(pass: &str, profiler: &PassProfiler) {
    for (stage, timing) in profiler.stages() {
        info!(
            pass,
            stage,
            calls = timing.calls,
            avg_us = timing.average().as_micros() as u64,
            "stage timing"
        );
    }
}
