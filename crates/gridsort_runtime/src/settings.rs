//! Run settings
//!
//! Every section defaults, so a settings file only names what it changes.

use anyhow::{Context, Result};
use gridsort_core::boids::BoidParams;
use gridsort_core::terrain::TerrainParams;
use gridsort_core::DispatchMode;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub run: RunSettings,
    pub boids: BoidParams,
    pub terrain: TerrainParams,
}

/// Which device runs the passes. `Gpu` also runs the CPU device and
/// compares the two.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    #[default]
    Cpu,
    Gpu,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    pub ticks: u64,
    pub dispatch: DispatchMode,
    pub device: DeviceKind,
    /// Ticks between timing reports.
    pub report_interval: u64,
    pub terrain_passes: u32,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            ticks: 600,
            dispatch: DispatchMode::Parallel,
            device: DeviceKind::Cpu,
            report_interval: 120,
            terrain_passes: 4,
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Settings from the first argument, or defaults when there is none or
    /// it cannot be read.
    pub fn from_args(mut args: impl Iterator<Item = String>) -> Self {
        let Some(path) = args.next() else {
            info!("no settings file given, using defaults");
            return Self::default();
        };
        match Self::load(Path::new(&path)) {
            Ok(settings) => {
                info!(path = %path, "settings loaded");
                settings
            }
            Err(e) => {
                warn!(error = %format!("{e:#}"), "falling back to default settings");
                Self::default()
            }
        }
    }
}
