//! Particle system configuration.
//!
//! Configure with the builder methods or load a TOML file:
//!
//! ```toml
//! device = "cpu"
//! max_particles = 1024
//! seed = 1
//!
//! [spawn]
//! cluster_scale = 7.0
//! velo_factor = 40.0
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::device::DeviceClass;
use crate::error::{RainError, Result};
use crate::spawn::SpawnParams;

/// Spawn tuning, grouped under `[spawn]` in TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnConfig {
    pub cluster_scale: f32,
    pub velo_factor: f32,
    pub spawn_floor: f32,
    pub max_spawn_retries: u32,
}

impl Default for SpawnConfig {
    fn default() -> Self {
        let p = SpawnParams::default();
        Self {
            cluster_scale: p.cluster_scale,
            velo_factor: p.velo_factor,
            spawn_floor: p.spawn_floor,
            max_spawn_retries: p.max_spawn_retries,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RainConfig {
    pub device: DeviceClass,
    pub max_particles: u32,
    pub seed: u64,
    pub spawn: SpawnConfig,
    /// Optional kernel source overriding the built-in one.
    pub kernel_path: Option<String>,
}

impl Default for RainConfig {
    fn default() -> Self {
        Self {
            device: DeviceClass::Gpu,
            max_particles: 65_536,
            seed: 1,
            spawn: SpawnConfig::default(),
            kernel_path: None,
        }
    }
}

impl RainConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_device(mut self, device: DeviceClass) -> Self {
        self.device = device;
        self
    }

    pub fn with_max_particles(mut self, count: u32) -> Self {
        self.max_particles = count;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Side length of the spawn volume around the eye.
    pub fn with_cluster_scale(mut self, scale: f32) -> Self {
        self.spawn.cluster_scale = scale;
        self
    }

    pub fn with_velo_factor(mut self, factor: f32) -> Self {
        self.spawn.velo_factor = factor;
        self
    }

    pub fn with_kernel_path(mut self, path: impl Into<String>) -> Self {
        self.kernel_path = Some(path.into());
        self
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| RainError::io(path, e))?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_particles == 0 {
            return Err(RainError::InvalidConfig("max_particles must be at least 1".into()));
        }
        if !(self.spawn.cluster_scale > 0.0) {
            return Err(RainError::InvalidConfig(format!(
                "cluster_scale must be positive, got {}",
                self.spawn.cluster_scale
            )));
        }
        if !(self.spawn.spawn_floor >= 0.0 && self.spawn.spawn_floor < self.spawn.cluster_scale) {
            return Err(RainError::InvalidConfig(format!(
                "spawn_floor must lie in [0, cluster_scale), got {}",
                self.spawn.spawn_floor
            )));
        }
        if self.spawn.max_spawn_retries == 0 {
            return Err(RainError::InvalidConfig("max_spawn_retries must be at least 1".into()));
        }
        Ok(())
    }

    pub fn spawn_params(&self) -> SpawnParams {
        SpawnParams {
            max_particles: self.max_particles,
            cluster_scale: self.spawn.cluster_scale,
            velo_factor: self.spawn.velo_factor,
            spawn_floor: self.spawn.spawn_floor,
            seed: self.seed,
            max_spawn_retries: self.spawn.max_spawn_retries,
        }
    }
}
