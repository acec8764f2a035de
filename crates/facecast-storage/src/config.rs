//! Storage configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Default artifact lifetime (24 hours).
pub const DEFAULT_ARTIFACT_TTL_SECS: u64 = 86_400;

/// Default interval between expiry sweeps (5 minutes).
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 300;

/// Where inputs and outputs live, and how long outputs are kept.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Scratch namespace for uploaded inputs.
    pub scratch_dir: PathBuf,
    /// Public namespace for finished artifacts.
    pub public_dir: PathBuf,
    /// How long a published artifact is kept.
    pub artifact_ttl: Duration,
    /// How often the expiry sweeper runs.
    pub sweep_interval: Duration,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            scratch_dir: PathBuf::from("./uploads"),
            public_dir: PathBuf::from("./public"),
            artifact_ttl: Duration::from_secs(DEFAULT_ARTIFACT_TTL_SECS),
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
        }
    }
}

impl StorageConfig {
    /// Load from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            scratch_dir: std::env::var("SCRATCH_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.scratch_dir),
            public_dir: std::env::var("PUBLIC_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.public_dir),
            artifact_ttl: Duration::from_secs(
                std::env::var("ARTIFACT_TTL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .filter(|s| *s > 0)
                    .unwrap_or(DEFAULT_ARTIFACT_TTL_SECS),
            ),
            sweep_interval: Duration::from_secs(
                std::env::var("SWEEP_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .filter(|s| *s > 0)
                    .unwrap_or(DEFAULT_SWEEP_INTERVAL_SECS),
            ),
        }
    }
}
