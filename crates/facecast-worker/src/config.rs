//! Worker configuration.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use facecast_models::EncodingConfig;

/// Which renderer jobs are sent to. Chosen once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Local,
    Remote,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Local => "local",
            BackendKind::Remote => "remote",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" | "ffmpeg" => Ok(BackendKind::Local),
            "remote" | "generative" => Ok(BackendKind::Remote),
            other => Err(format!("Unknown render backend '{}'", other)),
        }
    }
}

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Renderer used for new jobs
    pub backend: BackendKind,
    /// Wall-clock bound for one sub-job
    pub render_timeout: Duration,
    /// Run the layouts of a job concurrently instead of one after another
    pub parallel_layouts: bool,
    /// Output encoding
    pub encoding: EncodingConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Local,
            render_timeout: Duration::from_secs(900),
            parallel_layouts: true,
            encoding: EncodingConfig::default(),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let backend = match std::env::var("RENDER_BACKEND") {
            Ok(value) => value.parse().unwrap_or_else(|e| {
                tracing::warn!("{}, falling back to local", e);
                BackendKind::Local
            }),
            Err(_) => BackendKind::Local,
        };

        Self {
            backend,
            render_timeout: Duration::from_secs(
                std::env::var("RENDER_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .filter(|s: &u64| *s > 0)
                    .unwrap_or(900),
            ),
            parallel_layouts: std::env::var("RENDER_PARALLEL_LAYOUTS")
                .map(|v| !matches!(v.trim().to_ascii_lowercase().as_str(), "false" | "0" | "no"))
                .unwrap_or(true),
            encoding: EncodingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_backend_kind_parse() {
        assert_eq!("local".parse::<BackendKind>().unwrap(), BackendKind::Local);
        assert_eq!("Remote".parse::<BackendKind>().unwrap(), BackendKind::Remote);
        assert!("gpu".parse::<BackendKind>().is_err());
    }

    #[test]
    #[serial]
    fn test_from_env() {
        std::env::set_var("RENDER_BACKEND", "remote");
        std::env::set_var("RENDER_TIMEOUT_SECS", "30");
        std::env::set_var("RENDER_PARALLEL_LAYOUTS", "false");

        let config = WorkerConfig::from_env();
        assert_eq!(config.backend, BackendKind::Remote);
        assert_eq!(config.render_timeout, Duration::from_secs(30));
        assert!(!config.parallel_layouts);

        std::env::remove_var("RENDER_BACKEND");
        std::env::remove_var("RENDER_TIMEOUT_SECS");
        std::env::remove_var("RENDER_PARALLEL_LAYOUTS");

        let config = WorkerConfig::from_env();
        assert_eq!(config.backend, BackendKind::Local);
        assert_eq!(config.render_timeout, Duration::from_secs(900));
        assert!(config.parallel_layouts);
    }
}
