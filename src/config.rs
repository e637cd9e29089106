//! Configuration management.
//!
//! Settings are layered: built-in defaults, then an optional TOML file,
//! then `CAMCTL_*` environment variables. Durations use humantime strings
//! (`"10s"`, `"200ms"`).

use config::Config;
use serde::Deserialize;
use std::time::Duration;

use crate::error::CamResult;
use crate::recovery::RetryPolicy;

/// Top-level settings tree.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    /// Process-wide knobs.
    pub application: ApplicationSettings,
    /// Camera coordination knobs.
    pub camera: CameraSettings,
}

/// Process-wide knobs.
#[derive(Debug, Deserialize, Clone)]
pub struct ApplicationSettings {
    /// Default tracing filter when `RUST_LOG` is unset.
    pub log_level: String,
    /// Capacity of the state broadcast channel.
    pub state_channel_capacity: usize,
}

/// Camera coordination knobs.
#[derive(Debug, Deserialize, Clone)]
pub struct CameraSettings {
    /// Deadline for a single hardware open call.
    #[serde(with = "humantime_serde")]
    pub open_timeout: Duration,
    /// Open attempts per switch, including the first.
    pub retry_max_attempts: u32,
    /// Backoff after the first failed attempt.
    #[serde(with = "humantime_serde")]
    pub retry_base_delay: Duration,
    /// Backoff multiplier between attempts.
    pub retry_backoff_factor: u32,
}

impl Settings {
    /// Load settings from defaults, an optional TOML file, and environment.
    pub fn new(config_path: Option<&str>) -> CamResult<Self> {
        let mut builder = Config::builder()
            .set_default("application.log_level", "info")?
            .set_default("application.state_channel_capacity", 32i64)?
            .set_default("camera.open_timeout", "10s")?
            .set_default("camera.retry_max_attempts", 3i64)?
            .set_default("camera.retry_base_delay", "200ms")?
            .set_default("camera.retry_backoff_factor", 3i64)?;

        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("CAMCTL")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder.build()?;
        Ok(settings.try_deserialize()?)
    }

    /// The retry policy described by these settings.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.camera.retry_max_attempts,
            base_delay: self.camera.retry_base_delay,
            backoff_factor: self.camera.retry_backoff_factor,
        }
    }

    /// The coordinator constructor arguments described by these settings.
    pub fn coordinator(&self) -> CoordinatorSettings {
        CoordinatorSettings {
            open_timeout: self.camera.open_timeout,
            retry: self.retry_policy(),
            state_channel_capacity: self.application.state_channel_capacity,
        }
    }
}

/// Knobs handed to [`crate::coordinator::CameraCoordinator::new`].
#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    /// Deadline for a single hardware open call.
    pub open_timeout: Duration,
    /// Backoff policy for failed opens.
    pub retry: RetryPolicy,
    /// Capacity of the state broadcast channel.
    pub state_channel_capacity: usize,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            open_timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
            state_channel_capacity: 32,
        }
    }
}
