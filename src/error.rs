//! Custom error types for the camera coordinator.
//!
//! This module defines the primary error type, `CameraError`, for the entire
//! crate. Using the `thiserror` crate, it provides a centralized and
//! consistent way to surface the failure taxonomy of the coordinator:
//!
//! - **`PermissionDenied`**: the platform refused camera access. Permanent
//!   from the coordinator's point of view; requires user action, so it is
//!   surfaced immediately without retries.
//! - **`HardwareUnavailable`**: the device could not be opened or failed
//!   mid-operation. Usually transient and subject to the retry policy.
//! - **`InitializationTimeout`**: a hardware open exceeded its deadline.
//!   Treated like a transient open failure and retried.
//! - **`Superseded`**: a queued mode-switch request was displaced by a newer
//!   one before it started. This is a benign short-circuit, not a failure;
//!   consumers should treat it as "your intent was overtaken".
//! - **`Shutdown`**: the coordinator worker is gone; no further requests can
//!   be served.
//! - **`Config`**: wraps errors from the `config` crate when loading
//!   settings files.
//!
//! All variants are `Clone` so a single failure can resolve every waiter
//! coalesced into the same hardware cycle.

use thiserror::Error;

/// Convenience alias for results using the crate error type.
pub type CamResult<T> = std::result::Result<T, CameraError>;

/// Primary error type for camera coordination.
#[derive(Error, Debug, Clone)]
pub enum CameraError {
    /// Camera access was denied by the platform. Retrying cannot help;
    /// the user must grant permission outside this component.
    #[error("Camera permission denied")]
    PermissionDenied,

    /// The hardware could not be opened or stopped responding.
    #[error("Camera hardware unavailable: {0}")]
    HardwareUnavailable(String),

    /// A hardware open call exceeded the configured deadline.
    #[error("Camera initialization timed out after {0:?}")]
    InitializationTimeout(std::time::Duration),

    /// The request was displaced by a newer mode-switch request before it
    /// started executing. Benign; only the caller's final intent is honored.
    #[error("Request superseded by a newer mode-switch request")]
    Superseded,

    /// The coordinator has been shut down and no longer accepts requests.
    #[error("Camera coordinator is shut down")]
    Shutdown,

    /// Settings file parsing failed.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<config::ConfigError> for CameraError {
    fn from(err: config::ConfigError) -> Self {
        CameraError::Config(err.to_string())
    }
}

impl CameraError {
    /// Whether the retry policy may attempt the operation again.
    ///
    /// Permission and configuration failures are permanent; hardware and
    /// timeout failures are transient. `Superseded` and `Shutdown` are
    /// control-flow outcomes, never retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CameraError::HardwareUnavailable(_) | CameraError::InitializationTimeout(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_error_display() {
        let err = CameraError::HardwareUnavailable("device busy".to_string());
        assert_eq!(err.to_string(), "Camera hardware unavailable: device busy");
    }

    #[test]
    fn test_timeout_display_mentions_duration() {
        let err = CameraError::InitializationTimeout(Duration::from_secs(10));
        assert!(err.to_string().contains("10s"));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(CameraError::HardwareUnavailable("x".into()).is_retryable());
        assert!(CameraError::InitializationTimeout(Duration::from_millis(1)).is_retryable());
        assert!(!CameraError::PermissionDenied.is_retryable());
        assert!(!CameraError::Superseded.is_retryable());
        assert!(!CameraError::Shutdown.is_retryable());
        assert!(!CameraError::Config("bad".into()).is_retryable());
    }
}
