//! Camera mode/status state machine and published snapshots.
//!
//! The `{mode, status}` pair is the authoritative description of who owns
//! the camera and what the coordinator is doing with it. `CameraState`
//! snapshots are immutable and published in the exact order transitions are
//! applied, so every subscriber reconstructs the same history.
//!
//! Transition table (initial `Uninitialized`, terminal `Disposed`):
//!
//! ```text
//! Uninitialized → Initializing        first acquisition request
//! Initializing  → Ready | Error       open succeeded / retries exhausted
//! Ready         → Switching           different-mode request
//! Switching     → Ready | Error       close-old/open-new outcome
//! Error         → Switching           retry with a previous handle open
//! Error         → Initializing        retry with no previous handle
//! Ready | Error | Uninitialized → Disposed   explicit release
//! Disposed      → Initializing        fresh request re-enters the lifecycle
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which consumer currently owns the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraMode {
    /// Quiescent: no consumer, no open handle.
    None,
    /// QR-code scanning owns the camera.
    QrScanning,
    /// Object-detection (ML) pipeline owns the camera.
    MlDetection,
}

impl std::fmt::Display for CameraMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            CameraMode::None => "none",
            CameraMode::QrScanning => "qr_scanning",
            CameraMode::MlDetection => "ml_detection",
        };
        write!(f, "{}", label)
    }
}

/// Lifecycle phase of the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraStatus {
    /// No handle has ever been opened in this lifecycle.
    Uninitialized,
    /// First open in progress; no previous handle existed.
    Initializing,
    /// Exactly one handle is open and matches the published mode.
    Ready,
    /// Closing the old handle and opening a new one.
    Switching,
    /// The last open cycle failed; waiting for an explicit new request.
    Error,
    /// Released. Re-entered only through a fresh request.
    Disposed,
}

impl std::fmt::Display for CameraStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            CameraStatus::Uninitialized => "uninitialized",
            CameraStatus::Initializing => "initializing",
            CameraStatus::Ready => "ready",
            CameraStatus::Switching => "switching",
            CameraStatus::Error => "error",
            CameraStatus::Disposed => "disposed",
        };
        write!(f, "{}", label)
    }
}

/// Whether `from → to` appears in the fixed transition table.
pub fn transition_allowed(from: CameraStatus, to: CameraStatus) -> bool {
    use CameraStatus::*;
    matches!(
        (from, to),
        (Uninitialized, Initializing)
            | (Initializing, Ready)
            | (Initializing, Error)
            | (Ready, Switching)
            | (Switching, Ready)
            | (Switching, Error)
            | (Error, Switching)
            | (Error, Initializing)
            | (Ready, Disposed)
            | (Error, Disposed)
            | (Uninitialized, Disposed)
            | (Disposed, Initializing)
    )
}

/// Immutable snapshot published on every transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraState {
    /// Current owner of the camera.
    pub mode: CameraMode,
    /// Current lifecycle phase.
    pub status: CameraStatus,
    /// Failure description when `status == Error`.
    pub error_message: Option<String>,
    /// Last known permission state; flips on `PermissionDenied`.
    pub has_permission: bool,
    /// When this snapshot was produced.
    pub last_updated: DateTime<Utc>,
}

impl Default for CameraState {
    fn default() -> Self {
        Self {
            mode: CameraMode::None,
            status: CameraStatus::Uninitialized,
            error_message: None,
            has_permission: true,
            last_updated: Utc::now(),
        }
    }
}

impl CameraState {
    /// Snapshot with the given `mode`/`status`, a fresh timestamp, and the
    /// error message cleared.
    pub fn advanced(&self, mode: CameraMode, status: CameraStatus) -> Self {
        Self {
            mode,
            status,
            error_message: None,
            has_permission: self.has_permission,
            last_updated: Utc::now(),
        }
    }

    /// Snapshot for a terminal failure of the current cycle.
    pub fn failed(&self, mode: CameraMode, message: String, has_permission: bool) -> Self {
        Self {
            mode,
            status: CameraStatus::Error,
            error_message: Some(message),
            has_permission,
            last_updated: Utc::now(),
        }
    }

    /// True when a consumer currently holds the camera.
    pub fn is_ready(&self) -> bool {
        self.status == CameraStatus::Ready
    }
}
