//! Core library for the camctl camera coordinator.
//!
//! This library arbitrates exclusive access to one hardware camera between
//! independent consumers (QR scanning and ML object detection). It owns the
//! mode/status state machine, coalesces concurrent mode-switch requests,
//! serializes all hardware open/close cycles, and publishes state changes
//! to any number of subscribers.

pub mod broadcast;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod hardware;
pub mod profile;
pub mod queue;
pub mod recovery;
pub mod state;

pub use broadcast::StateUpdates;
pub use config::{CoordinatorSettings, Settings};
pub use coordinator::CameraCoordinator;
pub use error::{CamResult, CameraError};
pub use hardware::{CameraHandle, CameraProvider, Frame};
pub use profile::{configuration_for, CameraConfiguration};
pub use state::{CameraMode, CameraState, CameraStatus};
