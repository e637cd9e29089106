//! Hardware camera provider boundary.
//!
//! The coordinator is the only caller of [`CameraProvider`]; everything else
//! receives a [`CameraHandle`] and may only consume frames from it. Opening
//! and closing are assumed fallible and slow (hundreds of milliseconds), so
//! every method is async.

pub mod mock;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::CamResult;
use crate::profile::CameraConfiguration;

/// One frame delivered by the camera.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Monotonic frame counter within one open handle.
    pub index: u64,
    /// Capture timestamp.
    pub timestamp: DateTime<Utc>,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Raw pixel payload in the handle's configured format.
    pub data: Bytes,
}

struct HandleInner {
    id: Uuid,
    config: CameraConfiguration,
    frames: broadcast::Sender<Frame>,
}

/// A live, open hardware camera resource.
///
/// Cloning is cheap (shared inner). Consumers treat the handle as read-only:
/// subscribe to frames, inspect the configuration, and hand it back to the
/// coordinator. Only the provider that created it may close it, and only the
/// coordinator calls the provider.
#[derive(Clone)]
pub struct CameraHandle {
    inner: Arc<HandleInner>,
}

impl CameraHandle {
    /// Construct a handle for a newly opened device. Called by providers.
    pub fn new(config: CameraConfiguration, frames: broadcast::Sender<Frame>) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                id: Uuid::new_v4(),
                config,
                frames,
            }),
        }
    }

    /// Opaque identity of this open cycle.
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// The configuration this handle was opened with.
    pub fn config(&self) -> &CameraConfiguration {
        &self.inner.config
    }

    /// Subscribe to the live frame stream.
    pub fn frames(&self) -> broadcast::Receiver<Frame> {
        self.inner.frames.subscribe()
    }
}

impl std::fmt::Debug for CameraHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraHandle")
            .field("id", &self.inner.id)
            .field("config", &self.inner.config)
            .finish()
    }
}

/// Opaque provider of the one shared hardware camera.
///
/// `close` is best-effort: implementations must not leave the device in a
/// state that blocks a subsequent `open`, and a close failure is reported
/// but never escalated by the coordinator.
#[async_trait]
pub trait CameraProvider: Send + Sync {
    /// Open the device with `config`. May take hundreds of milliseconds.
    async fn open(&self, config: &CameraConfiguration) -> CamResult<CameraHandle>;

    /// Close an open handle, stopping its frame stream.
    async fn close(&self, handle: &CameraHandle) -> CamResult<()>;

    /// Suspend frame delivery without tearing the handle down.
    async fn pause(&self, handle: &CameraHandle) -> CamResult<()>;

    /// Resume frame delivery on a paused handle.
    async fn resume(&self, handle: &CameraHandle) -> CamResult<()>;
}
