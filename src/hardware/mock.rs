//! Mock camera provider.
//!
//! Simulates the hardware camera for tests and the demo binary without a
//! physical device. All timing uses async-safe operations
//! (tokio::time::sleep, not std::thread::sleep).
//!
//! # Capabilities
//!
//! - Configurable open latency and frame interval
//! - Scripted open failures (`fail_next_opens`) for retry-path tests
//! - Optional close failures for the best-effort release path
//! - Per-handle synthetic frame generator task, gated by pause/resume
//! - Open/close accounting, including the peak number of concurrently
//!   open handles, so exclusivity is directly assertable

use async_trait::async_trait;
use bytes::Bytes;
use rand::Rng;
use std::collections::{HashMap, VecDeque};
use tokio::sync::{broadcast, watch, RwLock};
use tokio::time::{sleep, Duration};
use uuid::Uuid;

use crate::error::{CamResult, CameraError};
use crate::hardware::{CameraHandle, CameraProvider, Frame};
use crate::profile::CameraConfiguration;

/// Frame fan-out capacity per open handle.
const FRAME_CHANNEL_CAPACITY: usize = 64;

/// Bytes of synthetic payload per frame. Real frames would be megabytes;
/// a small random block is enough to exercise the plumbing.
const SYNTHETIC_PAYLOAD_BYTES: usize = 64;

#[derive(Debug, Default, Clone)]
struct MockStats {
    open_attempts: u32,
    opens: u32,
    closes: u32,
    pauses: u32,
    resumes: u32,
    max_concurrent_open: u32,
}

struct HandleCtl {
    paused_tx: watch::Sender<bool>,
    stop_tx: watch::Sender<bool>,
}

/// Simulated camera device.
pub struct MockCamera {
    open_delay: Duration,
    frame_interval: Duration,
    fail_script: RwLock<VecDeque<CameraError>>,
    fail_closes: RwLock<bool>,
    stats: RwLock<MockStats>,
    live: RwLock<HashMap<Uuid, HandleCtl>>,
}

impl MockCamera {
    /// Create a mock camera with a small realistic open latency.
    pub fn new() -> Self {
        Self::with_timing(Duration::from_millis(30), Duration::from_millis(33))
    }

    /// Create a mock camera with explicit open latency and frame interval.
    pub fn with_timing(open_delay: Duration, frame_interval: Duration) -> Self {
        Self {
            open_delay,
            frame_interval,
            fail_script: RwLock::new(VecDeque::new()),
            fail_closes: RwLock::new(false),
            stats: RwLock::new(MockStats::default()),
            live: RwLock::new(HashMap::new()),
        }
    }

    /// Queue errors returned by the next open attempts, in order.
    pub async fn fail_next_opens(&self, errors: Vec<CameraError>) {
        self.fail_script.write().await.extend(errors);
    }

    /// Make subsequent `close` calls fail (release path must still proceed).
    pub async fn set_close_fails(&self, fail: bool) {
        *self.fail_closes.write().await = fail;
    }

    /// Total open attempts, including failed ones.
    pub async fn open_attempts(&self) -> u32 {
        self.stats.read().await.open_attempts
    }

    /// Successful opens.
    pub async fn opens(&self) -> u32 {
        self.stats.read().await.opens
    }

    /// Close calls observed (successful or injected-failure).
    pub async fn closes(&self) -> u32 {
        self.stats.read().await.closes
    }

    /// Pause calls observed.
    pub async fn pauses(&self) -> u32 {
        self.stats.read().await.pauses
    }

    /// Resume calls observed.
    pub async fn resumes(&self) -> u32 {
        self.stats.read().await.resumes
    }

    /// Handles currently open.
    pub async fn live_count(&self) -> usize {
        self.live.read().await.len()
    }

    /// Peak number of simultaneously open handles. Must never exceed 1
    /// under the coordinator.
    pub async fn max_concurrent_open(&self) -> u32 {
        self.stats.read().await.max_concurrent_open
    }

    /// Whether the frame stream of `handle` is currently paused.
    pub async fn is_paused(&self, handle: &CameraHandle) -> bool {
        self.live
            .read()
            .await
            .get(&handle.id())
            .map(|ctl| *ctl.paused_tx.borrow())
            .unwrap_or(false)
    }

    fn spawn_frame_task(
        &self,
        frames: broadcast::Sender<Frame>,
        config: CameraConfiguration,
        mut paused_rx: watch::Receiver<bool>,
        mut stop_rx: watch::Receiver<bool>,
    ) {
        let (width, height) = config.resolution.dimensions();
        let frame_interval = self.frame_interval;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(frame_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            let mut index = 0u64;
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if *paused_rx.borrow() {
                            continue;
                        }
                        let mut payload = vec![0u8; SYNTHETIC_PAYLOAD_BYTES];
                        rand::thread_rng().fill(payload.as_mut_slice());
                        let frame = Frame {
                            index,
                            timestamp: chrono::Utc::now(),
                            width,
                            height,
                            data: Bytes::from(payload),
                        };
                        index += 1;
                        // No receivers is fine; frames are fire-and-forget.
                        let _ = frames.send(frame);
                    }
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            tracing::debug!("mock frame task stopping after {} frames", index);
                            break;
                        }
                    }
                    changed = paused_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
        });
    }
}

impl Default for MockCamera {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CameraProvider for MockCamera {
    async fn open(&self, config: &CameraConfiguration) -> CamResult<CameraHandle> {
        self.stats.write().await.open_attempts += 1;

        sleep(self.open_delay).await;

        if let Some(err) = self.fail_script.write().await.pop_front() {
            tracing::debug!(error = %err, "mock open failing by script");
            return Err(err);
        }

        let (frames_tx, _) = broadcast::channel(FRAME_CHANNEL_CAPACITY);
        let handle = CameraHandle::new(*config, frames_tx.clone());

        let (paused_tx, paused_rx) = watch::channel(false);
        let (stop_tx, stop_rx) = watch::channel(false);
        self.spawn_frame_task(frames_tx, *config, paused_rx, stop_rx);

        {
            let mut live = self.live.write().await;
            live.insert(handle.id(), HandleCtl { paused_tx, stop_tx });
            let mut stats = self.stats.write().await;
            stats.opens += 1;
            stats.max_concurrent_open = stats.max_concurrent_open.max(live.len() as u32);
        }

        tracing::debug!(id = %handle.id(), "mock camera opened");
        Ok(handle)
    }

    async fn close(&self, handle: &CameraHandle) -> CamResult<()> {
        self.stats.write().await.closes += 1;

        // Even when a close is reported as failed, the simulated device is
        // torn down so a later open can succeed, matching real drivers that
        // error on close but still free the pipeline.
        let ctl = self.live.write().await.remove(&handle.id());
        if let Some(ctl) = &ctl {
            let _ = ctl.stop_tx.send(true);
        }

        if *self.fail_closes.read().await {
            return Err(CameraError::HardwareUnavailable(
                "simulated close failure".to_string(),
            ));
        }
        if ctl.is_none() {
            return Err(CameraError::HardwareUnavailable(format!(
                "close of unknown handle {}",
                handle.id()
            )));
        }
        tracing::debug!(id = %handle.id(), "mock camera closed");
        Ok(())
    }

    async fn pause(&self, handle: &CameraHandle) -> CamResult<()> {
        self.stats.write().await.pauses += 1;
        match self.live.read().await.get(&handle.id()) {
            Some(ctl) => {
                let _ = ctl.paused_tx.send(true);
                Ok(())
            }
            None => Err(CameraError::HardwareUnavailable(format!(
                "pause of unknown handle {}",
                handle.id()
            ))),
        }
    }

    async fn resume(&self, handle: &CameraHandle) -> CamResult<()> {
        self.stats.write().await.resumes += 1;
        match self.live.read().await.get(&handle.id()) {
            Some(ctl) => {
                let _ = ctl.paused_tx.send(false);
                Ok(())
            }
            None => Err(CameraError::HardwareUnavailable(format!(
                "resume of unknown handle {}",
                handle.id()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{configuration_for, CameraConfiguration};
    use crate::state::CameraMode;

    fn qr_config() -> CameraConfiguration {
        configuration_for(CameraMode::QrScanning)
    }

    fn fast_mock() -> MockCamera {
        MockCamera::with_timing(Duration::from_millis(1), Duration::from_millis(5))
    }

    #[tokio::test]
    async fn test_open_close_accounting() {
        let camera = fast_mock();

        let handle = camera.open(&qr_config()).await.unwrap();
        assert_eq!(camera.opens().await, 1);
        assert_eq!(camera.live_count().await, 1);

        camera.close(&handle).await.unwrap();
        assert_eq!(camera.closes().await, 1);
        assert_eq!(camera.live_count().await, 0);
    }

    #[tokio::test]
    async fn test_scripted_open_failures() {
        let camera = fast_mock();
        camera
            .fail_next_opens(vec![
                CameraError::HardwareUnavailable("warming up".into()),
                CameraError::HardwareUnavailable("still warming up".into()),
            ])
            .await;

        assert!(camera.open(&qr_config()).await.is_err());
        assert!(camera.open(&qr_config()).await.is_err());
        assert!(camera.open(&qr_config()).await.is_ok());
        assert_eq!(camera.open_attempts().await, 3);
        assert_eq!(camera.opens().await, 1);
    }

    #[tokio::test]
    async fn test_frames_flow_and_pause_gates_them() {
        let camera = fast_mock();
        let handle = camera.open(&qr_config()).await.unwrap();
        let mut frames = handle.frames();

        let first = tokio::time::timeout(Duration::from_millis(500), frames.recv())
            .await
            .expect("frame before timeout")
            .expect("stream alive");
        assert_eq!(first.width, 1280);

        camera.pause(&handle).await.unwrap();
        assert!(camera.is_paused(&handle).await);

        // Drain anything emitted before the pause landed, then expect silence.
        tokio::time::sleep(Duration::from_millis(20)).await;
        while frames.try_recv().is_ok() {}
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(frames.try_recv().is_err());

        camera.resume(&handle).await.unwrap();
        let resumed = tokio::time::timeout(Duration::from_millis(500), frames.recv()).await;
        assert!(resumed.is_ok());

        camera.close(&handle).await.unwrap();
    }

    #[tokio::test]
    async fn test_close_failure_still_tears_down() {
        let camera = fast_mock();
        let handle = camera.open(&qr_config()).await.unwrap();

        camera.set_close_fails(true).await;
        assert!(camera.close(&handle).await.is_err());
        // The device is free again regardless of the reported failure.
        assert_eq!(camera.live_count().await, 0);

        camera.set_close_fails(false).await;
        let again = camera.open(&qr_config()).await.unwrap();
        camera.close(&again).await.unwrap();
    }

    #[tokio::test]
    async fn test_pause_unknown_handle_errors() {
        let camera = fast_mock();
        let handle = camera.open(&qr_config()).await.unwrap();
        camera.close(&handle).await.unwrap();
        assert!(camera.pause(&handle).await.is_err());
        assert!(camera.resume(&handle).await.is_err());
    }
}
