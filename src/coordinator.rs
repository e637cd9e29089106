//! The camera resource coordinator.
//!
//! Single authority for acquiring and releasing the one hardware camera.
//! All mutation happens in a dedicated worker task; the [`CameraCoordinator`]
//! facade is a cheap clonable handle that consumers (QR screen, detection
//! pipeline, lifecycle observer) receive by injection from the composition
//! root. There is no global singleton: "exactly one coordinator" is a
//! construction discipline, not a language feature.
//!
//! # Serialization model
//!
//! Exactly one switch executes at a time, system-wide. The worker drains a
//! coalescing [`SwitchQueue`]; enqueueing (and therefore superseding) is
//! synchronous under the shared lock, while the slow hardware work runs in
//! the worker with the lock released. Pause, resume and release are queued
//! behind an in-flight switch using the same worker, so nothing ever
//! interleaves with a close-old/open-new cycle.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex, Notify};
use tokio::time::{sleep, timeout};

use crate::broadcast::{StatePublisher, StateUpdates};
use crate::config::CoordinatorSettings;
use crate::error::{CamResult, CameraError};
use crate::hardware::{CameraHandle, CameraProvider};
use crate::profile::configuration_for;
use crate::queue::SwitchQueue;
use crate::state::{transition_allowed, CameraMode, CameraState, CameraStatus};

/// Lifecycle operations deferred behind any in-flight switch.
enum LifecycleOp {
    Pause(oneshot::Sender<CamResult<()>>),
    Resume(oneshot::Sender<CamResult<()>>),
    Release(oneshot::Sender<()>),
    Shutdown(oneshot::Sender<()>),
}

/// State shared between the facade and the worker. Everything here is
/// mutated under one lock; the lock is never held across hardware calls.
struct Shared {
    queue: SwitchQueue,
    /// The single open handle. `Some` exactly when status is `Ready`,
    /// except transiently inside the worker during a switch.
    handle: Option<CameraHandle>,
    lifecycle_ops: VecDeque<LifecycleOp>,
    /// True once a handle has opened since the last dispose; decides
    /// whether a retry re-enters at `Initializing` or `Switching`.
    opened_since_reset: bool,
    shutting_down: bool,
}

struct Inner {
    provider: Arc<dyn CameraProvider>,
    settings: CoordinatorSettings,
    publisher: StatePublisher,
    shared: Mutex<Shared>,
    wake: Notify,
    /// Set when the last facade clone is dropped; the worker then closes
    /// any open handle and exits instead of parking forever.
    facade_gone: AtomicBool,
}

/// Facade over the coordinator worker. Clone freely; all clones talk to
/// the same worker and observe the same state.
///
/// Prefer an explicit [`shutdown`](Self::shutdown) at the end of the
/// coordinator's life. Dropping the last clone without one still wakes
/// the worker a final time so it releases the hardware and stops.
#[derive(Clone)]
pub struct CameraCoordinator {
    inner: Arc<Inner>,
    _guard: Arc<FacadeGuard>,
}

/// Dropped when the last facade clone goes away. No consumer can enqueue
/// anything after that point, so the worker is told to wind down.
struct FacadeGuard {
    inner: Arc<Inner>,
}

impl Drop for FacadeGuard {
    fn drop(&mut self) {
        self.inner.facade_gone.store(true, Ordering::Release);
        self.inner.wake.notify_one();
    }
}

impl CameraCoordinator {
    /// Construct a coordinator over `provider` and spawn its worker task.
    pub fn new(provider: Arc<dyn CameraProvider>, settings: CoordinatorSettings) -> Self {
        let inner = Arc::new(Inner {
            provider,
            publisher: StatePublisher::new(settings.state_channel_capacity),
            settings,
            shared: Mutex::new(Shared {
                queue: SwitchQueue::new(),
                handle: None,
                lifecycle_ops: VecDeque::new(),
                opened_since_reset: false,
                shutting_down: false,
            }),
            wake: Notify::new(),
            facade_gone: AtomicBool::new(false),
        });

        let worker_inner = inner.clone();
        tokio::spawn(async move {
            run_worker(worker_inner).await;
        });

        Self {
            _guard: Arc::new(FacadeGuard {
                inner: inner.clone(),
            }),
            inner,
        }
    }

    /// Acquire the camera for `mode`.
    ///
    /// Resolves with the open handle once the switch completes, with
    /// [`CameraError::Superseded`] if a newer request displaced this one
    /// before it started, or with the terminal failure of the cycle this
    /// request was coalesced into. Requesting the mode that is already
    /// `Ready` (with nothing queued) returns the existing handle without
    /// touching the hardware.
    pub async fn request_camera(&self, mode: CameraMode) -> CamResult<CameraHandle> {
        if mode == CameraMode::None {
            return Err(CameraError::Config(
                "CameraMode::None cannot be requested; call release_camera()".to_string(),
            ));
        }

        let rx = {
            let mut shared = self.inner.shared.lock().await;
            if shared.shutting_down {
                return Err(CameraError::Shutdown);
            }

            // Idempotent fast path: already serving this mode and nothing
            // queued that would invalidate the handle. A queued pause or
            // resume keeps the handle alive, so it does not disable the
            // path; only a pending disposal does.
            let disposal_queued = shared
                .lifecycle_ops
                .iter()
                .any(|op| matches!(op, LifecycleOp::Release(_) | LifecycleOp::Shutdown(_)));
            if shared.queue.is_idle() && !disposal_queued {
                let current = self.inner.publisher.current();
                if current.status == CameraStatus::Ready && current.mode == mode {
                    if let Some(handle) = &shared.handle {
                        return Ok(handle.clone());
                    }
                }
            }

            shared.queue.enqueue(mode)
        };
        self.inner.wake.notify_one();

        match rx.await {
            Ok(result) => result,
            Err(_) => Err(CameraError::Shutdown),
        }
    }

    /// Release the camera, transitioning to `Disposed`.
    ///
    /// No-op from `Uninitialized`/`Disposed`. If a switch is in flight the
    /// release is queued behind it, never rejected.
    pub async fn release_camera(&self) -> CamResult<()> {
        let rx = {
            let mut shared = self.inner.shared.lock().await;
            if shared.shutting_down {
                return Ok(());
            }
            let (tx, rx) = oneshot::channel();
            shared.lifecycle_ops.push_back(LifecycleOp::Release(tx));
            rx
        };
        self.inner.wake.notify_one();
        rx.await.map_err(|_| CameraError::Shutdown)
    }

    /// Suspend the frame stream without tearing down the handle or
    /// changing mode. Queued behind an in-flight switch; no-op when no
    /// camera is active (including `Error` state).
    pub async fn pause_camera(&self) -> CamResult<()> {
        self.lifecycle(LifecycleOp::Pause).await
    }

    /// Resume a paused frame stream. Same queueing rules as pause.
    pub async fn resume_camera(&self) -> CamResult<()> {
        self.lifecycle(LifecycleOp::Resume).await
    }

    async fn lifecycle(
        &self,
        make: impl FnOnce(oneshot::Sender<CamResult<()>>) -> LifecycleOp,
    ) -> CamResult<()> {
        let rx = {
            let mut shared = self.inner.shared.lock().await;
            if shared.shutting_down {
                return Err(CameraError::Shutdown);
            }
            let (tx, rx) = oneshot::channel();
            shared.lifecycle_ops.push_back(make(tx));
            rx
        };
        self.inner.wake.notify_one();
        match rx.await {
            Ok(result) => result,
            Err(_) => Err(CameraError::Shutdown),
        }
    }

    /// Subscribe to state changes; replays the current state first.
    pub fn subscribe(&self) -> StateUpdates {
        self.inner.publisher.subscribe()
    }

    /// The most recently published state snapshot.
    pub fn current_state(&self) -> CameraState {
        self.inner.publisher.current()
    }

    /// Gracefully stop the worker: refuse new requests, resolve anything
    /// queued with [`CameraError::Shutdown`], close the handle.
    pub async fn shutdown(&self) {
        let rx = {
            let mut shared = self.inner.shared.lock().await;
            if shared.shutting_down {
                return;
            }
            shared.shutting_down = true;
            let (tx, rx) = oneshot::channel();
            shared.lifecycle_ops.push_back(LifecycleOp::Shutdown(tx));
            rx
        };
        self.inner.wake.notify_one();
        // Worker gone already means shutdown is complete.
        let _ = rx.await;
    }
}

/// What the worker decided to do next, chosen under the shared lock but
/// executed with the lock released.
enum Action {
    Switch {
        mode: CameraMode,
        old: Option<CameraHandle>,
        entry_status: CameraStatus,
    },
    Lifecycle(LifecycleOp),
    Idle,
    Exit,
}

async fn run_worker(inner: Arc<Inner>) {
    tracing::info!("camera coordinator worker started");
    loop {
        let action = next_action(&inner).await;
        match action {
            Action::Switch {
                mode,
                old,
                entry_status,
            } => run_switch(&inner, mode, old, entry_status).await,
            Action::Lifecycle(op) => run_lifecycle(&inner, op).await,
            Action::Idle => inner.wake.notified().await,
            Action::Exit => break,
        }
    }
    tracing::info!("camera coordinator worker stopped");
}

async fn next_action(inner: &Inner) -> Action {
    let mut shared = inner.shared.lock().await;

    // Switches chain ahead of deferred lifecycle ops: after a switch the
    // newest coalesced request runs immediately, without yielding to
    // callers in between. During shutdown nothing new starts.
    if !shared.shutting_down {
        if let Some(mode) = shared.queue.begin_next() {
            let old = shared.handle.take();
            let entry_status = if old.is_some() || shared.opened_since_reset {
                CameraStatus::Switching
            } else {
                CameraStatus::Initializing
            };
            return Action::Switch {
                mode,
                old,
                entry_status,
            };
        }
    }

    if let Some(op) = shared.lifecycle_ops.pop_front() {
        return Action::Lifecycle(op);
    }

    if shared.shutting_down {
        return Action::Exit;
    }

    // Every facade clone is gone: nothing can be enqueued anymore. Run
    // the shutdown path once, then exit on the next pass.
    if inner.facade_gone.load(Ordering::Acquire) {
        tracing::info!("last coordinator handle dropped, winding down");
        shared.shutting_down = true;
        let (reply, _) = oneshot::channel();
        return Action::Lifecycle(LifecycleOp::Shutdown(reply));
    }

    Action::Idle
}

fn publish(inner: &Inner, next: CameraState) {
    let prev = inner.publisher.current();
    if prev.status != next.status && !transition_allowed(prev.status, next.status) {
        tracing::warn!(
            from = %prev.status,
            to = %next.status,
            "state transition outside the table"
        );
    }
    inner.publisher.publish(next);
}

/// One full switch cycle: publish the transient status, best-effort
/// pause+close of the old handle, bounded open with retries, then publish
/// the terminal status and resolve every coalesced waiter.
async fn run_switch(
    inner: &Arc<Inner>,
    mode: CameraMode,
    old: Option<CameraHandle>,
    entry_status: CameraStatus,
) {
    tracing::info!(target_mode = %mode, status = %entry_status, "starting camera switch");
    publish(inner, inner.publisher.current().advanced(mode, entry_status));

    // The old handle is fully closed before any open attempt; a stuck
    // camera must never prevent trying to open a new one, so failures
    // here are logged and progress continues.
    if let Some(old) = old {
        if let Err(err) = inner.provider.pause(&old).await {
            tracing::warn!(id = %old.id(), error = %err, "pause of old handle failed");
        }
        if let Err(err) = inner.provider.close(&old).await {
            tracing::warn!(id = %old.id(), error = %err, "best-effort close of old handle failed");
        }
    }

    let config = configuration_for(mode);
    let retry = &inner.settings.retry;
    let mut attempt = 0u32;
    let outcome: CamResult<CameraHandle> = loop {
        attempt += 1;
        let failure = match timeout(inner.settings.open_timeout, inner.provider.open(&config)).await
        {
            Ok(Ok(handle)) => break Ok(handle),
            Ok(Err(err)) if !err.is_retryable() => {
                tracing::warn!(attempt, error = %err, "camera open failed permanently");
                break Err(err);
            }
            Ok(Err(err)) => err,
            Err(_) => CameraError::InitializationTimeout(inner.settings.open_timeout),
        };

        tracing::warn!(attempt, error = %failure, "camera open attempt failed");
        if !retry.allows_retry(attempt) {
            break Err(failure);
        }
        sleep(retry.delay_for(attempt)).await;
    };

    let mut shared = inner.shared.lock().await;
    match outcome {
        Ok(handle) => {
            tracing::info!(mode = %mode, attempts = attempt, id = %handle.id(), "camera ready");
            shared.handle = Some(handle.clone());
            shared.opened_since_reset = true;
            let mut next = inner.publisher.current().advanced(mode, CameraStatus::Ready);
            next.has_permission = true;
            publish(inner, next);
            shared.queue.finish_in_flight(Ok(handle));
        }
        Err(err) => {
            tracing::error!(mode = %mode, attempts = attempt, error = %err, "camera switch failed");
            let current = inner.publisher.current();
            let has_permission =
                current.has_permission && !matches!(err, CameraError::PermissionDenied);
            publish(inner, current.failed(mode, err.to_string(), has_permission));
            shared.queue.finish_in_flight(Err(err));
        }
    }
    // The worker loop re-checks the queue immediately, so a request that
    // arrived during this switch starts without idling in between.
}

async fn run_lifecycle(inner: &Arc<Inner>, op: LifecycleOp) {
    match op {
        LifecycleOp::Pause(reply) => {
            let handle = active_handle(inner).await;
            let result = match handle {
                Some(handle) => inner.provider.pause(&handle).await,
                None => {
                    tracing::debug!("pause ignored: no active camera");
                    Ok(())
                }
            };
            let _ = reply.send(result);
        }
        LifecycleOp::Resume(reply) => {
            let handle = active_handle(inner).await;
            let result = match handle {
                Some(handle) => inner.provider.resume(&handle).await,
                None => {
                    tracing::debug!("resume ignored: no active camera");
                    Ok(())
                }
            };
            let _ = reply.send(result);
        }
        LifecycleOp::Release(reply) => {
            let (handle, already_released) = {
                let mut shared = inner.shared.lock().await;
                let status = inner.publisher.current().status;
                let already = matches!(
                    status,
                    CameraStatus::Uninitialized | CameraStatus::Disposed
                );
                shared.opened_since_reset = false;
                (shared.handle.take(), already)
            };
            if let Some(handle) = handle {
                if let Err(err) = inner.provider.close(&handle).await {
                    tracing::warn!(id = %handle.id(), error = %err, "close during release failed");
                }
            }
            if !already_released {
                tracing::info!("camera released");
                publish(
                    inner,
                    inner
                        .publisher
                        .current()
                        .advanced(CameraMode::None, CameraStatus::Disposed),
                );
            }
            let _ = reply.send(());
        }
        LifecycleOp::Shutdown(reply) => {
            let handle = {
                let mut shared = inner.shared.lock().await;
                shared.queue.drain(Err(CameraError::Shutdown));
                shared.opened_since_reset = false;
                shared.handle.take()
            };
            if let Some(handle) = handle {
                if let Err(err) = inner.provider.close(&handle).await {
                    tracing::warn!(id = %handle.id(), error = %err, "close during shutdown failed");
                }
            }
            let current = inner.publisher.current();
            if !matches!(current.status, CameraStatus::Disposed) {
                publish(
                    inner,
                    current.advanced(CameraMode::None, CameraStatus::Disposed),
                );
            }
            let _ = reply.send(());
        }
    }
}

/// The handle to pause/resume, but only while the coordinator is `Ready`.
/// In `Error` state this yields `None`: recovery requires an explicit new
/// request, not an implicit one from a lifecycle callback.
async fn active_handle(inner: &Inner) -> Option<CameraHandle> {
    let shared = inner.shared.lock().await;
    if inner.publisher.current().status == CameraStatus::Ready {
        shared.handle.clone()
    } else {
        None
    }
}
