//! Mode-switch request queue and coalescer.
//!
//! Any number of callers may request a mode while a switch is executing.
//! Only the caller's final intent matters: at most one request is ever
//! pending, an older pending request is resolved `Superseded` the moment a
//! different-mode request arrives (synchronously, at enqueue time), and a
//! request for the mode already pending or in flight attaches to that
//! operation instead of triggering a redundant hardware cycle.

use chrono::{DateTime, Utc};
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::error::{CamResult, CameraError};
use crate::hardware::CameraHandle;
use crate::state::CameraMode;

/// Outcome delivered to every caller coalesced into one switch.
pub type SwitchResult = CamResult<CameraHandle>;

type Waiter = oneshot::Sender<SwitchResult>;

/// A queued mode-switch request with its single-assignment result slots.
///
/// Owned exclusively by the queue until the worker takes it; every waiter
/// is resolved exactly once, either with the switch outcome or with
/// `Superseded` when displaced before execution started.
pub struct PendingRequest {
    /// Target mode of the coalesced request.
    pub mode: CameraMode,
    /// Opaque token identifying this request for diagnostics.
    pub request_id: Uuid,
    /// When the first caller enqueued it.
    pub enqueued_at: DateTime<Utc>,
    waiters: Vec<Waiter>,
}

impl PendingRequest {
    fn new(mode: CameraMode) -> (Self, oneshot::Receiver<SwitchResult>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                mode,
                request_id: Uuid::new_v4(),
                enqueued_at: Utc::now(),
                waiters: vec![tx],
            },
            rx,
        )
    }

    fn attach(&mut self) -> oneshot::Receiver<SwitchResult> {
        let (tx, rx) = oneshot::channel();
        self.waiters.push(tx);
        rx
    }

    /// Resolve every coalesced caller with `result`. Consumes the request.
    pub fn resolve(self, result: SwitchResult) {
        for waiter in self.waiters {
            // A caller that dropped its future simply stops listening.
            let _ = waiter.send(result.clone());
        }
    }

    /// Number of coalesced callers awaiting this request.
    pub fn waiter_count(&self) -> usize {
        self.waiters.len()
    }
}

/// The switch currently executing. Late same-mode callers attach here.
pub struct InFlightSwitch {
    /// Target mode of the executing switch.
    pub mode: CameraMode,
    /// Diagnostics token carried over from the pending request.
    pub request_id: Uuid,
    waiters: Vec<Waiter>,
}

/// Serialized queue: at most one pending request plus the in-flight switch.
#[derive(Default)]
pub struct SwitchQueue {
    pending: Option<PendingRequest>,
    in_flight: Option<InFlightSwitch>,
}

impl SwitchQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a request for `mode`, coalescing per the queue policy.
    ///
    /// Superseding happens here, synchronously: displaced waiters observe
    /// `Superseded` before the winning request ever executes.
    pub fn enqueue(&mut self, mode: CameraMode) -> oneshot::Receiver<SwitchResult> {
        // The executing switch already delivers this mode: attach to it and
        // drop any queued intent that it overrides.
        if let Some(in_flight) = &mut self.in_flight {
            if in_flight.mode == mode {
                if let Some(stale) = self.pending.take() {
                    tracing::debug!(
                        superseded = %stale.request_id,
                        by_in_flight = %in_flight.request_id,
                        "queued request superseded by attach to in-flight switch"
                    );
                    stale.resolve(Err(CameraError::Superseded));
                }
                let (tx, rx) = oneshot::channel();
                in_flight.waiters.push(tx);
                return rx;
            }
        }

        match &mut self.pending {
            Some(pending) if pending.mode == mode => pending.attach(),
            Some(_) => {
                let (request, rx) = PendingRequest::new(mode);
                if let Some(stale) = self.pending.replace(request) {
                    tracing::debug!(
                        superseded = %stale.request_id,
                        mode = %mode,
                        "queued request superseded by newer mode-switch request"
                    );
                    stale.resolve(Err(CameraError::Superseded));
                }
                rx
            }
            None => {
                let (request, rx) = PendingRequest::new(mode);
                self.pending = Some(request);
                rx
            }
        }
    }

    /// Move the pending request into the in-flight slot.
    ///
    /// Returns the in-flight target mode, or `None` when nothing is queued.
    /// Must not be called while a switch is already in flight.
    pub fn begin_next(&mut self) -> Option<CameraMode> {
        debug_assert!(self.in_flight.is_none());
        let request = self.pending.take()?;
        let mode = request.mode;
        self.in_flight = Some(InFlightSwitch {
            mode,
            request_id: request.request_id,
            waiters: request.waiters,
        });
        Some(mode)
    }

    /// Resolve the in-flight switch with `result`.
    pub fn finish_in_flight(&mut self, result: SwitchResult) {
        if let Some(in_flight) = self.in_flight.take() {
            for waiter in in_flight.waiters {
                let _ = waiter.send(result.clone());
            }
        }
    }

    /// Mode of the switch currently executing, if any.
    pub fn in_flight_mode(&self) -> Option<CameraMode> {
        self.in_flight.as_ref().map(|f| f.mode)
    }

    /// Mode of the queued (not yet started) request, if any.
    pub fn pending_mode(&self) -> Option<CameraMode> {
        self.pending.as_ref().map(|p| p.mode)
    }

    /// True when nothing is queued and nothing is executing.
    pub fn is_idle(&self) -> bool {
        self.pending.is_none() && self.in_flight.is_none()
    }

    /// Resolve everything with `result` (used at shutdown).
    pub fn drain(&mut self, result: SwitchResult) {
        if let Some(pending) = self.pending.take() {
            pending.resolve(result.clone());
        }
        self.finish_in_flight(result);
    }
}
