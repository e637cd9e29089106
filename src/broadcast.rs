//! State change publication.
//!
//! Multicast channel for [`CameraState`] snapshots with replay-last-value
//! semantics: a late subscriber immediately receives the current state
//! before any live updates, so UI screens attaching mid-lifecycle render
//! correctly without polling.
//!
//! Publication order is the transition order; a subscriber never observes
//! `Ready` reordered after the `Switching` that preceded it. Slow
//! subscribers that lag past the channel capacity skip ahead to the oldest
//! retained update instead of erroring.

use std::sync::Mutex;
use tokio::sync::broadcast;

use crate::state::CameraState;

/// Publisher half, owned by the coordinator worker.
pub struct StatePublisher {
    tx: broadcast::Sender<CameraState>,
    // Guards the retained value AND makes subscribe/publish atomic with
    // respect to each other, so a subscriber never misses the state that
    // was current at subscription time.
    last: Mutex<CameraState>,
}

impl StatePublisher {
    /// Create a publisher retaining `CameraState::default()` (Uninitialized).
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            last: Mutex::new(CameraState::default()),
        }
    }

    /// Publish a snapshot to all subscribers and retain it for late ones.
    pub fn publish(&self, state: CameraState) {
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        *last = state.clone();
        // No receivers is fine.
        let _ = self.tx.send(state);
    }

    /// The most recently published snapshot.
    pub fn current(&self) -> CameraState {
        self.last
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Subscribe; the returned stream replays the current state first.
    pub fn subscribe(&self) -> StateUpdates {
        let last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        StateUpdates {
            replay: Some(last.clone()),
            rx: self.tx.subscribe(),
        }
    }
}

/// Subscriber half; see [`StatePublisher::subscribe`].
pub struct StateUpdates {
    replay: Option<CameraState>,
    rx: broadcast::Receiver<CameraState>,
}

impl StateUpdates {
    /// Convert into a `Stream` of snapshots, replaying the retained state
    /// first. Lagged gaps are skipped, as in [`StateUpdates::recv`].
    pub fn into_stream(self) -> impl tokio_stream::Stream<Item = CameraState> {
        use tokio_stream::StreamExt;
        let replay = tokio_stream::iter(self.replay);
        let live = tokio_stream::wrappers::BroadcastStream::new(self.rx)
            .filter_map(|item| item.ok());
        replay.chain(live)
    }

    /// Next state snapshot, or `None` once the coordinator is gone.
    ///
    /// The first call yields the state retained at subscription time.
    pub async fn recv(&mut self) -> Option<CameraState> {
        if let Some(state) = self.replay.take() {
            return Some(state);
        }
        loop {
            match self.rx.recv().await {
                Ok(state) => return Some(state),
                // Dropped behind; continue with the oldest retained update.
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "state subscriber lagged, skipping ahead");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
