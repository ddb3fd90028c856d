//! Subscription handle
//!
//! The caller-owned side of a session: identity, observable state and
//! counters, and cancellation. The session driver only keeps a weak
//! reference to the status it reports into.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

use crate::domain::{SessionError, SessionState, Slot};

/// Opaque session identifier, assigned at subscribe time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    /// Fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// State and last error of a session, written by its driver.
#[derive(Debug)]
pub struct SessionStatus {
    state: watch::Sender<SessionState>,
    last_error: Mutex<Option<SessionError>>,
}

impl SessionStatus {
    pub(crate) fn new() -> Self {
        let (state, _) = watch::channel(SessionState::Idle);
        Self {
            state,
            last_error: Mutex::new(None),
        }
    }

    pub(crate) fn publish(&self, state: SessionState) {
        self.state.send_replace(state);
    }

    pub(crate) fn set_last_error(&self, error: SessionError) {
        *self.last_error.lock() = Some(error);
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Most recent error observed, transient or terminal.
    pub fn last_error(&self) -> Option<SessionError> {
        self.last_error.lock().clone()
    }

    /// Wait until the session reaches `Closed` or `Failed`.
    pub async fn terminal(&self) -> SessionState {
        let mut rx = self.state.subscribe();
        let reached = rx.wait_for(|state| state.is_terminal()).await.map(|s| *s);
        // The sender lives in `self`, so the channel cannot close here.
        reached.unwrap_or_else(|_| self.state())
    }
}

/// Per-session counters, shared between the driver and the handle.
#[derive(Debug, Default)]
pub struct SessionStats {
    delivered: AtomicU64,
    suppressed: AtomicU64,
    malformed_frames: AtomicU64,
    connect_attempts: AtomicU64,
    reconnects: AtomicU64,
    pings_answered: AtomicU64,
    // slot + 1; zero means nothing delivered yet.
    last_delivered_slot: AtomicU64,
}

impl SessionStats {
    pub(crate) fn record_delivered(&self, slot: Slot) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
        self.last_delivered_slot
            .fetch_max(slot.saturating_add(1), Ordering::Relaxed);
    }

    pub(crate) fn record_suppressed(&self) {
        self.suppressed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_malformed(&self) {
        self.malformed_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_connect_attempt(&self) {
        self.connect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_ping_answered(&self) {
        self.pings_answered.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter.
    pub fn snapshot(&self) -> StatsSnapshot {
        let last = self.last_delivered_slot.load(Ordering::Relaxed);
        StatsSnapshot {
            delivered: self.delivered.load(Ordering::Relaxed),
            suppressed: self.suppressed.load(Ordering::Relaxed),
            malformed_frames: self.malformed_frames.load(Ordering::Relaxed),
            connect_attempts: self.connect_attempts.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
            pings_answered: self.pings_answered.load(Ordering::Relaxed),
            last_delivered_slot: last.checked_sub(1),
        }
    }
}

/// Serializable copy of [`SessionStats`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    /// Updates handed to the consumer.
    pub delivered: u64,
    /// Redeliveries dropped.
    pub suppressed: u64,
    /// Frames that failed to decode.
    pub malformed_frames: u64,
    /// Transport connections attempted.
    pub connect_attempts: u64,
    /// Reconnect cycles.
    pub reconnects: u64,
    /// Server pings answered.
    pub pings_answered: u64,
    /// Highest slot delivered.
    pub last_delivered_slot: Option<Slot>,
}

/// Whether the cancel flag is raised or its handle is gone.
pub(crate) fn cancel_requested(cancel: &watch::Receiver<bool>) -> bool {
    *cancel.borrow() || cancel.has_changed().is_err()
}

/// Caller-owned handle to one running session.
///
/// Dropping the handle cancels the session.
#[derive(Debug)]
pub struct SubscriptionHandle {
    id: SubscriptionId,
    status: Arc<SessionStatus>,
    stats: Arc<SessionStats>,
    cancel: watch::Sender<bool>,
}

impl SubscriptionHandle {
    pub(crate) fn new(
        id: SubscriptionId,
        status: Arc<SessionStatus>,
        stats: Arc<SessionStats>,
        cancel: watch::Sender<bool>,
    ) -> Self {
        Self {
            id,
            status,
            stats,
            cancel,
        }
    }

    /// Session identifier.
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.status.state()
    }

    /// Counter snapshot.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Most recent error observed, transient or terminal.
    pub fn last_error(&self) -> Option<SessionError> {
        self.status.last_error()
    }

    /// Stop the session. Idempotent; returns immediately.
    ///
    /// No events are delivered after this returns, even if some are still
    /// buffered.
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    /// Whether [`cancel`](Self::cancel) was called.
    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// Wait until the session reaches `Closed` or `Failed`.
    pub async fn closed(&self) -> SessionState {
        self.status.terminal().await
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}
