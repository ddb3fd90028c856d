//! # Session State
//!
//! Lifecycle of one subscription session.
//!
//! ```text
//! Idle -> Connecting -> Subscribing -> Streaming
//!             ^                            |
//!             |                            v
//!             +-------- Reconnecting <-----+
//!
//! any non-terminal state -> Closed (consumer cancel)
//! any non-terminal state -> Failed (fatal error)
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Session lifecycle state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionState {
    /// Created, no connection attempted yet.
    #[default]
    Idle,
    /// Opening a transport connection.
    Connecting,
    /// Connected, waiting for the subscribe request to be acknowledged.
    Subscribing,
    /// Updates are flowing.
    Streaming,
    /// Waiting out the backoff delay after a transient failure.
    Reconnecting,
    /// Cancelled by the consumer.
    Closed,
    /// Ended by a fatal error.
    Failed,
}

impl SessionState {
    /// No further transitions are possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Failed)
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;

        if self.is_terminal() {
            return false;
        }
        if matches!(next, Closed | Failed) {
            return true;
        }
        matches!(
            (self, next),
            (Idle, Connecting)
                // Retrying a failed connect without a stream in between.
                | (Connecting, Connecting)
                | (Connecting, Subscribing)
                | (Subscribing, Streaming)
                | (Subscribing, Reconnecting)
                | (Streaming, Reconnecting)
                | (Reconnecting, Connecting)
        )
    }

    /// Label used in logs and metrics.
    pub const fn as_str(self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Connecting => "connecting",
            SessionState::Subscribing => "subscribing",
            SessionState::Streaming => "streaming",
            SessionState::Reconnecting => "reconnecting",
            SessionState::Closed => "closed",
            SessionState::Failed => "failed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
