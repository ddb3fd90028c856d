//! # Domain Invariants
//!
//! Rules the session must never break, plus the default constants they are
//! stated against.

use super::state::SessionState;
use super::updates::Slot;

/// Smallest delay between reconnect attempts.
pub const DEFAULT_BACKOFF_FLOOR_MS: u64 = 100;

/// Largest delay between reconnect attempts.
pub const DEFAULT_BACKOFF_CEILING_MS: u64 = 30_000;

/// Random spread applied to each delay, as a fraction of it.
pub const DEFAULT_JITTER_RATIO: f64 = 0.1;

/// A connection that streamed this long resets the backoff.
pub const DEFAULT_HEALTHY_AFTER_SECS: u64 = 30;

/// Recently delivered keys remembered per entity type.
pub const DEFAULT_DEDUP_WINDOW: usize = 2048;

/// Slots re-requested behind the last delivered slot on resume.
pub const DEFAULT_RESUME_SLOT_MARGIN: u64 = 0;

/// Silence after which a liveness probe is sent.
pub const DEFAULT_IDLE_THRESHOLD_MS: u64 = 30_000;

/// Time allowed for a probe to be answered.
pub const DEFAULT_PONG_TIMEOUT_MS: u64 = 10_000;

/// Time allowed for a transport connection to open.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;

/// Time allowed for a subscribe request to be acknowledged.
pub const DEFAULT_SUBSCRIBE_TIMEOUT_MS: u64 = 10_000;

/// Consecutive undecodable frames tolerated before reconnecting.
pub const DEFAULT_MAX_CONSECUTIVE_MALFORMED: u32 = 16;

/// Decoded updates buffered between the session and the consumer.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Invariant: a resume point never lies after the last delivered slot.
///
/// Resuming past it would skip updates the consumer has not seen.
pub fn invariant_resume_not_ahead(resume: Option<Slot>, last_delivered: Option<Slot>) -> bool {
    match (resume, last_delivered) {
        (Some(resume), Some(last)) => resume <= last,
        // Nothing delivered yet: the caller's starting slot is reused as is.
        _ => true,
    }
}

/// Invariant: a resume point is at most `margin` slots behind the last
/// delivered slot, unless the starting slot holds it back further.
pub fn invariant_resume_within_margin(
    resume: Slot,
    last_delivered: Slot,
    starting_slot: Option<Slot>,
    margin: u64,
) -> bool {
    let floor = last_delivered.saturating_sub(margin);
    resume >= floor || starting_slot.is_some_and(|start| resume == start && start <= last_delivered)
}

/// Invariant: the session only moves along allowed edges.
pub fn invariant_valid_transition(from: SessionState, to: SessionState) -> bool {
    from.can_transition_to(to)
}
