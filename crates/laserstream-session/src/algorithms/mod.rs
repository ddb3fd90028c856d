//! Algorithms module for subscription sessions
//!
//! Contains:
//! - Bounded recent-key window (duplicate suppression)
//! - Progress tracker (resume point)
//! - Exponential reconnect backoff

pub mod backoff;
pub mod progress;
pub mod recent_keys;

pub use backoff::Backoff;
pub use progress::ProgressTracker;
pub use recent_keys::RecentKeys;
