//! # Session Metrics
//!
//! Prometheus metrics for subscription sessions.
//!
//! ## Usage
//!
//! Enable with the `metrics` feature:
//! ```toml
//! laserstream-session = { path = "...", features = ["metrics"] }
//! ```
//!
//! ## Metrics Exported
//!
//! - `laserstream_updates_delivered_total` - Counter of delivered updates (by entity)
//! - `laserstream_duplicates_suppressed_total` - Counter of suppressed redeliveries
//! - `laserstream_malformed_frames_total` - Counter of frames that failed to decode
//! - `laserstream_reconnects_total` - Counter of reconnect cycles
//! - `laserstream_session_failures_total` - Counter of terminal failures (by class)
//! - `laserstream_last_delivered_slot` - Gauge of the highest delivered slot

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
use prometheus::{
    register_int_counter, register_int_counter_vec, register_int_gauge, IntCounter,
    IntCounterVec, IntGauge,
};

#[cfg(feature = "metrics")]
lazy_static! {
    /// Delivered updates, labeled by entity type
    pub static ref UPDATES_DELIVERED: IntCounterVec = register_int_counter_vec!(
        "laserstream_updates_delivered_total",
        "Total number of updates delivered to consumers",
        &["entity"]
    )
    .expect("Failed to create UPDATES_DELIVERED metric");

    /// Updates dropped as redeliveries
    pub static ref DUPLICATES_SUPPRESSED: IntCounter = register_int_counter!(
        "laserstream_duplicates_suppressed_total",
        "Total number of redelivered updates suppressed"
    )
    .expect("Failed to create DUPLICATES_SUPPRESSED metric");

    /// Frames that failed to decode
    pub static ref MALFORMED_FRAMES: IntCounter = register_int_counter!(
        "laserstream_malformed_frames_total",
        "Total number of frames that failed to decode"
    )
    .expect("Failed to create MALFORMED_FRAMES metric");

    /// Reconnect cycles
    pub static ref RECONNECTS: IntCounter = register_int_counter!(
        "laserstream_reconnects_total",
        "Total number of reconnect cycles"
    )
    .expect("Failed to create RECONNECTS metric");

    /// Terminal failures, labeled by error class
    pub static ref SESSION_FAILURES: IntCounterVec = register_int_counter_vec!(
        "laserstream_session_failures_total",
        "Total number of sessions ended by an error",
        &["class"]
    )
    .expect("Failed to create SESSION_FAILURES metric");

    /// Highest slot delivered by any session
    pub static ref LAST_DELIVERED_SLOT: IntGauge = register_int_gauge!(
        "laserstream_last_delivered_slot",
        "Highest slot delivered to a consumer"
    )
    .expect("Failed to create LAST_DELIVERED_SLOT metric");
}

// =============================================================================
// METRIC RECORDING FUNCTIONS
// =============================================================================

/// Record an update delivered
#[cfg(feature = "metrics")]
pub fn record_delivered(entity: &str, slot: u64) {
    UPDATES_DELIVERED.with_label_values(&[entity]).inc();
    if slot as i64 > LAST_DELIVERED_SLOT.get() {
        LAST_DELIVERED_SLOT.set(slot as i64);
    }
}

/// Record a suppressed redelivery
#[cfg(feature = "metrics")]
pub fn record_duplicate_suppressed() {
    DUPLICATES_SUPPRESSED.inc();
}

/// Record a frame that failed to decode
#[cfg(feature = "metrics")]
pub fn record_malformed_frame() {
    MALFORMED_FRAMES.inc();
}

/// Record a reconnect cycle
#[cfg(feature = "metrics")]
pub fn record_reconnect() {
    RECONNECTS.inc();
}

/// Record a terminal failure with its class
#[cfg(feature = "metrics")]
pub fn record_session_failure(class: &str) {
    SESSION_FAILURES.with_label_values(&[class]).inc();
}

// =============================================================================
// NO-OP IMPLEMENTATIONS (when metrics feature disabled)
// =============================================================================

#[cfg(not(feature = "metrics"))]
pub fn record_delivered(_entity: &str, _slot: u64) {}

#[cfg(not(feature = "metrics"))]
pub fn record_duplicate_suppressed() {}

#[cfg(not(feature = "metrics"))]
pub fn record_malformed_frame() {}

#[cfg(not(feature = "metrics"))]
pub fn record_reconnect() {}

#[cfg(not(feature = "metrics"))]
pub fn record_session_failure(_class: &str) {}
