//! # Laserstream Session
//!
//! Resilient client-side subscription sessions for a ledger-streaming
//! service.
//!
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Purpose
//!
//! A consumer declares what it wants (accounts, slots, transactions, blocks,
//! entries) and receives a continuous, ordered stream of typed updates. The
//! session hides connection loss: it reconnects with exponential backoff,
//! resumes from the last slot it delivered, and suppresses items the
//! upstream replays after a resume.
//!
//! ## Guarantees
//!
//! | Property | How |
//! |----------|-----|
//! | No gap after reconnect | resume slot never exceeds the last delivered slot |
//! | Bounded redelivery | per-entity window of recently delivered keys |
//! | Backpressure | bounded queue between driver and consumer |
//! | Prompt cancellation | every suspension point races the cancel flag |
//!
//! ## Module Structure
//!
//! ```text
//! laserstream-session/
//! ├── domain/          # Filters, update records, errors, session state, invariants
//! ├── algorithms/      # Recent-key window, progress tracker, backoff
//! ├── ports/           # Delivery sink + subscription API (inbound), transport + decoder (outbound)
//! ├── adapters/        # In-memory transport, wire decoders
//! ├── application/     # Session controller, handle, dispatcher, client
//! ├── config.rs        # SessionConfig
//! └── metrics.rs       # Prometheus metrics (feature "metrics")
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod algorithms;
pub mod application;
pub mod config;
pub mod domain;
#[allow(missing_docs)]
pub mod metrics;
pub mod ports;

// Re-exports
pub use adapters::{
    in_memory_transport, BincodeDecoder, InMemoryConnector, InMemoryServer, PassthroughDecoder,
    WireDecoder, WireUpdate,
};
pub use algorithms::{Backoff, ProgressTracker, RecentKeys};
pub use application::{
    LaserstreamClient, SessionController, SessionStream, StatsSnapshot, SubscriptionHandle,
    SubscriptionId,
};
pub use config::{BackoffConfig, ConfigError, DedupConfig, LivenessConfig, SessionConfig};
pub use domain::{
    AccountFilter, BlockFilter, CommitmentLevel, ConnectionError, DecodeError, EntityType,
    ErrorClass, FilterError, FilterSpecification, ItemKey, SessionError, SessionState, Slot,
    SlotFilter, TransactionFilter, UpdateRecord,
};
pub use ports::{
    DeliverySink, FrameDecoder, SessionEvent, SplitSink, SubscriptionApi, TransportConnector,
    UpdateStream,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
