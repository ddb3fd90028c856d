//! Application layer: the session driver and everything the caller holds
//! on to while it runs.

pub mod client;
pub mod controller;
pub mod dispatch;
pub mod handle;

pub use client::LaserstreamClient;
pub use controller::SessionController;
pub use dispatch::SessionStream;
pub use handle::{SessionStats, SessionStatus, StatsSnapshot, SubscriptionHandle, SubscriptionId};
