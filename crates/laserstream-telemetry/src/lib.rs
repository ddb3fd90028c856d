//! # Laserstream Telemetry
//!
//! Log output setup for processes that run Laserstream sessions.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use laserstream_telemetry::{init_tracing, TelemetryConfig};
//!
//! fn main() {
//!     let config = TelemetryConfig::from_env();
//!     init_tracing(&config).expect("Failed to init tracing");
//!
//!     // Session logs now go to stdout
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `LS_LOG_LEVEL` / `RUST_LOG` | `info` | Log filter directive |
//! | `LS_JSON_LOGS` | `false` (`true` in containers) | JSON lines output |
//! | `LS_CONSOLE_OUTPUT` | `true` | Write logs at all |
//! | `LS_SOURCE_LOCATION` | follows `LS_JSON_LOGS` | Include file and line |
//! | `LS_SERVICE_NAME` | `laserstream` | Name in the startup line |

#![warn(missing_docs)]

mod config;
mod tracing_setup;

pub use config::TelemetryConfig;
pub use tracing_setup::{build_filter, init_test_tracing, init_tracing};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TelemetryError {
    /// The log filter directive could not be parsed.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A global subscriber is already installed.
    #[error("Failed to install tracing subscriber: {0}")]
    SubscriberInit(String),
}

/// Convenience macro for creating a span with session context.
///
/// # Example
///
/// ```rust,ignore
/// use laserstream_telemetry::session_span;
///
/// let _span = session_span!("replay", subscription_id = %id, from_slot = 1000).entered();
/// ```
#[macro_export]
macro_rules! session_span {
    ($name:expr, $($field:tt)*) => {
        tracing::info_span!($name, $($field)*)
    };
}
