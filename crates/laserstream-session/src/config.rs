//! # Session Configuration
//!
//! Tunables for reconnect, resume, liveness and delivery. Every field has a
//! default, so an empty TOML document is a valid configuration.
//!
//! ```toml
//! endpoint = "https://laserstream-mainnet.example:443"
//! max_consecutive_malformed = 16
//! channel_capacity = 1024
//! surface_transient_errors = false
//!
//! [backoff]
//! floor_ms = 100
//! ceiling_ms = 30000
//! jitter_ratio = 0.1
//! healthy_after_secs = 30
//! # max_attempts = 20
//!
//! [dedup]
//! window_capacity = 2048
//! resume_slot_margin = 0
//!
//! [liveness]
//! idle_threshold_ms = 30000
//! pong_timeout_ms = 10000
//! connect_timeout_ms = 10000
//! subscribe_timeout_ms = 10000
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::domain::invariants::*;

/// Errors that can occur while loading configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("Failed to read config file {path}: {error}")]
    Io {
        /// Path of the file that failed to load.
        path: String,
        /// Error message from the I/O operation.
        error: String,
    },

    /// The TOML could not be parsed.
    #[error("Failed to parse config: {0}")]
    Parse(String),

    /// A value is out of range.
    #[error("Invalid config value {field}: {reason}")]
    Invalid {
        /// Offending field.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

/// Reconnect backoff settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// First delay.
    pub floor_ms: u64,
    /// Largest delay.
    pub ceiling_ms: u64,
    /// Random spread as a fraction of the delay.
    pub jitter_ratio: f64,
    /// Streaming this long resets the delay to the floor.
    pub healthy_after_secs: u64,
    /// Consecutive failed attempts before giving up; unbounded when absent.
    pub max_attempts: Option<u32>,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            floor_ms: DEFAULT_BACKOFF_FLOOR_MS,
            ceiling_ms: DEFAULT_BACKOFF_CEILING_MS,
            jitter_ratio: DEFAULT_JITTER_RATIO,
            healthy_after_secs: DEFAULT_HEALTHY_AFTER_SECS,
            max_attempts: None,
        }
    }
}

/// Duplicate suppression and resume settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Keys remembered per entity type; zero disables suppression.
    pub window_capacity: usize,
    /// Slots re-requested behind the last delivered slot.
    pub resume_slot_margin: u64,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            window_capacity: DEFAULT_DEDUP_WINDOW,
            resume_slot_margin: DEFAULT_RESUME_SLOT_MARGIN,
        }
    }
}

/// Liveness and per-phase timeouts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LivenessConfig {
    /// Silence before a probe is sent; probing is off when absent.
    pub idle_threshold_ms: Option<u64>,
    /// Time for a probe to be answered.
    pub pong_timeout_ms: u64,
    /// Time for a connection to open.
    pub connect_timeout_ms: u64,
    /// Time for a subscribe to be acknowledged.
    pub subscribe_timeout_ms: u64,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            idle_threshold_ms: Some(DEFAULT_IDLE_THRESHOLD_MS),
            pong_timeout_ms: DEFAULT_PONG_TIMEOUT_MS,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            subscribe_timeout_ms: DEFAULT_SUBSCRIBE_TIMEOUT_MS,
        }
    }
}

/// Full session configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Upstream endpoint handed to the transport connector.
    pub endpoint: String,
    /// Reconnect backoff.
    pub backoff: BackoffConfig,
    /// Duplicate suppression and resume.
    pub dedup: DedupConfig,
    /// Liveness probing and timeouts.
    pub liveness: LivenessConfig,
    /// Consecutive undecodable frames tolerated before reconnecting.
    pub max_consecutive_malformed: u32,
    /// Updates buffered for the consumer before the session stops reading.
    pub channel_capacity: usize,
    /// Deliver transient errors to the consumer as non-terminal notices.
    pub surface_transient_errors: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            backoff: BackoffConfig::default(),
            dedup: DedupConfig::default(),
            liveness: LivenessConfig::default(),
            max_consecutive_malformed: DEFAULT_MAX_CONSECUTIVE_MALFORMED,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            surface_transient_errors: false,
        }
    }
}

impl SessionConfig {
    /// Default configuration for the given endpoint.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    /// Short timeouts and no jitter, for deterministic tests.
    pub fn for_testing() -> Self {
        Self {
            endpoint: "memory://test".to_string(),
            backoff: BackoffConfig {
                floor_ms: 10,
                ceiling_ms: 80,
                jitter_ratio: 0.0,
                healthy_after_secs: 1,
                max_attempts: None,
            },
            dedup: DedupConfig {
                window_capacity: 256,
                resume_slot_margin: 0,
            },
            liveness: LivenessConfig {
                idle_threshold_ms: Some(500),
                pong_timeout_ms: 200,
                connect_timeout_ms: 200,
                subscribe_timeout_ms: 200,
            },
            max_consecutive_malformed: 4,
            channel_capacity: 64,
            surface_transient_errors: false,
        }
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, parsed, or validated.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            error: e.to_string(),
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: SessionConfig =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backoff.floor_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "backoff.floor_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.backoff.ceiling_ms < self.backoff.floor_ms {
            return Err(ConfigError::Invalid {
                field: "backoff.ceiling_ms",
                reason: format!(
                    "{} is below floor {}",
                    self.backoff.ceiling_ms, self.backoff.floor_ms
                ),
            });
        }
        if !(0.0..=1.0).contains(&self.backoff.jitter_ratio) {
            return Err(ConfigError::Invalid {
                field: "backoff.jitter_ratio",
                reason: format!("{} is outside 0.0..=1.0", self.backoff.jitter_ratio),
            });
        }
        if self.backoff.max_attempts == Some(0) {
            return Err(ConfigError::Invalid {
                field: "backoff.max_attempts",
                reason: "must allow at least one attempt".to_string(),
            });
        }
        if self.channel_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "channel_capacity",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.max_consecutive_malformed == 0 {
            return Err(ConfigError::Invalid {
                field: "max_consecutive_malformed",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// First reconnect delay.
    pub fn backoff_floor(&self) -> Duration {
        Duration::from_millis(self.backoff.floor_ms)
    }

    /// Largest reconnect delay.
    pub fn backoff_ceiling(&self) -> Duration {
        Duration::from_millis(self.backoff.ceiling_ms)
    }

    /// Streaming period after which backoff resets.
    pub fn healthy_after(&self) -> Duration {
        Duration::from_secs(self.backoff.healthy_after_secs)
    }

    /// Silence before a liveness probe, if probing is on.
    pub fn idle_threshold(&self) -> Option<Duration> {
        self.liveness.idle_threshold_ms.map(Duration::from_millis)
    }

    /// Time for a probe to be answered.
    pub fn pong_timeout(&self) -> Duration {
        Duration::from_millis(self.liveness.pong_timeout_ms)
    }

    /// Time for a connection to open.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.liveness.connect_timeout_ms)
    }

    /// Time for a subscribe to be acknowledged.
    pub fn subscribe_timeout(&self) -> Duration {
        Duration::from_millis(self.liveness.subscribe_timeout_ms)
    }
}
