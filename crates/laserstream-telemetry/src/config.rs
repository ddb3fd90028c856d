//! Telemetry configuration from environment variables.

use std::env;

/// Configuration for log output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Service name attached to the startup log line
    pub service_name: String,

    /// Log filter directive (`info`, `laserstream_session=debug`, ...)
    pub log_level: String,

    /// Whether to write logs at all
    pub console_output: bool,

    /// JSON lines instead of human-readable output
    pub json_logs: bool,

    /// Include source file and line in each record
    pub source_location: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "laserstream".to_string(),
            log_level: "info".to_string(),
            console_output: true,
            json_logs: false,
            source_location: false,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `LS_SERVICE_NAME`: Service name (default: laserstream)
    /// - `LS_LOG_LEVEL` or `RUST_LOG`: Log filter (default: info)
    /// - `LS_CONSOLE_OUTPUT`: Enable output (default: true)
    /// - `LS_JSON_LOGS`: Enable JSON logs (default: false in dev, true in containers)
    /// - `LS_SOURCE_LOCATION`: Include file and line (default: follows JSON logs)
    pub fn from_env() -> Self {
        let is_container =
            env::var("KUBERNETES_SERVICE_HOST").is_ok() || env::var("DOCKER_CONTAINER").is_ok();

        Self::from_lookup(|key| env::var(key).ok(), is_container)
    }

    /// Build from an arbitrary variable source.
    pub(crate) fn from_lookup<F>(lookup: F, is_container: bool) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let json_logs = lookup("LS_JSON_LOGS")
            .map(|v| is_truthy(&v))
            .unwrap_or(is_container);

        Self {
            service_name: lookup("LS_SERVICE_NAME").unwrap_or_else(|| "laserstream".to_string()),

            log_level: lookup("LS_LOG_LEVEL")
                .or_else(|| lookup("RUST_LOG"))
                .unwrap_or_else(|| "info".to_string()),

            console_output: lookup("LS_CONSOLE_OUTPUT")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(true),

            json_logs,

            source_location: lookup("LS_SOURCE_LOCATION")
                .map(|v| is_truthy(&v))
                .unwrap_or(json_logs),
        }
    }

    /// Quiet configuration for test binaries.
    pub fn for_testing() -> Self {
        Self {
            service_name: "laserstream-tests".to_string(),
            log_level: "warn".to_string(),
            ..Self::default()
        }
    }
}

fn is_truthy(value: &str) -> bool {
    value.eq_ignore_ascii_case("true") || value == "1"
}
