//! Telemetry configuration from environment variables.

use std::env;

const DEFAULT_SERVICE_NAME: &str = "incremental-units";

/// Configuration for log output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Service name attached to every log line
    pub service_name: String,

    /// Filter directives (trace, debug, info, warn, error, or `target=level` lists)
    pub log_level: String,

    /// Whether to write anything to the console
    pub console_output: bool,

    /// JSON lines instead of the human readable format
    pub json_logs: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            log_level: "info".to_string(),
            console_output: true,
            json_logs: false,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `IU_SERVICE_NAME`: Service name (default: incremental-units)
    /// - `IU_LOG_LEVEL` or `RUST_LOG`: Filter directives (default: info)
    /// - `IU_JSON_LOGS`: JSON output (default: false)
    /// - `IU_CONSOLE_OUTPUT`: Console output (default: true)
    pub fn from_env() -> Self {
        Self {
            service_name: env::var("IU_SERVICE_NAME")
                .unwrap_or_else(|_| DEFAULT_SERVICE_NAME.to_string()),

            log_level: env::var("IU_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string()),

            console_output: env::var("IU_CONSOLE_OUTPUT")
                .map(|v| !is_false(&v))
                .unwrap_or(true),

            json_logs: env::var("IU_JSON_LOGS")
                .map(|v| is_true(&v))
                .unwrap_or(false),
        }
    }

    /// Environment configuration with the service name of one component.
    pub fn for_component(component: &str) -> Self {
        let mut config = Self::from_env();
        config.service_name = component.to_string();
        config
    }
}

fn is_true(value: &str) -> bool {
    value.eq_ignore_ascii_case("true") || value == "1"
}

fn is_false(value: &str) -> bool {
    value.eq_ignore_ascii_case("false") || value == "0"
}
