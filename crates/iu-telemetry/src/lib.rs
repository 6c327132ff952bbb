//! # IU Telemetry
//!
//! Installs the `tracing` subscriber for processes built on IU buffers.
//! The library crates only emit events; binaries and test harnesses call
//! [`init_telemetry`] once at startup.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use iu_telemetry::{init_telemetry, TelemetryConfig};
//!
//! fn main() {
//!     let _guard = init_telemetry(&TelemetryConfig::for_component("asr"))
//!         .expect("Failed to init telemetry");
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `IU_SERVICE_NAME` | `incremental-units` | Service name on every line |
//! | `IU_LOG_LEVEL` | `info` | Filter directives, falls back to `RUST_LOG` |
//! | `IU_JSON_LOGS` | `false` | JSON lines instead of pretty output |
//! | `IU_CONSOLE_OUTPUT` | `true` | Disable to silence the console |

mod config;
mod logging;

pub use config::TelemetryConfig;

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TelemetryError {
    #[error("A global tracing subscriber is already installed")]
    AlreadyInitialized,

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Installs the global subscriber.
///
/// Returns a guard to hold for the lifetime of the process. A second call
/// returns [`TelemetryError::AlreadyInitialized`].
pub fn init_telemetry(config: &TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    logging::init_logging(config)?;

    tracing::info!(
        service = %config.service_name,
        json_logs = config.json_logs,
        "Telemetry initialized"
    );

    Ok(TelemetryGuard {
        service_name: config.service_name.clone(),
    })
}

/// Guard that keeps telemetry active.
#[derive(Debug)]
pub struct TelemetryGuard {
    service_name: String,
}

impl TelemetryGuard {
    pub fn service_name(&self) -> &str {
        &self.service_name
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!(service = %self.service_name, "Shutting down telemetry");
    }
}
