//! SiteLink Common Library
//!
//! Shared types and utilities for the SiteLink edge gateway crates:
//!
//! - [`metric`] - Normalized metric model (`Metric`, `MetricType`, `MetricMapping`)
//! - [`adapter`] - Capability traits implemented by metric sources and command targets
//! - [`event`] - Typed events pushed by devices
//! - [`config`] - Configuration loading (JSON5 format) and logging settings
//! - [`error`] - Error types

pub mod adapter;
pub mod config;
pub mod error;
pub mod event;
pub mod metric;

// Re-export commonly used types at the crate root
pub use adapter::{CommandHandler, CommandOutcome, DeviceCommand, MetricAdapter};
pub use config::{LogFormat, LoggingConfig, load_config, parse_config};
pub use error::{Error, Result};
pub use event::{AlertEvent, AlertKind, AlertSeverity, DeviceEvent, DeviceStatusReport};
pub use metric::{Metric, MetricMapping, MetricType};

/// Initialize tracing with the given configuration.
///
/// Supports two output formats:
/// - `LogFormat::Text` (default): Human-readable text format
/// - `LogFormat::Json`: Structured JSON format for log aggregation systems
///
/// `RUST_LOG` takes precedence over the configured level when set.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format {
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(fmt::layer())
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(fmt::layer().json())
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
    }

    Ok(())
}
