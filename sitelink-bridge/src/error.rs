//! Error types for the gateway.

use thiserror::Error;

use sitelink_cloud::CloudError;
use sitelink_device::DeviceError;
use sitelink_snmp::SnmpError;

/// Result type alias using [`BridgeError`].
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors that can occur in the gateway.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration validation error.
    #[error("Configuration validation failed: {0}")]
    ConfigValidation(String),

    /// Operation not allowed in the current lifecycle state.
    #[error("Bridge is {actual}, expected {expected}")]
    State {
        expected: &'static str,
        actual: &'static str,
    },

    /// Framed-protocol device error.
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    /// SNMP adapter error.
    #[error("SNMP error: {0}")]
    Snmp(#[from] SnmpError),

    /// Backend error.
    #[error("Cloud error: {0}")]
    Cloud(#[from] CloudError),

    /// Adapter or command handler error.
    #[error(transparent)]
    Adapter(#[from] sitelink_common::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a configuration validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ConfigValidation(msg.into())
    }
}
