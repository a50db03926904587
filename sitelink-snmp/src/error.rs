use std::time::Duration;

use thiserror::Error;

/// Errors raised by the SNMP adapter.
#[derive(Debug, Error)]
pub enum SnmpError {
    #[error("Invalid SNMP configuration: {0}")]
    Config(String),

    #[error("Invalid OID '{oid}': {reason}")]
    InvalidOid { oid: String, reason: String },

    #[error("Failed to create SNMP session to {target}: {reason}")]
    Session { target: String, reason: String },

    #[error("SNMP request failed: {0}")]
    Request(String),

    #[error("SNMP request timed out after {0:?}")]
    Timeout(Duration),

    #[error("SNMP adapter is not connected")]
    NotConnected,
}

impl SnmpError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Result type alias for the SNMP adapter.
pub type Result<T> = std::result::Result<T, SnmpError>;
