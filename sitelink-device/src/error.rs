//! Error types for device sessions.

use thiserror::Error;

use crate::codec::FrameError;

/// Result type alias using [`DeviceError`].
pub type Result<T> = std::result::Result<T, DeviceError>;

/// Errors raised by a device session.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Device is not connected")]
    NotConnected,

    #[error("No response within {0:?}")]
    Timeout(std::time::Duration),

    #[error("No usable response (session closed or response undecodable)")]
    Closed,

    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("Unexpected response: expected {expected}, got {actual}")]
    UnexpectedResponse {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Device rejected request (code {code}): {message}")]
    Rejected { code: i32, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

