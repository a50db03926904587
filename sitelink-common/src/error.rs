use thiserror::Error;

/// Common error type for SiteLink components.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Adapter '{adapter}' is not connected")]
    NotConnected { adapter: String },

    #[error("Adapter '{adapter}' failed: {message}")]
    Adapter { adapter: String, message: String },

    #[error("Command {command_id} failed: {message}")]
    Command { command_id: i64, message: String },

    #[error("Unknown metric type: {0}")]
    UnknownMetricType(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create an adapter error.
    pub fn adapter(adapter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Adapter {
            adapter: adapter.into(),
            message: message.into(),
        }
    }
}

/// Result type alias using SiteLink's Error.
pub type Result<T> = std::result::Result<T, Error>;
