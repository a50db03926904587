use thiserror::Error;

/// Errors raised by the backend client.
#[derive(Debug, Error)]
pub enum CloudError {
    #[error("Invalid cloud configuration: {0}")]
    Config(String),

    #[error("Not authenticated: no token")]
    NoToken,

    #[error("Not authenticated: token expired")]
    TokenExpired,

    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    /// A 401 was answered by a successful re-login; the request must be
    /// sent again.
    #[error("Re-authenticated after 401, request must be retried")]
    RetryAfterReauth,

    #[error("Backend returned {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Failed to decode backend response: {0}")]
    Decode(String),

    #[error("Request failed after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: Box<CloudError> },
}

impl CloudError {
    /// Errors that mean the gateway cannot authenticate right now.
    pub fn is_auth_error(&self) -> bool {
        match self {
            CloudError::NoToken | CloudError::TokenExpired | CloudError::AuthFailed(_) => true,
            CloudError::RetriesExhausted { last, .. } => last.is_auth_error(),
            _ => false,
        }
    }

    /// Errors worth another attempt within the retry budget.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CloudError::RetryAfterReauth | CloudError::Http { .. } | CloudError::Transport(_)
        )
    }
}

/// Result type alias for the cloud client.
pub type Result<T> = std::result::Result<T, CloudError>;
