//! Error types for mint communication.

/// Failure talking to a mint.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum MintError {
    /// Network-level failure (connect, timeout, TLS).
    #[error("network error: {0}")]
    Network(String),

    /// The mint answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly truncated.
        body: String,
    },

    /// The response body did not match the expected shape.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// A split response failed validation.
    #[error("split rejected: {0}")]
    SplitRejected(String),

    /// The client could not be constructed.
    #[error("client error: {0}")]
    Client(String),
}

impl MintError {
    /// Whether retrying the same call may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for MintError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Network("request timed out".into())
        } else if err.is_connect() {
            Self::Network(format!("connection failed: {err}"))
        } else if err.is_decode() {
            Self::InvalidResponse(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

/// Result type for mint operations.
pub type MintResult<T> = Result<T, MintError>;
