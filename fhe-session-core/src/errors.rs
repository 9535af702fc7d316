use thiserror::Error;

pub type Result<T> = std::result::Result<T, SessionError>;
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Failures reported by a remote encryption provider or ledger connection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("request timed out")]
    Timeout,
    #[error("remote returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("chain id mismatch: expected {expected}, got {actual}")]
    ChainMismatch { expected: u64, actual: u64 },
    #[error("invalid public parameters: {0}")]
    InvalidParams(String),
}

impl ProviderError {
    /// Whether a retry has a chance of succeeding.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Transport(_) | ProviderError::Timeout => true,
            ProviderError::Status { status, .. } => *status == 429 || *status >= 500,
            ProviderError::InvalidResponse(_)
            | ProviderError::ChainMismatch { .. }
            | ProviderError::InvalidParams(_) => false,
        }
    }
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout
        } else if let Some(status) = err.status() {
            ProviderError::Status {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else if err.is_decode() {
            ProviderError::InvalidResponse(err.to_string())
        } else {
            ProviderError::Transport(err.to_string())
        }
    }
}

/// Errors surfaced by sessions and the lifecycle manager.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// An operation was attempted before the session reached `Ready`.
    #[error("encryption session is not initialized")]
    NotInitialized,
    #[error("session initialization failed: {cause}")]
    Initialization {
        #[source]
        cause: ProviderError,
    },
    #[error("encryption failed after {attempts} attempt(s): {cause}")]
    Encryption {
        #[source]
        cause: ProviderError,
        attempts: u32,
    },
    #[error("authorization proof request failed: {cause}")]
    Authorization {
        #[source]
        cause: ProviderError,
    },
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Configuration rejected while building a session.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl SessionError {
    /// The remote failure behind this error, if any.
    pub fn provider_cause(&self) -> Option<&ProviderError> {
        match self {
            SessionError::Initialization { cause }
            | SessionError::Encryption { cause, .. }
            | SessionError::Authorization { cause } => Some(cause),
            _ => None,
        }
    }
}
