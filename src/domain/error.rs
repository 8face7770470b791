//! Domain errors for the Octant core.

use thiserror::Error;

/// Coarse classification of a [`CoreError`].
///
/// Used where callers branch on the failure class rather than the message,
/// e.g. the tool pool evicts a client on `Timeout`/`Protocol`, and the
/// registry cascade continues past anything that is not `NotFound`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Timeout,
    Transport,
    Protocol,
    Validation,
    Policy,
    Unsupported,
    Internal,
}

/// Errors surfaced by the core components.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The requested entity does not exist. Reserved for lookups where the
    /// caller asked for a specific thing; "no match" flows are `Option`.
    #[error("not found: {0}")]
    NotFound(String),

    /// An operation exceeded its deadline.
    #[error("timed out: {0}")]
    Timeout(String),

    /// I/O or network failure talking to an external collaborator.
    #[error("transport error: {0}")]
    Transport(String),

    /// Malformed JSON-RPC, bad JSON, or an unexpected wire shape.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Schema, position-coverage, or embedding-dimension violation.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Inline-script denylist hit.
    #[error("policy violation: {0}")]
    Policy(String),

    /// Unknown keybind token or unsupported transport.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Store I/O or other internal failure.
    #[error("internal error: {0}")]
    Internal(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// The coarse kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Transport(_) => ErrorKind::Transport,
            Self::Protocol(_) => ErrorKind::Protocol,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Policy(_) => ErrorKind::Policy,
            Self::Unsupported(_) => ErrorKind::Unsupported,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => CoreError::NotFound("row not found".to_string()),
            other => CoreError::Internal(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Protocol(err.to_string())
    }
}

impl From<std::io::Error> for CoreError {
    fn from(err: std::io::Error) -> Self {
        CoreError::Transport(err.to_string())
    }
}
