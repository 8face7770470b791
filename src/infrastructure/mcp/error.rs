//! Error types for tool-server integration.

use thiserror::Error;

use crate::domain::error::CoreError;

/// Errors that can occur talking to a tool server.
#[derive(Debug, Error)]
pub enum McpError {
    /// The server process could not be spawned at all.
    #[error("failed to spawn tool server: {0}")]
    SpawnFailed(String),

    /// The process exited within the spawn grace period.
    #[error("tool server exited during startup: {0}")]
    ConnectionFailed(String),

    /// The process died after being connected.
    #[error("tool server process has exited")]
    ProcessExited,

    /// A call did not complete within its deadline. The connection itself
    /// survives a timeout; the pool decides whether to evict.
    #[error("timeout waiting for tool server response")]
    Timeout,

    /// The server answered with a JSON-RPC error object.
    #[error("tool server error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// The server produced something that is not valid JSON-RPC.
    #[error("invalid tool server response: {0}")]
    InvalidResponse(String),

    /// The descriptor asks for a transport this build does not speak.
    #[error("unsupported transport: {0}")]
    Unsupported(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl McpError {
    /// Whether the pool should drop the client after this error so the
    /// next caller gets a fresh process.
    pub fn should_evict(&self) -> bool {
        matches!(
            self,
            McpError::Timeout
                | McpError::ProcessExited
                | McpError::Rpc { .. }
                | McpError::InvalidResponse(_)
                | McpError::Io(_)
                | McpError::Json(_)
        )
    }
}

impl From<McpError> for CoreError {
    fn from(err: McpError) -> Self {
        match err {
            McpError::Timeout => CoreError::Timeout("tool server call".to_string()),
            McpError::Rpc { .. } | McpError::InvalidResponse(_) | McpError::Json(_) => {
                CoreError::Protocol(err.to_string())
            }
            McpError::Unsupported(_) => CoreError::Unsupported(err.to_string()),
            McpError::SpawnFailed(_)
            | McpError::ConnectionFailed(_)
            | McpError::ProcessExited
            | McpError::Io(_) => CoreError::Transport(err.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, McpError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::ErrorKind;

    #[test]
    fn timeout_and_protocol_errors_evict() {
        assert!(McpError::Timeout.should_evict());
        assert!(McpError::ProcessExited.should_evict());
        assert!(McpError::Rpc {
            code: -32600,
            message: "bad".into()
        }
        .should_evict());
        assert!(!McpError::SpawnFailed("missing".into()).should_evict());
        assert!(!McpError::Unsupported("sse".into()).should_evict());
    }

    #[test]
    fn maps_to_core_error_kinds() {
        assert_eq!(CoreError::from(McpError::Timeout).kind(), ErrorKind::Timeout);
        assert_eq!(
            CoreError::from(McpError::ProcessExited).kind(),
            ErrorKind::Transport
        );
        assert_eq!(
            CoreError::from(McpError::Rpc {
                code: 1,
                message: "x".into()
            })
            .kind(),
            ErrorKind::Protocol
        );
        assert_eq!(
            CoreError::from(McpError::Unsupported("sse".into())).kind(),
            ErrorKind::Unsupported
        );
    }
}
