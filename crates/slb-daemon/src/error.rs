//! Daemon error types.

use thiserror::Error;

/// Errors from daemon startup and client IPC.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Another daemon owns this project's pidfile.
    #[error("daemon already running with pid {pid}")]
    AlreadyRunning {
        /// The live process.
        pid: i32,
    },

    /// The daemon socket is absent or refused the connection; callers fall
    /// back to direct store access.
    #[error("daemon unavailable: {0}")]
    Unavailable(String),

    /// An RPC call returned an error object.
    #[error("rpc error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code.
        code: i64,
        /// Error message.
        message: String,
    },

    /// The peer sent something that is not JSON-RPC.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A call did not complete inside its deadline.
    #[error("rpc timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Socket or filesystem failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type for daemon operations.
pub type DaemonResult<T> = Result<T, DaemonError>;
