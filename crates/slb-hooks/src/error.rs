//! Hook adapter error types.

use thiserror::Error;

/// Errors from guard-script generation and settings mutation.
#[derive(Debug, Error)]
pub enum HookError {
    /// The settings file exists but is not valid JSON.
    #[error("settings file {path} is not valid JSON: {source}")]
    BadSettings {
        /// The file path.
        path: String,
        /// The parse failure.
        source: serde_json::Error,
    },

    /// The settings file has a shape the merge cannot work with (e.g.
    /// `hooks` is a string).
    #[error("settings file {path}: {message}")]
    UnexpectedShape {
        /// The file path.
        path: String,
        /// What was wrong.
        message: String,
    },

    /// Filesystem failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Serialization failure.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Result type for hook operations.
pub type HookResult<T> = Result<T, HookError>;
