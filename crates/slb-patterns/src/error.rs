//! Error types for the pattern engine.

use thiserror::Error;

/// Errors from pattern management and classification.
#[derive(Debug, Error)]
pub enum PatternError {
    /// A regex failed to compile; nothing was mutated.
    #[error("invalid pattern regex: {0}")]
    InvalidRegex(String),

    /// The named pattern does not exist.
    #[error("pattern not found: {0}")]
    NotFound(String),

    /// Removal refused by policy (`pattern_removal_blocked`).
    #[error("pattern_removal_blocked: {reason}")]
    RemovalBlocked {
        /// Why removal was refused.
        reason: String,
    },
}

/// Result type for pattern operations.
pub type PatternResult<T> = Result<T, PatternError>;
