//! Error taxonomy for core types.

use thiserror::Error;

/// Validation and parsing errors raised while building core types.
///
/// These are all `Invalid`-class failures in the wider taxonomy: they are
/// rejected before any state changes.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A command string was empty or all whitespace.
    #[error("empty command")]
    EmptyCommand,

    /// A quote or trailing escape was left open during tokenization.
    #[error("unbalanced quotes in command")]
    UnbalancedQuotes,

    /// A redaction pattern failed to compile.
    #[error("invalid redaction pattern: {0}")]
    BadRedactPattern(String),

    /// An identifier could not be parsed.
    #[error("invalid id: {0}")]
    InvalidId(String),

    /// An unknown risk tier name.
    #[error("invalid risk tier: {0}")]
    InvalidTier(String),

    /// An unknown request status name.
    #[error("invalid request status: {0}")]
    InvalidStatus(String),

    /// A rating outside 1..=5.
    #[error("invalid rating: {0} (must be 1..=5)")]
    InvalidRating(u8),
}

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
