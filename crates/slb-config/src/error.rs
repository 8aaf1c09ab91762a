//! Configuration error types.

use thiserror::Error;

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A config file could not be read.
    #[error("failed to read config {path}: {source}")]
    ReadError {
        /// The file path.
        path: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A config file was not valid TOML for the schema.
    #[error("failed to parse config {path}: {source}")]
    ParseError {
        /// The file path.
        path: String,
        /// The underlying TOML error.
        source: toml::de::Error,
    },

    /// An environment override had an unusable value.
    #[error("invalid value for {var}: {message}")]
    EnvError {
        /// The environment variable.
        var: String,
        /// What was wrong with it.
        message: String,
    },

    /// A field failed validation.
    #[error("invalid config: {field}: {message}")]
    ValidationError {
        /// Dotted field path.
        field: String,
        /// What was wrong with it.
        message: String,
    },
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
