//! Error type for crypto operations.

use thiserror::Error;

/// Failure to decode a hex-encoded fixed-width value.
///
/// Every decodable value in this crate (digest, session key, review
/// signature) is exactly 32 bytes, so a single error shape covers them
/// all; `what` names the value for the caller's message.
#[derive(Debug, Error)]
#[error("cannot decode {what} from hex: {reason}")]
pub struct CryptoError {
    /// What was being decoded.
    pub what: &'static str,
    /// Why decoding failed.
    pub reason: String,
}

impl CryptoError {
    /// The hex itself was malformed.
    pub(crate) fn decode(what: &'static str, cause: impl std::fmt::Display) -> Self {
        Self {
            what,
            reason: cause.to_string(),
        }
    }

    /// The hex decoded, but not to 32 bytes.
    pub(crate) fn width(what: &'static str, actual: usize) -> Self {
        Self {
            what,
            reason: format!("expected 32 bytes, found {actual}"),
        }
    }
}

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_names_the_value() {
        let err = CryptoError::width("session key", 7);
        let text = err.to_string();
        assert!(text.contains("session key"));
        assert!(text.contains("found 7"));
    }
}
