//! Review signatures: keyed BLAKE3 MACs over the decision tuple.
//!
//! A review is attributed to a session by a MAC over
//! `(request_id, decision, signature_timestamp)` computed with that
//! session's [`SessionKey`]. The input tuple is encoded with
//! [`encode_fields`](crate::encode_fields), so no two distinct tuples share
//! a byte encoding. Verification is constant-time.

use serde::{Deserialize, Serialize};
use std::fmt;
use subtle::ConstantTimeEq;

use crate::encoding::encode_fields;
use crate::error::CryptoError;
use crate::session_key::SessionKey;

/// A keyed MAC attributing a review decision to a session (32 bytes).
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ReviewSignature([u8; 32]);

impl ReviewSignature {
    /// Get the raw MAC bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Encode as a hex string.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Decode from a hex string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not valid hex or not 32 bytes.
    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(s).map_err(|e| CryptoError::decode("review signature", e))?;
        let raw: [u8; 32] = bytes
            .try_into()
            .map_err(|rest: Vec<u8>| CryptoError::width("review signature", rest.len()))?;
        Ok(Self(raw))
    }
}

impl fmt::Debug for ReviewSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ReviewSignature({}..)", &self.to_hex()[..12])
    }
}

impl Serialize for ReviewSignature {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ReviewSignature {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// MAC input for a review decision.
fn mac_input(request_id: &str, decision: &str, timestamp_rfc3339: &str) -> Vec<u8> {
    encode_fields(&[
        request_id.as_bytes(),
        decision.as_bytes(),
        timestamp_rfc3339.as_bytes(),
    ])
}

/// Sign a review decision with a session key.
#[must_use]
pub fn sign_review(
    key: &SessionKey,
    request_id: &str,
    decision: &str,
    timestamp_rfc3339: &str,
) -> ReviewSignature {
    let mac = blake3::keyed_hash(key.as_bytes(), &mac_input(request_id, decision, timestamp_rfc3339));
    ReviewSignature(*mac.as_bytes())
}

/// Verify a review signature in constant time.
///
/// Returns `true` iff `signature` is the MAC of
/// `(request_id, decision, timestamp)` under `key`.
#[must_use]
pub fn verify_review(
    key: &SessionKey,
    request_id: &str,
    decision: &str,
    timestamp_rfc3339: &str,
    signature: &ReviewSignature,
) -> bool {
    let expected = sign_review(key, request_id, decision, timestamp_rfc3339);
    expected.0.ct_eq(&signature.0).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TS: &str = "2026-02-01T10:00:00Z";

    #[test]
    fn test_sign_and_verify() {
        let key = SessionKey::generate();
        let sig = sign_review(&key, "req-1", "approve", TS);
        assert!(verify_review(&key, "req-1", "approve", TS, &sig));
    }

    #[test]
    fn test_wrong_key_rejected() {
        let key = SessionKey::generate();
        let other = SessionKey::generate();
        let sig = sign_review(&key, "req-1", "approve", TS);
        assert!(!verify_review(&other, "req-1", "approve", TS, &sig));
    }

    #[test]
    fn test_wrong_decision_rejected() {
        let key = SessionKey::generate();
        let sig = sign_review(&key, "req-1", "approve", TS);
        assert!(!verify_review(&key, "req-1", "reject", TS, &sig));
    }

    #[test]
    fn test_wrong_timestamp_rejected() {
        let key = SessionKey::generate();
        let sig = sign_review(&key, "req-1", "approve", TS);
        assert!(!verify_review(&key, "req-1", "approve", "2026-02-01T10:00:01Z", &sig));
    }

    #[test]
    fn test_wrong_request_rejected() {
        let key = SessionKey::generate();
        let sig = sign_review(&key, "req-1", "approve", TS);
        assert!(!verify_review(&key, "req-2", "approve", TS, &sig));
    }

    #[test]
    fn test_field_boundary_shift_rejected() {
        // ("req-1a", "pprove") must not verify against ("req-1", "approve").
        let key = SessionKey::generate();
        let sig = sign_review(&key, "req-1", "approve", TS);
        assert!(!verify_review(&key, "req-1a", "pprove", TS, &sig));
    }

    #[test]
    fn test_hex_serde_roundtrip() {
        let key = SessionKey::generate();
        let sig = sign_review(&key, "req-1", "approve", TS);
        let json = serde_json::to_string(&sig).unwrap();
        let decoded: ReviewSignature = serde_json::from_str(&json).unwrap();
        assert_eq!(sig, decoded);
    }
}
