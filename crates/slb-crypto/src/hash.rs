//! Domain-separated digests over canonical field encodings.
//!
//! SLB never hashes a bare byte blob. Every digest names its domain
//! (`slb-command`, `slb-patterns`, `slb-history`, `slb-socket`) and feeds
//! its inputs through the same length-prefixed field encoding the review
//! MAC uses, so two subsystems can never produce colliding digests and a
//! shifted field boundary always changes the result.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::encoding::encode_fields;
use crate::error::{CryptoError, CryptoResult};

/// How many hex characters [`ContentHash::short`] keeps.
const SHORT_HEX_LEN: usize = 16;

/// A 256-bit domain-separated digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Digest a tuple of fields under a domain label.
    ///
    /// The fields are length-prefix encoded (see
    /// [`encode_fields`](crate::encode_fields)) and the domain keys the
    /// hash via BLAKE3 key derivation. This is the only constructor:
    /// callers state what they are hashing and where the field boundaries
    /// sit, never a pre-concatenated blob.
    #[must_use]
    pub fn digest(domain: &str, fields: &[&[u8]]) -> Self {
        let mut hasher = blake3::Hasher::new_derive_key(domain);
        hasher.update(&encode_fields(fields));
        Self(hasher.finalize().into())
    }

    /// Full lowercase hex rendering (64 characters).
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Truncated hex tag for file names and log lines.
    ///
    /// Sixteen hex characters (64 bits): stable, filesystem-safe, and
    /// collision-resistant enough for per-project identifiers.
    #[must_use]
    pub fn short(&self) -> String {
        let mut tag = self.to_hex();
        tag.truncate(SHORT_HEX_LEN);
        tag
    }

    /// Decode from the full hex rendering.
    ///
    /// # Errors
    ///
    /// Returns a [`CryptoError`] when the string is not hex or not 32
    /// bytes worth of it.
    pub fn from_hex(s: &str) -> CryptoResult<Self> {
        let bytes = hex::decode(s).map_err(|e| CryptoError::decode("digest", e))?;
        let raw: [u8; 32] = bytes
            .try_into()
            .map_err(|rest: Vec<u8>| CryptoError::width("digest", rest.len()))?;
        Ok(Self(raw))
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ContentHash").field(&self.short()).finish()
    }
}

impl Serialize for ContentHash {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let hex_str = String::deserialize(deserializer)?;
        Self::from_hex(&hex_str).map_err(serde::de::Error::custom)
    }
}
