//! Per-session MAC keys.

use rand::RngCore;
use rand::rngs::OsRng;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CryptoError;

/// A per-session 256-bit secret used as the MAC key for review signatures.
///
/// Generated once at session start and returned to the caller exactly once;
/// the store keeps a copy for later verification. The key material is
/// zeroized when the value is dropped and never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SessionKey([u8; 32]);

impl SessionKey {
    /// Generate a fresh random key from the OS entropy source.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Get the raw key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Encode as a hex string, for the one-time handoff to the session owner
    /// and for persistence alongside the session row.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Decode from a hex string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not valid hex or not 32 bytes.
    /// Intermediate buffers are zeroized on every path.
    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let mut bytes = hex::decode(s).map_err(|e| CryptoError::decode("session key", e))?;
        if bytes.len() != 32 {
            let actual = bytes.len();
            bytes.zeroize();
            return Err(CryptoError::width("session key", actual));
        }
        let mut out = [0u8; 32];
        out.copy_from_slice(&bytes);
        bytes.zeroize();
        Ok(Self(out))
    }
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionKey(..)")
    }
}
