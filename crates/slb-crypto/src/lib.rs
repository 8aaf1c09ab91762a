//! SLB Crypto - hashing and attribution primitives.
//!
//! This crate provides:
//! - [`ContentHash`]: domain-separated BLAKE3 digests over length-prefixed
//!   field tuples - command digests, the pattern-set version, export
//!   integrity, socket tags. There is no bare-blob hash entry point.
//! - [`SessionKey`]: the per-session 256-bit secret used as a MAC key.
//! - [`ReviewSignature`]: keyed MAC over a review decision, proving the
//!   reviewer's session authored it.
//! - [`encode_fields`]: the canonical length-prefixed byte encoding shared
//!   by every MAC and digest input, so two different field tuples can
//!   never produce the same byte stream.
//!
//! There is no public-key machinery here. Review attribution is a shared-key
//! MAC: the store holds each session's key, and only the session owner and
//! the verifier ever see it.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod encoding;
mod error;
mod hash;
mod mac;
mod session_key;

pub use encoding::encode_fields;
pub use error::{CryptoError, CryptoResult};
pub use hash::ContentHash;
pub use mac::{ReviewSignature, sign_review, verify_review};
pub use session_key::SessionKey;
