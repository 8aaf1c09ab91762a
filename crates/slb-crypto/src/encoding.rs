//! Canonical byte encoding for digest and MAC inputs.
//!
//! Every hash or MAC in SLB is computed over [`encode_fields`] output rather
//! than ad-hoc string concatenation. Each field is prefixed with its length
//! as a little-endian `u32`, so `("ab", "c")` and `("a", "bc")` encode to
//! different byte streams.

/// Encode a tuple of fields as length-prefixed bytes.
///
/// Layout: for each field, 4 bytes little-endian length followed by the raw
/// field bytes. The field count itself is implicit; callers fix the arity per
/// domain (command hash, review MAC, ...).
#[must_use]
pub fn encode_fields(fields: &[&[u8]]) -> Vec<u8> {
    let total: usize = fields.iter().map(|f| 4 + f.len()).sum();
    let mut out = Vec::with_capacity(total);
    for field in fields {
        let len = u32::try_from(field.len()).unwrap_or(u32::MAX);
        out.extend_from_slice(&len.to_le_bytes());
        out.extend_from_slice(field);
    }
    out
}
