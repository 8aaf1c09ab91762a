//! Deterministic pattern-set export.
//!
//! The export carries the patterns in their exact evaluation order plus a
//! version string and the BLAKE3 digest of the canonical JSON form. Two
//! engines holding the same pattern set produce byte-identical exports and
//! the same digest, across process restarts; `added_at` timestamps are
//! deliberately excluded for that reason.

use serde::{Deserialize, Serialize};
use slb_core::RiskTier;
use slb_crypto::ContentHash;

use crate::pattern::PatternSource;

/// One pattern as exported: everything that affects matching, nothing that
/// varies per process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedPattern {
    /// Tier a match assigns.
    pub tier: RiskTier,
    /// Regex source text.
    pub pattern: String,
    /// Why this pattern exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Who added it.
    pub source: PatternSource,
}

/// A complete pattern-set export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternExport {
    /// Version string (engine version + pattern count).
    pub version: String,
    /// Hex BLAKE3 digest of the canonical JSON pattern list.
    pub pattern_hash: String,
    /// Patterns grouped by tier in severity order, bucket order within.
    pub patterns: Vec<ExportedPattern>,
}

impl PatternExport {
    /// Canonical JSON rendering: object keys sorted, field order fixed.
    ///
    /// # Errors
    ///
    /// Serialization of these plain types does not fail in practice; an
    /// error is propagated rather than swallowed regardless.
    pub fn to_canonical_json(&self) -> Result<String, serde_json::Error> {
        // Round-trip through Value sorts object keys (BTreeMap-backed).
        let value = serde_json::to_value(self)?;
        serde_json::to_string_pretty(&value)
    }

    /// YAML rendering for human consumption.
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}

/// The 256-bit pattern-set digest: BLAKE3 over the canonical JSON of the
/// pattern list alone (not the surrounding export envelope).
#[must_use]
pub fn compute_pattern_hash(patterns: &[ExportedPattern]) -> String {
    let canonical = serde_json::to_value(patterns)
        .and_then(|v| serde_json::to_string(&v))
        .unwrap_or_default();
    ContentHash::digest("slb-patterns", &[canonical.as_bytes()]).to_hex()
}
