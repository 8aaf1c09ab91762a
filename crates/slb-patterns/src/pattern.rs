//! Pattern definitions and removal requests.

use serde::{Deserialize, Serialize};
use slb_core::{RemovalId, RiskTier, Timestamp};
use std::fmt;

/// Where a pattern came from.
///
/// Source also sets priority within a tier bucket: builtin patterns are
/// consulted before human-added ones, which come before agent-added ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternSource {
    /// Shipped with SLB.
    Builtin,
    /// Added by a human operator.
    Human,
    /// Added by an agent.
    Agent,
}

impl PatternSource {
    /// Bucket-ordering priority; lower sorts first.
    #[must_use]
    pub const fn priority(self) -> u8 {
        match self {
            Self::Builtin => 0,
            Self::Human => 1,
            Self::Agent => 2,
        }
    }
}

impl fmt::Display for PatternSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Builtin => f.write_str("builtin"),
            Self::Human => f.write_str("human"),
            Self::Agent => f.write_str("agent"),
        }
    }
}

/// One classification pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    /// Tier a match assigns.
    pub tier: RiskTier,
    /// Regex source text.
    pub pattern: String,
    /// Why this pattern exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Who added it.
    pub source: PatternSource,
    /// When it was added.
    pub added_at: Timestamp,
}

/// A persisted request to remove a pattern.
///
/// Agents cannot remove patterns; this record is what they get instead. It
/// is stored and surfaced for human review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemovalRequest {
    /// Unique identifier.
    pub id: RemovalId,
    /// The regex text of the pattern in question.
    pub pattern: String,
    /// Why the requester wants it gone.
    pub reason: String,
    /// Name of the requesting actor.
    pub requested_by: String,
    /// When the request was made.
    pub created_at: Timestamp,
}
