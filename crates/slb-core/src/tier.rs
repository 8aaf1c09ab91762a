//! Risk tiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Risk classification assigned by the pattern engine.
///
/// `Ord` follows severity: `Safe < Caution < Dangerous < Critical`. This is
/// the ordering used when combining segment tiers (max wins); it is *not*
/// the bucket evaluation order, which the pattern engine defines itself.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    /// No approval needed; the request is skipped entirely.
    Safe,
    /// Auto-approved after a grace window unless rejected first.
    Caution,
    /// One approval required.
    Dangerous,
    /// Two approvals required, from distinct models when configured.
    Critical,
}

impl RiskTier {
    /// Minimum approvals this tier requires. Config may raise this, never
    /// lower it.
    #[must_use]
    pub const fn min_approvals(self) -> u32 {
        match self {
            Self::Safe | Self::Caution => 0,
            Self::Dangerous => 1,
            Self::Critical => 2,
        }
    }

    /// Whether a request at this tier needs a reviewer decision before it
    /// may execute.
    #[must_use]
    pub const fn needs_approval(self) -> bool {
        !matches!(self, Self::Safe)
    }

    /// All tiers, in severity order.
    #[must_use]
    pub const fn all() -> [Self; 4] {
        [Self::Safe, Self::Caution, Self::Dangerous, Self::Critical]
    }

    /// Stable lowercase name, as used on the wire and in exports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Safe => "safe",
            Self::Caution => "caution",
            Self::Dangerous => "dangerous",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskTier {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "safe" => Ok(Self::Safe),
            "caution" => Ok(Self::Caution),
            "dangerous" => Ok(Self::Dangerous),
            "critical" => Ok(Self::Critical),
            _ => Err(CoreError::InvalidTier(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(RiskTier::Safe < RiskTier::Caution);
        assert!(RiskTier::Caution < RiskTier::Dangerous);
        assert!(RiskTier::Dangerous < RiskTier::Critical);
    }

    #[test]
    fn test_min_approvals() {
        assert_eq!(RiskTier::Safe.min_approvals(), 0);
        assert_eq!(RiskTier::Caution.min_approvals(), 0);
        assert_eq!(RiskTier::Dangerous.min_approvals(), 1);
        assert_eq!(RiskTier::Critical.min_approvals(), 2);
    }

    #[test]
    fn test_needs_approval() {
        assert!(!RiskTier::Safe.needs_approval());
        assert!(RiskTier::Caution.needs_approval());
    }

    #[test]
    fn test_parse_roundtrip() {
        for tier in RiskTier::all() {
            assert_eq!(tier.as_str().parse::<RiskTier>().unwrap(), tier);
        }
        assert!("extreme".parse::<RiskTier>().is_err());
    }
}
