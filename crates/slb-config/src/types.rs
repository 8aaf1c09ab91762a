//! Configuration schema.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use slb_core::RiskTier;

/// The full SLB configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SlbConfig {
    /// Decision and execution windows.
    pub timing: TimingConfig,
    /// Quorum requirements.
    pub quorum: QuorumConfig,
    /// Watcher behavior.
    pub watcher: WatcherConfig,
    /// Session lifecycle.
    pub session: SessionConfig,
    /// Daemon limits.
    pub daemon: DaemonConfig,
}

/// Decision and execution windows, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct TimingConfig {
    /// Grace period before a CAUTION request is auto-approved.
    pub caution_grace_secs: u64,
    /// Decision window for CAUTION requests.
    pub caution_decision_secs: u64,
    /// Decision window for DANGEROUS requests.
    pub dangerous_decision_secs: u64,
    /// Decision window for CRITICAL requests.
    pub critical_decision_secs: u64,
    /// Window to start executing after approval, for every tier.
    pub execute_window_secs: u64,
    /// Interval between expiry sweeps.
    pub sweep_interval_secs: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            caution_grace_secs: 60,
            caution_decision_secs: 15 * 60,
            dangerous_decision_secs: 30 * 60,
            critical_decision_secs: 60 * 60,
            execute_window_secs: 10 * 60,
            sweep_interval_secs: 15,
        }
    }
}

impl TimingConfig {
    /// Decision window for a tier. SAFE has none; it is never persisted.
    #[must_use]
    pub fn decision_window(&self, tier: RiskTier) -> Option<Duration> {
        let secs = match tier {
            RiskTier::Safe => return None,
            RiskTier::Caution => self.caution_decision_secs,
            RiskTier::Dangerous => self.dangerous_decision_secs,
            RiskTier::Critical => self.critical_decision_secs,
        };
        Some(Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX)))
    }

    /// The execution window applied at approval time.
    #[must_use]
    pub fn execute_window(&self) -> Duration {
        Duration::seconds(i64::try_from(self.execute_window_secs).unwrap_or(i64::MAX))
    }

    /// The CAUTION auto-approval grace period.
    #[must_use]
    pub fn caution_grace(&self) -> Duration {
        Duration::seconds(i64::try_from(self.caution_grace_secs).unwrap_or(i64::MAX))
    }
}

/// Quorum requirements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct QuorumConfig {
    /// Raise the approvals required for DANGEROUS above the tier minimum.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dangerous_min_approvals: Option<u32>,
    /// Raise the approvals required for CRITICAL above the tier minimum.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub critical_min_approvals: Option<u32>,
    /// Whether CRITICAL requests need approvals from models distinct from
    /// the requestor's and from each other.
    pub require_different_model_critical: bool,
}

impl Default for QuorumConfig {
    fn default() -> Self {
        Self {
            dangerous_min_approvals: None,
            critical_min_approvals: None,
            require_different_model_critical: true,
        }
    }
}

impl QuorumConfig {
    /// Approvals required for a tier: the configured override when one is
    /// set, never below the tier minimum.
    #[must_use]
    pub fn min_approvals(&self, tier: RiskTier) -> u32 {
        let floor = tier.min_approvals();
        let override_ = match tier {
            RiskTier::Dangerous => self.dangerous_min_approvals,
            RiskTier::Critical => self.critical_min_approvals,
            RiskTier::Safe | RiskTier::Caution => None,
        };
        override_.map_or(floor, |n| n.max(floor))
    }

    /// Whether the distinct-model rule applies to a tier.
    #[must_use]
    pub fn require_different_model(&self, tier: RiskTier) -> bool {
        tier == RiskTier::Critical && self.require_different_model_critical
    }
}

/// Watcher behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct WatcherConfig {
    /// Polling interval in milliseconds for the DB fallback path.
    pub poll_interval_ms: u64,
    /// Whether the watcher auto-approves CAUTION requests.
    pub auto_approve_caution: bool,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            auto_approve_caution: false,
        }
    }
}

/// Session lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SessionConfig {
    /// Idle threshold in seconds before GC considers a session stale.
    pub gc_threshold_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            gc_threshold_secs: 30 * 60,
        }
    }
}

impl SessionConfig {
    /// The GC staleness threshold.
    #[must_use]
    pub fn gc_threshold(&self) -> Duration {
        Duration::seconds(i64::try_from(self.gc_threshold_secs).unwrap_or(i64::MAX))
    }
}

/// Daemon limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct DaemonConfig {
    /// Maximum simultaneous client connections.
    pub max_connections: usize,
    /// Grace period for draining in-flight requests at shutdown, in
    /// milliseconds.
    pub shutdown_grace_ms: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            max_connections: 64,
            shutdown_grace_ms: 2000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SlbConfig::default();
        assert_eq!(config.timing.caution_grace_secs, 60);
        assert_eq!(config.timing.execute_window_secs, 600);
        assert!(config.quorum.require_different_model_critical);
        assert!(!config.watcher.auto_approve_caution);
        assert_eq!(config.daemon.max_connections, 64);
    }

    #[test]
    fn test_decision_windows() {
        let timing = TimingConfig::default();
        assert!(timing.decision_window(RiskTier::Safe).is_none());
        assert_eq!(
            timing.decision_window(RiskTier::Caution),
            Some(Duration::minutes(15))
        );
        assert_eq!(
            timing.decision_window(RiskTier::Dangerous),
            Some(Duration::minutes(30))
        );
        assert_eq!(
            timing.decision_window(RiskTier::Critical),
            Some(Duration::hours(1))
        );
    }

    #[test]
    fn test_min_approvals_override_never_lowers() {
        let quorum = QuorumConfig {
            dangerous_min_approvals: Some(3),
            critical_min_approvals: Some(1), // below the tier minimum of 2
            require_different_model_critical: true,
        };
        assert_eq!(quorum.min_approvals(RiskTier::Dangerous), 3);
        assert_eq!(quorum.min_approvals(RiskTier::Critical), 2);
        assert_eq!(quorum.min_approvals(RiskTier::Caution), 0);
    }

    #[test]
    fn test_require_different_model_only_critical() {
        let quorum = QuorumConfig::default();
        assert!(quorum.require_different_model(RiskTier::Critical));
        assert!(!quorum.require_different_model(RiskTier::Dangerous));
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let err = toml::from_str::<SlbConfig>("[timing]\nnot_a_key = 1\n");
        assert!(err.is_err());
    }
}
