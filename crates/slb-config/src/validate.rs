//! Post-merge configuration validation.

use slb_core::RiskTier;

use crate::error::{ConfigError, ConfigResult};
use crate::types::SlbConfig;

/// Validate a fully-merged configuration.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate(config: &SlbConfig) -> ConfigResult<()> {
    validate_timing(config)?;
    validate_quorum(config)?;
    validate_watcher(config)?;
    validate_daemon(config)?;
    Ok(())
}

fn validate_timing(config: &SlbConfig) -> ConfigResult<()> {
    let t = &config.timing;
    if t.execute_window_secs == 0 {
        return Err(field_error(
            "timing.execute_window_secs",
            "must be positive",
        ));
    }
    if t.sweep_interval_secs == 0 {
        return Err(field_error("timing.sweep_interval_secs", "must be positive"));
    }
    for (field, value) in [
        ("timing.caution_decision_secs", t.caution_decision_secs),
        ("timing.dangerous_decision_secs", t.dangerous_decision_secs),
        ("timing.critical_decision_secs", t.critical_decision_secs),
    ] {
        if value == 0 {
            return Err(field_error(field, "must be positive"));
        }
    }
    if t.caution_grace_secs > t.caution_decision_secs {
        return Err(field_error(
            "timing.caution_grace_secs",
            "grace period cannot exceed the caution decision window",
        ));
    }
    Ok(())
}

fn validate_quorum(config: &SlbConfig) -> ConfigResult<()> {
    let q = &config.quorum;
    if let Some(n) = q.dangerous_min_approvals {
        if n < RiskTier::Dangerous.min_approvals() {
            return Err(field_error(
                "quorum.dangerous_min_approvals",
                "override may not go below the tier minimum of 1",
            ));
        }
    }
    if let Some(n) = q.critical_min_approvals {
        if n < RiskTier::Critical.min_approvals() {
            return Err(field_error(
                "quorum.critical_min_approvals",
                "override may not go below the tier minimum of 2",
            ));
        }
    }
    Ok(())
}

fn validate_watcher(config: &SlbConfig) -> ConfigResult<()> {
    if config.watcher.poll_interval_ms == 0 {
        return Err(field_error("watcher.poll_interval_ms", "must be positive"));
    }
    Ok(())
}

fn validate_daemon(config: &SlbConfig) -> ConfigResult<()> {
    if config.daemon.max_connections == 0 {
        return Err(field_error("daemon.max_connections", "must be positive"));
    }
    Ok(())
}

fn field_error(field: &str, message: &str) -> ConfigError {
    ConfigError::ValidationError {
        field: field.to_string(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_valid() {
        assert!(validate(&SlbConfig::default()).is_ok());
    }

    #[test]
    fn test_zero_execute_window_rejected() {
        let mut config = SlbConfig::default();
        config.timing.execute_window_secs = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_quorum_override_below_minimum_rejected() {
        let mut config = SlbConfig::default();
        config.quorum.critical_min_approvals = Some(1);
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("critical_min_approvals"));
    }

    #[test]
    fn test_quorum_override_above_minimum_ok() {
        let mut config = SlbConfig::default();
        config.quorum.critical_min_approvals = Some(3);
        config.quorum.dangerous_min_approvals = Some(2);
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_grace_beyond_decision_window_rejected() {
        let mut config = SlbConfig::default();
        config.timing.caution_grace_secs = config.timing.caution_decision_secs + 1;
        assert!(validate(&config).is_err());
    }
}
