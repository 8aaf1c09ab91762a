//! Layered config loading.

use std::path::Path;
use tracing::{debug, info};

use crate::error::{ConfigError, ConfigResult};
use crate::types::SlbConfig;
use crate::validate;

/// Load configuration for a project.
///
/// Merges, lowest precedence first: built-in defaults, the global config
/// file, the project config file, then `SLB_*` environment overrides. The
/// result is validated before it is returned.
///
/// # Errors
///
/// Returns a [`ConfigError`] if any file is malformed, an env override is
/// unusable, or the merged result fails validation.
pub fn load(global_config: Option<&Path>, project_config: Option<&Path>) -> ConfigResult<SlbConfig> {
    let mut merged = toml::Table::new();

    for path in [global_config, project_config].into_iter().flatten() {
        if let Some(overlay) = try_load_file(path)? {
            deep_merge(&mut merged, overlay);
            info!(path = %path.display(), "loaded config layer");
        }
    }

    let mut config: SlbConfig =
        merged
            .try_into()
            .map_err(|source| ConfigError::ParseError {
                path: "<merged>".to_string(),
                source,
            })?;

    apply_env_overrides(&mut config)?;
    validate::validate(&config)?;
    Ok(config)
}

fn try_load_file(path: &Path) -> ConfigResult<Option<toml::Table>> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no config file");
            return Ok(None);
        }
        Err(source) => {
            return Err(ConfigError::ReadError {
                path: path.display().to_string(),
                source,
            });
        }
    };
    let table: toml::Table = text.parse().map_err(|source| ConfigError::ParseError {
        path: path.display().to_string(),
        source,
    })?;
    Ok(Some(table))
}

/// Merge `overlay` into `base`, tables recursively, scalars replacing.
fn deep_merge(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                deep_merge(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

fn apply_env_overrides(config: &mut SlbConfig) -> ConfigResult<()> {
    if let Some(value) = env_parse::<bool>("SLB_AUTO_APPROVE_CAUTION")? {
        config.watcher.auto_approve_caution = value;
    }
    if let Some(value) = env_parse::<u64>("SLB_POLL_INTERVAL_MS")? {
        config.watcher.poll_interval_ms = value;
    }
    if let Some(value) = env_parse::<u64>("SLB_EXECUTE_WINDOW_SECS")? {
        config.timing.execute_window_secs = value;
    }
    if let Some(value) = env_parse::<u64>("SLB_GC_THRESHOLD_SECS")? {
        config.session.gc_threshold_secs = value;
    }
    Ok(())
}

fn env_parse<T: std::str::FromStr>(var: &str) -> ConfigResult<Option<T>> {
    match std::env::var(var) {
        Ok(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::EnvError {
                var: var.to_string(),
                message: format!("cannot parse {raw:?}"),
            }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(dir: &Path, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_no_files_gives_defaults() {
        let config = load(None, None).unwrap();
        assert_eq!(config, SlbConfig::default());
    }

    #[test]
    fn test_missing_files_are_fine() {
        let dir = tempfile::tempdir().unwrap();
        let config = load(
            Some(&dir.path().join("nope.toml")),
            Some(&dir.path().join("also-nope.toml")),
        )
        .unwrap();
        assert_eq!(config, SlbConfig::default());
    }

    #[test]
    fn test_project_overrides_global() {
        let dir = tempfile::tempdir().unwrap();
        let global = write_config(
            dir.path(),
            "global.toml",
            "[watcher]\npoll_interval_ms = 500\nauto_approve_caution = true\n",
        );
        let project = write_config(dir.path(), "project.toml", "[watcher]\npoll_interval_ms = 250\n");

        let config = load(Some(&global), Some(&project)).unwrap();
        assert_eq!(config.watcher.poll_interval_ms, 250);
        // Untouched global value survives the merge.
        assert!(config.watcher.auto_approve_caution);
    }

    #[test]
    fn test_malformed_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let bad = write_config(dir.path(), "bad.toml", "timing = \"not a table\"\n");
        assert!(load(Some(&bad), None).is_err());
    }

    #[test]
    fn test_unknown_key_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let bad = write_config(dir.path(), "bad.toml", "[timing]\nbogus = 7\n");
        assert!(matches!(
            load(Some(&bad), None),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn test_invalid_merged_config_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let bad = write_config(dir.path(), "bad.toml", "[watcher]\npoll_interval_ms = 0\n");
        assert!(matches!(
            load(Some(&bad), None),
            Err(ConfigError::ValidationError { .. })
        ));
    }
}
