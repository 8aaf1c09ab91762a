//! Idempotent install / uninstall into the host editor's settings file.
//!
//! The settings file is JSON of the shape
//! `{"hooks": {"PreToolUse": [{"matcher": ..., "hooks": [{"type":
//! "command", "command": ...}]}]}}` plus arbitrary unrelated keys, all of
//! which are preserved. SLB's entry is identified by the guard script's
//! basename appearing in a hook command, which is what makes repeated
//! installs replace instead of duplicate and lets uninstall remove only
//! what SLB added.

use serde::Serialize;
use serde_json::{Value, json};
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{HookError, HookResult};
use crate::guard::parse_script_header;

const HOOKS_KEY: &str = "hooks";
const EVENT_KEY: &str = "PreToolUse";

/// Install the guard script into a settings file.
///
/// Creates the file when absent; preserves unrelated hooks; replaces any
/// existing SLB entry, so installing twice yields exactly one.
///
/// # Errors
///
/// [`HookError::BadSettings`] for unparseable JSON,
/// [`HookError::UnexpectedShape`] when `hooks` or `hooks.PreToolUse` is
/// not the expected container type.
pub fn install(settings_path: &Path, script_path: &Path) -> HookResult<()> {
    let mut root = read_settings(settings_path)?;
    let basename = script_basename(script_path);

    let entries = pre_tool_use_mut(&mut root, settings_path)?;
    entries.retain(|entry| !entry_references(entry, &basename));
    entries.push(json!({
        "matcher": "Bash",
        "hooks": [{
            "type": "command",
            "command": script_path.display().to_string(),
        }],
    }));

    write_settings(settings_path, &root)?;
    info!(settings = %settings_path.display(), script = %script_path.display(), "guard hook installed");
    Ok(())
}

/// Remove SLB's entries from a settings file.
///
/// Returns whether anything was removed. Empty containers left behind by
/// the removal are pruned, so install-then-uninstall restores the
/// original document (modulo whitespace). A missing file is `Ok(false)`.
///
/// # Errors
///
/// As for [`install`].
pub fn uninstall(settings_path: &Path, script_path: &Path) -> HookResult<bool> {
    if !settings_path.exists() {
        return Ok(false);
    }
    let mut root = read_settings(settings_path)?;
    let basename = script_basename(script_path);

    let entries = pre_tool_use_mut(&mut root, settings_path)?;
    let before = entries.len();
    entries.retain(|entry| !entry_references(entry, &basename));
    let removed = entries.len() != before;

    prune_empty(&mut root);
    write_settings(settings_path, &root)?;
    if removed {
        info!(settings = %settings_path.display(), "guard hook uninstalled");
    } else {
        debug!(settings = %settings_path.display(), "no guard hook to uninstall");
    }
    Ok(removed)
}

/// Whether a settings file carries SLB's entry for this script.
///
/// # Errors
///
/// As for [`install`]; a missing file is `Ok(false)`.
pub fn is_installed(settings_path: &Path, script_path: &Path) -> HookResult<bool> {
    if !settings_path.exists() {
        return Ok(false);
    }
    let root = read_settings(settings_path)?;
    let basename = script_basename(script_path);
    Ok(root
        .get(HOOKS_KEY)
        .and_then(|hooks| hooks.get(EVENT_KEY))
        .and_then(Value::as_array)
        .is_some_and(|entries| entries.iter().any(|entry| entry_references(entry, &basename))))
}

/// Hook adapter status: installation plus pattern drift.
#[derive(Debug, Clone, Serialize)]
pub struct HookStatus {
    /// Whether the settings file references the script.
    pub installed: bool,
    /// Whether the script file exists on disk.
    pub script_exists: bool,
    /// Pattern hash embedded in the installed script, when readable.
    pub script_pattern_hash: Option<String>,
    /// The live engine's pattern hash.
    pub engine_pattern_hash: String,
    /// Whether the script's embedded patterns differ from the engine's.
    pub drifted: bool,
}

/// Compute installation and drift status.
///
/// # Errors
///
/// As for [`install`].
pub fn status(
    settings_path: &Path,
    script_path: &Path,
    engine_pattern_hash: &str,
) -> HookResult<HookStatus> {
    let installed = is_installed(settings_path, script_path)?;
    let script_text = std::fs::read_to_string(script_path).ok();
    let script_exists = script_text.is_some();
    let script_pattern_hash = script_text
        .as_deref()
        .and_then(parse_script_header)
        .map(|(_, hash)| hash);
    let drifted = script_pattern_hash
        .as_deref()
        .is_none_or(|hash| hash != engine_pattern_hash);
    Ok(HookStatus {
        installed,
        script_exists,
        script_pattern_hash,
        engine_pattern_hash: engine_pattern_hash.to_string(),
        drifted,
    })
}

// -- Internals ------------------------------------------------------------

fn script_basename(script_path: &Path) -> String {
    script_path
        .file_name()
        .map_or_else(|| script_path.display().to_string(), |name| name.to_string_lossy().into_owned())
}

fn read_settings(path: &Path) -> HookResult<Value> {
    match std::fs::read_to_string(path) {
        Ok(text) => serde_json::from_str(&text).map_err(|source| HookError::BadSettings {
            path: path.display().to_string(),
            source,
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(json!({})),
        Err(e) => Err(e.into()),
    }
}

/// Atomic write: sibling temp file, then rename.
fn write_settings(path: &Path, root: &Value) -> HookResult<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut tmp, root)?;
    tmp.write_all(b"\n")?;
    tmp.persist(path).map_err(|e| HookError::Io(e.error))?;
    Ok(())
}

fn pre_tool_use_mut<'a>(
    root: &'a mut Value,
    path: &Path,
) -> HookResult<&'a mut Vec<Value>> {
    if !root.is_object() {
        return Err(shape_error(path, "settings root is not an object"));
    }
    let obj = root.as_object_mut().expect("checked above");

    let hooks = obj
        .entry(HOOKS_KEY)
        .or_insert_with(|| json!({}));
    let Some(hooks) = hooks.as_object_mut() else {
        return Err(shape_error(path, "\"hooks\" is not an object"));
    };

    let entries = hooks.entry(EVENT_KEY).or_insert_with(|| json!([]));
    entries
        .as_array_mut()
        .ok_or_else(|| shape_error(path, "\"hooks.PreToolUse\" is not an array"))
}

fn shape_error(path: &Path, message: &str) -> HookError {
    HookError::UnexpectedShape {
        path: path.display().to_string(),
        message: message.to_string(),
    }
}

fn entry_references(entry: &Value, basename: &str) -> bool {
    entry
        .get(HOOKS_KEY)
        .and_then(Value::as_array)
        .is_some_and(|hooks| {
            hooks.iter().any(|hook| {
                hook.get("command")
                    .and_then(Value::as_str)
                    .is_some_and(|command| command.contains(basename))
            })
        })
}

fn prune_empty(root: &mut Value) {
    let Some(obj) = root.as_object_mut() else {
        return;
    };
    let mut drop_hooks = false;
    if let Some(hooks) = obj.get_mut(HOOKS_KEY).and_then(Value::as_object_mut) {
        let drop_event = hooks
            .get(EVENT_KEY)
            .and_then(Value::as_array)
            .is_some_and(Vec::is_empty);
        if drop_event {
            hooks.remove(EVENT_KEY);
        }
        drop_hooks = hooks.is_empty();
    }
    if drop_hooks {
        obj.remove(HOOKS_KEY);
    }
}
