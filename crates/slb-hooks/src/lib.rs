//! SLB Hooks - the editor guard adapter.
//!
//! Emits a self-contained POSIX shell guard script that a host editor
//! invokes before running a shell command. The script asks the daemon
//! first (short timeout) and falls back to a local classification over the
//! patterns embedded at generation time, plus a hard block list of
//! irrecoverable commands that works even with an empty pattern set.
//!
//! Install and uninstall mutate the host's JSON settings file
//! idempotently: unrelated hooks are preserved byte-for-byte (modulo
//! whitespace), re-installs replace rather than duplicate, and uninstall
//! removes only entries that reference the guard script's basename.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod error;
mod guard;
mod settings;

pub use error::{HookError, HookResult};
pub use guard::{GuardScript, generate_guard_script, parse_script_header};
pub use settings::{HookStatus, install, is_installed, status, uninstall};
