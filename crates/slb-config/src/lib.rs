//! SLB Config - layered TOML configuration.
//!
//! Precedence, lowest to highest:
//! 1. Built-in defaults
//! 2. Global config (`~/.slb/config.toml`)
//! 3. Project config (`<project>/.slb/config.toml`)
//! 4. Environment overrides (`SLB_*`)
//!
//! Every load ends in a validation pass; a config that would weaken the
//! two-person rule (e.g. a min-approvals override below the tier minimum)
//! is rejected, not clamped.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod error;
mod loader;
mod types;
mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::load;
pub use types::{
    DaemonConfig, QuorumConfig, SessionConfig, SlbConfig, TimingConfig, WatcherConfig,
};
pub use validate::validate;
