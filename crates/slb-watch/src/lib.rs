//! SLB Watch - streams pending-request events to reviewers.
//!
//! Two paths produce the same NDJSON event stream:
//! - **Subscription**: forward the daemon's `subscribe` notifications.
//! - **Polling**: list pending requests on an interval and derive events
//!   from status changes with the pure [`evaluate`] function.
//!
//! With auto-approval enabled, every pass also runs the
//! [`should_auto_approve_caution`](slb_request::policy::should_auto_approve_caution)
//! gate and posts a signed review from the auto-approver pseudo-session
//! for CAUTION requests whose grace period elapsed. The gate is the only
//! thing standing between the watcher and auto-approving DANGEROUS or
//! CRITICAL work, which is why it lives in `slb_request::policy` as a pure
//! predicate with full branch coverage.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod auto;
mod error;
mod evaluate;
mod watcher;

pub use auto::{AUTO_APPROVER_AGENT, AutoApprover};
pub use error::{WatchError, WatchResult};
pub use evaluate::{WatchAction, evaluate, event_name_for};
pub use watcher::{WatchEvent, Watcher};
