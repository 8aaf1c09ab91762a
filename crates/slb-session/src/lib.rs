//! SLB Session - session lifecycle management.
//!
//! A session is an agent's working identity within one project: it owns the
//! MAC key that attributes reviews, and the one-active-session invariant
//! makes `(agent, project)` an unambiguous address. The manager wraps the
//! store with start / resume / heartbeat / end / garbage-collect
//! operations; the key is generated here and handed back exactly once per
//! start (and again on resume, which is the same owner re-attaching).

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod error;
mod manager;

pub use error::{SessionError, SessionResult};
pub use manager::{
    GcReport, NewSession, ResumeOptions, ResumedSession, SessionManager, StartedSession,
};
