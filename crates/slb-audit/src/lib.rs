//! SLB Audit - post-execution feedback and history.
//!
//! Three concerns:
//! - **Outcomes**: one feedback record per executed request, plus
//!   aggregate statistics.
//! - **Search**: ranked full-text hits over the store's index, with the
//!   finer-grained filters (status, agent, tier, since) applied in memory.
//! - **Export**: a canonical-JSON rendering of history (stable key order,
//!   RFC 3339 timestamps, deterministic sorting) with a BLAKE3 integrity
//!   hash, byte-stable for identical history.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod error;
mod service;
mod tail;

pub use error::{AuditError, AuditResult};
pub use service::{
    AuditService, ExportDocument, HistoryQuery, OutcomeStats, RequestDetail,
};
pub use tail::tail;
