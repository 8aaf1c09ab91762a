//! SLB Store - the single owner of durable state.
//!
//! An embedded `SurrealDB` database (`SurrealKV` on disk, in-memory for
//! tests) holding sessions, requests, reviews, outcomes, removal requests,
//! and the append-only audit ledger. Schema migrations run at open.
//!
//! Invariants live in two places:
//! - **Schema**: unique indexes on entity IDs, on
//!   `(request_id, reviewer_session_id)` for reviews, and on `request_id`
//!   for outcomes.
//! - **Application, under the writer lock**: the one-active-session rule,
//!   status CAS on every transition, and the audit row written in the same
//!   transaction as the status change.
//!
//! All writes serialize behind a single writer lock; readers go straight to
//! the database. Events are not published here - callers publish after a
//! store call returns `Ok`, which is what makes `create_request` →
//! `request_pending` causally ordered.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod db;
mod error;
mod rows;
mod store;

pub use error::{StoreError, StoreResult};
pub use store::{ScoredRequest, Store};
