//! SLB Request - the request lifecycle and review engine.
//!
//! [`RequestEngine`] is the coordinator's core: it builds requests from
//! commands (classification, tokenization, redaction, hashing), persists
//! them as `pending`, validates signed reviews, evaluates quorum, runs the
//! expiry sweeps, and records execution results. Every state change goes
//! through the store's transition door and is followed by an event on the
//! bus - in that order, so events are causally ordered behind commits.
//!
//! The safety gates (cancel authorization, quorum, auto-approval) are pure
//! predicates in [`policy`]; callers route on the predicate and never
//! duplicate the decision.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod engine;
mod error;
mod exec;
pub mod policy;
mod sweep;

pub use engine::{CreateOutcome, CreateRequestInput, NewReview, RequestEngine};
pub use error::{RequestError, RequestResult};
pub use exec::ExecResult;
pub use sweep::{SweepReport, spawn_sweeper};
