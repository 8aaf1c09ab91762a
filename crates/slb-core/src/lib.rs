//! SLB Core - shared types for the two-person-rule coordinator.
//!
//! This crate defines the domain model every other SLB crate speaks:
//! sessions, approval requests, reviews, outcomes, risk tiers, the request
//! status machine, command specifications, and the error taxonomy. It also
//! provides directory scaffolding for the global (`~/.slb/`) and per-project
//! (`<project>/.slb/`) state layouts.
//!
//! Nothing here touches the store or the network; these are plain data
//! types plus the pure helpers (tokenization, redaction) that build them.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod actor;
mod audit;
mod command;
pub mod dirs;
mod error;
mod ids;
mod outcome;
mod request;
mod review;
mod session;
mod status;
mod tier;
mod time;

pub use actor::{Actor, ActorKind};
pub use audit::AuditRow;
pub use command::{CommandSpec, shell_tokenize};
pub use error::{CoreError, CoreResult};
pub use ids::{RemovalId, RequestId, ReviewId, SessionId};
pub use outcome::{Outcome, Rating};
pub use request::{
    Attachment, AttachmentKind, AttachmentMetadata, DryRun, ExecutionRecord, Justification,
    Request, RollbackRecord,
};
pub use review::{Review, ReviewDecision, ReviewResponses};
pub use session::Session;
pub use status::RequestStatus;
pub use tier::RiskTier;
pub use time::Timestamp;
