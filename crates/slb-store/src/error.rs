//! Store error types.

use slb_core::RequestStatus;
use thiserror::Error;

/// Errors from store operations.
///
/// `NotFound` and the `Conflict`-class variants (`ActiveSessionExists`,
/// `DuplicateReview`, `RequestNotPending`, `IllegalTransition`,
/// `OutcomeExists`) are the store's share of the system error taxonomy;
/// everything else surfaces as `Db`.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An entity was not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity kind (session, request, ...).
        entity: &'static str,
        /// The missing ID.
        id: String,
    },

    /// An active session already exists for `(agent, project)`.
    #[error("active session exists for {agent} in {project}")]
    ActiveSessionExists {
        /// Agent name.
        agent: String,
        /// Project path.
        project: String,
    },

    /// This reviewer already reviewed this request.
    #[error("duplicate review: {reviewer} already reviewed {request}")]
    DuplicateReview {
        /// Request ID.
        request: String,
        /// Reviewer session ID.
        reviewer: String,
    },

    /// The request is not in the state the transition expected
    /// (`request_not_pending`).
    #[error("request_not_pending: {id} is {actual}")]
    RequestNotPending {
        /// Request ID.
        id: String,
        /// The state it is actually in.
        actual: RequestStatus,
    },

    /// The requested transition is not legal in the state machine.
    #[error("illegal transition {from} -> {to}")]
    IllegalTransition {
        /// Current state.
        from: RequestStatus,
        /// Requested state.
        to: RequestStatus,
    },

    /// An outcome was already recorded for this request.
    #[error("outcome already recorded for {request}")]
    OutcomeExists {
        /// Request ID.
        request: String,
    },

    /// The underlying database failed.
    #[error("store database error: {0}")]
    Db(#[from] surrealdb::Error),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
