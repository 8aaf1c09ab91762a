//! Request engine error types.

use slb_core::RequestStatus;
use thiserror::Error;

/// Errors from request lifecycle operations.
#[derive(Debug, Error)]
pub enum RequestError {
    /// The acting session does not exist or has ended.
    #[error("session not active: {0}")]
    SessionNotActive(String),

    /// The supplied project path does not match the session's project.
    #[error("project mismatch: session is in {expected}, request names {got}")]
    ProjectMismatch {
        /// The session's project.
        expected: String,
        /// The project named in the request.
        got: String,
    },

    /// The command could not be built (empty, unbalanced quotes, bad
    /// redaction pattern).
    #[error("invalid command: {0}")]
    InvalidCommand(#[from] slb_core::CoreError),

    /// A requestor tried to review their own request.
    #[error("requestor may not review their own request")]
    SelfReview,

    /// The review signature did not verify against the reviewer's session
    /// key.
    #[error("review signature mismatch")]
    SignatureMismatch,

    /// The decision window lapsed before the operation.
    #[error("decision window expired for {0}")]
    DecisionWindowExpired(String),

    /// The approval was not executed inside its window.
    #[error("approval window expired for {0}")]
    ApprovalWindowExpired(String),

    /// Cancellation refused: the actor is not the requestor, or the
    /// request is not pending.
    #[error("cancel refused for {id}: {reason}")]
    CancelRefused {
        /// Request ID.
        id: String,
        /// Why the predicate said no.
        reason: String,
    },

    /// A wait deadline elapsed before the request left `pending`.
    #[error("timed out waiting for a decision on {0}")]
    WaitTimeout(String),

    /// The operation requires an executed request.
    #[error("request {id} is {actual}, not executed")]
    NotExecuted {
        /// Request ID.
        id: String,
        /// Its actual status.
        actual: RequestStatus,
    },

    /// Store failure (including `NotFound`, `RequestNotPending`,
    /// `DuplicateReview`).
    #[error(transparent)]
    Store(#[from] slb_store::StoreError),

    /// Filesystem failure while capturing execution output.
    #[error("execution log error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for request operations.
pub type RequestResult<T> = Result<T, RequestError>;
