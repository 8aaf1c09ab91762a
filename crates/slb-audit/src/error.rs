//! Audit service error types.

use slb_core::RequestStatus;
use thiserror::Error;

/// Errors from outcome recording, search, and export.
#[derive(Debug, Error)]
pub enum AuditError {
    /// Outcomes attach only to executed requests.
    #[error("request {id} is {actual}; outcomes require an executed state")]
    RequestNotExecuted {
        /// Request ID.
        id: String,
        /// Its actual status.
        actual: RequestStatus,
    },

    /// Store failure (including `NotFound` and `OutcomeExists`).
    #[error(transparent)]
    Store(#[from] slb_store::StoreError),

    /// Export serialization failed.
    #[error("export serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Result type for audit operations.
pub type AuditResult<T> = Result<T, AuditError>;
