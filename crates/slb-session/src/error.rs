//! Session manager error types.

use thiserror::Error;

/// Errors from session lifecycle operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No active session matched a resume, and `create_if_missing` was off.
    #[error("no active session for {agent} in {project}")]
    NoActiveSession {
        /// Agent name.
        agent: String,
        /// Project path.
        project: String,
    },

    /// An active session exists but its identity tuple differs.
    #[error(
        "active session {existing_id} for {agent} in {project} does not match \
         (program/model differ); pass force_end_mismatch to replace it"
    )]
    SessionMismatch {
        /// The conflicting session's ID.
        existing_id: String,
        /// Agent name.
        agent: String,
        /// Project path.
        project: String,
    },

    /// A session row exists but its MAC key is missing - the store is
    /// damaged.
    #[error("session {0} has no stored key")]
    MissingKey(String),

    /// Store failure (including `ActiveSessionExists` and `NotFound`).
    #[error(transparent)]
    Store(#[from] slb_store::StoreError),
}

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;
