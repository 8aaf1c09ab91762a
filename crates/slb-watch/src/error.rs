//! Watcher error types.

use thiserror::Error;

/// Errors from the watcher.
#[derive(Debug, Error)]
pub enum WatchError {
    /// The daemon path failed; callers fall back to polling.
    #[error(transparent)]
    Daemon(#[from] slb_daemon::DaemonError),

    /// Store failure on the polling path.
    #[error(transparent)]
    Store(#[from] slb_store::StoreError),

    /// The auto-approver could not post its review.
    #[error(transparent)]
    Request(#[from] slb_request::RequestError),

    /// The auto-approver could not establish its pseudo-session.
    #[error(transparent)]
    Session(#[from] slb_session::SessionError),

    /// The event consumer went away.
    #[error("event consumer closed")]
    ConsumerClosed,
}

/// Result type for watcher operations.
pub type WatchResult<T> = Result<T, WatchError>;
