//! Request status machine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// States of an approval request.
///
/// ```text
/// pending ──approve──▶ approved ──execute──▶ executing ──▶ executed | execution_failed
///    │                     └──────expire─────▶ timed_out
///    ├──reject──▶ rejected
///    ├──cancel──▶ cancelled
///    └──expire──▶ timeout
/// ```
///
/// `Timeout` is a decision window that lapsed while pending; `TimedOut` is
/// an approval that was never executed inside its execution window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    /// Awaiting reviewer decisions.
    Pending,
    /// Quorum reached; may execute until the approval window lapses.
    Approved,
    /// A reviewer rejected it.
    Rejected,
    /// Withdrawn by the requestor.
    Cancelled,
    /// Decision window lapsed while pending.
    Timeout,
    /// Execution has started.
    Executing,
    /// Execution finished with exit code zero or nonzero, recorded either way.
    Executed,
    /// The command could not be launched or the execution was aborted.
    ExecutionFailed,
    /// Approved but not executed before the approval window lapsed.
    TimedOut,
}

impl RequestStatus {
    /// Whether this state admits no further transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Rejected
                | Self::Cancelled
                | Self::Timeout
                | Self::Executed
                | Self::ExecutionFailed
                | Self::TimedOut
        )
    }

    /// Whether a transition from `self` to `next` is legal.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Approved)
                | (Self::Pending, Self::Rejected)
                | (Self::Pending, Self::Cancelled)
                | (Self::Pending, Self::Timeout)
                | (Self::Approved, Self::Executing)
                | (Self::Approved, Self::TimedOut)
                | (Self::Executing, Self::Executed)
                | (Self::Executing, Self::ExecutionFailed)
        )
    }

    /// Stable lowercase name, as used on the wire and in the store.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
            Self::Timeout => "timeout",
            Self::Executing => "executing",
            Self::Executed => "executed",
            Self::ExecutionFailed => "execution_failed",
            Self::TimedOut => "timed_out",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "cancelled" => Ok(Self::Cancelled),
            "timeout" => Ok(Self::Timeout),
            "executing" => Ok(Self::Executing),
            "executed" => Ok(Self::Executed),
            "execution_failed" => Ok(Self::ExecutionFailed),
            "timed_out" => Ok(Self::TimedOut),
            _ => Err(CoreError::InvalidStatus(s.to_string())),
        }
    }
}
