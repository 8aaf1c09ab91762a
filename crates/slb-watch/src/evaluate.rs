//! The pure event-derivation function shared by both watcher paths.

use slb_core::RequestStatus;

/// What the watcher should do for one observed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchAction {
    /// First sighting of a pending request: emit `request_pending`.
    EmitPending,
    /// The status changed since last seen: emit the matching event.
    EmitStatusChange(RequestStatus),
    /// Nothing new.
    Skip,
}

/// Derive the watcher's action from a request's current status and what
/// was last seen for it.
///
/// Pure: both the polling loop and tests call exactly this.
#[must_use]
pub fn evaluate(current: RequestStatus, last_seen: Option<RequestStatus>) -> WatchAction {
    match last_seen {
        None if current == RequestStatus::Pending => WatchAction::EmitPending,
        // A request first observed past pending still gets its event.
        None => WatchAction::EmitStatusChange(current),
        Some(previous) if previous == current => WatchAction::Skip,
        Some(_) => WatchAction::EmitStatusChange(current),
    }
}

/// The NDJSON event name for a status, as the polling path emits it.
///
/// The three post-execution terminals coarsen to `request_executed` for
/// visibility; the daemon's push path distinguishes them.
#[must_use]
pub fn event_name_for(status: RequestStatus) -> &'static str {
    match status {
        RequestStatus::Pending => "request_pending",
        RequestStatus::Approved => "request_approved",
        RequestStatus::Rejected => "request_rejected",
        RequestStatus::Cancelled => "request_cancelled",
        RequestStatus::Timeout => "request_timeout",
        RequestStatus::Executing => "request_executing",
        RequestStatus::Executed
        | RequestStatus::ExecutionFailed
        | RequestStatus::TimedOut => "request_executed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [RequestStatus; 9] = [
        RequestStatus::Pending,
        RequestStatus::Approved,
        RequestStatus::Rejected,
        RequestStatus::Cancelled,
        RequestStatus::Timeout,
        RequestStatus::Executing,
        RequestStatus::Executed,
        RequestStatus::ExecutionFailed,
        RequestStatus::TimedOut,
    ];

    #[test]
    fn test_new_pending_emits_pending() {
        assert_eq!(
            evaluate(RequestStatus::Pending, None),
            WatchAction::EmitPending
        );
    }

    #[test]
    fn test_new_non_pending_emits_status() {
        assert_eq!(
            evaluate(RequestStatus::Approved, None),
            WatchAction::EmitStatusChange(RequestStatus::Approved)
        );
    }

    #[test]
    fn test_unchanged_skips() {
        for status in ALL {
            assert_eq!(evaluate(status, Some(status)), WatchAction::Skip, "{status}");
        }
    }

    #[test]
    fn test_any_change_emits() {
        for prev in ALL {
            for current in ALL {
                if prev == current {
                    continue;
                }
                assert_eq!(
                    evaluate(current, Some(prev)),
                    WatchAction::EmitStatusChange(current),
                    "{prev} -> {current}"
                );
            }
        }
    }

    #[test]
    fn test_event_names() {
        assert_eq!(event_name_for(RequestStatus::Pending), "request_pending");
        assert_eq!(event_name_for(RequestStatus::Approved), "request_approved");
        assert_eq!(event_name_for(RequestStatus::Executed), "request_executed");
        // Coarsened terminals.
        assert_eq!(
            event_name_for(RequestStatus::ExecutionFailed),
            "request_executed"
        );
        assert_eq!(event_name_for(RequestStatus::TimedOut), "request_executed");
    }
}
