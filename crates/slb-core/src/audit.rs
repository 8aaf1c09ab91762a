//! Audit log rows: one per request state transition.

use serde::{Deserialize, Serialize};

use crate::ids::{RequestId, SessionId};
use crate::status::RequestStatus;
use crate::time::Timestamp;

/// An append-only record of a request state transition.
///
/// The store writes one of these in the same transaction as every status
/// change, including creation (`from == None`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRow {
    /// The request that transitioned.
    pub request_id: RequestId,
    /// Previous status; `None` for the creation row.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<RequestStatus>,
    /// New status.
    pub to: RequestStatus,
    /// Session that caused the transition; `None` for sweeps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_session_id: Option<SessionId>,
    /// When the transition happened.
    pub at: Timestamp,
    /// Short note (e.g. the rejection reason or sweep name).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creation_row_roundtrip() {
        let row = AuditRow {
            request_id: RequestId::new(),
            from: None,
            to: RequestStatus::Pending,
            actor_session_id: Some(SessionId::new()),
            at: Timestamp::now(),
            note: None,
        };
        let json = serde_json::to_string(&row).unwrap();
        assert!(!json.contains("\"from\""));
        let back: AuditRow = serde_json::from_str(&json).unwrap();
        assert_eq!(row, back);
    }
}
