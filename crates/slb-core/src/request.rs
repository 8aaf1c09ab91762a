//! Approval request entity and its embedded records.

use serde::{Deserialize, Serialize};

use crate::command::CommandSpec;
use crate::ids::{RequestId, SessionId};
use crate::status::RequestStatus;
use crate::tier::RiskTier;
use crate::time::Timestamp;

/// Why the requestor believes the command should run.
///
/// Reviewers answer the same four questions from their own reading of the
/// command; mismatched answers are the review conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Justification {
    /// Why this command is needed now.
    pub reason: String,
    /// What the requestor expects it to change.
    pub expected_effect: String,
    /// The larger goal this step serves.
    pub goal: String,
    /// Why the requestor believes it is safe.
    pub safety_argument: String,
}

/// Kind of evidence attached to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentKind {
    /// A text file relevant to the command.
    File,
    /// Free-form context written by the requestor.
    Context,
    /// A screenshot, base64-encoded.
    Screenshot,
}

/// Descriptive metadata for an attachment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentMetadata {
    /// Size of the (decoded) content in bytes.
    pub size_bytes: u64,
    /// MIME type, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime: Option<String>,
    /// Command that produced this attachment, when any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_command: Option<String>,
}

/// Evidence attached to a request for reviewers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// What kind of evidence this is.
    pub kind: AttachmentKind,
    /// Text for file/context attachments; base64 for screenshots.
    pub content: String,
    /// Descriptive metadata.
    #[serde(default)]
    pub metadata: AttachmentMetadata,
}

/// A dry-run the requestor performed before asking for the real thing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DryRun {
    /// The dry-run command.
    pub command: String,
    /// Its captured output.
    pub output: String,
}

/// Result of executing an approved request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// Path of the captured execution log.
    pub log_path: String,
    /// Exit code of the command.
    pub exit_code: i32,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
    /// Session that executed the command.
    pub executed_by_session_id: SessionId,
    /// Agent name of the executor.
    pub executed_by_agent: String,
    /// Model of the executor.
    pub executed_by_model: String,
    /// When execution finished.
    pub executed_at: Timestamp,
}

/// Rollback capture for an executed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackRecord {
    /// Path of the rollback capture.
    pub path: String,
    /// When the rollback was applied, if it was.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rolled_back_at: Option<Timestamp>,
}

/// An approval request: one command, one decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Unique request identifier.
    pub id: RequestId,
    /// Project this request belongs to.
    pub project_path: String,
    /// The command to run.
    pub command: CommandSpec,
    /// Risk tier assigned at creation.
    pub risk_tier: RiskTier,
    /// Current state.
    pub status: RequestStatus,
    /// Approvals required to reach quorum.
    pub min_approvals: u32,
    /// Whether quorum additionally needs two approvals from models distinct
    /// from the requestor's and from each other.
    pub require_different_model: bool,
    /// Session that created the request.
    pub requestor_session_id: SessionId,
    /// Agent name of the requestor.
    pub requestor_agent: String,
    /// Model of the requestor.
    pub requestor_model: String,
    /// The requestor's four-part justification.
    pub justification: Justification,
    /// Evidence for reviewers.
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    /// Dry-run evidence, when provided.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dry_run: Option<DryRun>,
    /// When the request was created.
    pub created_at: Timestamp,
    /// Hard deadline for a decision while pending.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<Timestamp>,
    /// Deadline to start executing after approval.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_expires_at: Option<Timestamp>,
    /// When the request reached a decision (approved, rejected, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<Timestamp>,
    /// Execution result, once executed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution: Option<ExecutionRecord>,
    /// Rollback capture, when one was taken.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollback: Option<RollbackRecord>,
}

impl Request {
    /// Whether the decision window has lapsed at `now`.
    #[must_use]
    pub fn decision_expired(&self, now: Timestamp) -> bool {
        self.status == RequestStatus::Pending
            && self.expires_at.is_some_and(|deadline| now >= deadline)
    }

    /// Whether the execution window has lapsed at `now`.
    #[must_use]
    pub fn approval_expired(&self, now: Timestamp) -> bool {
        self.status == RequestStatus::Approved
            && self.approval_expires_at.is_some_and(|deadline| now >= deadline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandSpec;
    use chrono::Duration;

    fn make_request(status: RequestStatus) -> Request {
        Request {
            id: RequestId::new(),
            project_path: "/work/demo".to_string(),
            command: CommandSpec::build("rm -rf ./build", "/work/demo", true, &[]).unwrap(),
            risk_tier: RiskTier::Dangerous,
            status,
            min_approvals: 1,
            require_different_model: false,
            requestor_session_id: SessionId::new(),
            requestor_agent: "alice".to_string(),
            requestor_model: "model-a".to_string(),
            justification: Justification::default(),
            attachments: Vec::new(),
            dry_run: None,
            created_at: Timestamp::now(),
            expires_at: None,
            approval_expires_at: None,
            resolved_at: None,
            execution: None,
            rollback: None,
        }
    }

    #[test]
    fn test_decision_expired() {
        let now = Timestamp::now();
        let mut req = make_request(RequestStatus::Pending);
        assert!(!req.decision_expired(now));

        req.expires_at = Some(now.plus(Duration::minutes(-1)));
        assert!(req.decision_expired(now));

        // Only pending requests decision-expire.
        req.status = RequestStatus::Approved;
        assert!(!req.decision_expired(now));
    }

    #[test]
    fn test_approval_expired() {
        let now = Timestamp::now();
        let mut req = make_request(RequestStatus::Approved);
        req.approval_expires_at = Some(now.plus(Duration::minutes(-1)));
        assert!(req.approval_expired(now));

        req.approval_expires_at = Some(now.plus(Duration::minutes(10)));
        assert!(!req.approval_expired(now));
    }

    #[test]
    fn test_serde_roundtrip() {
        let req = make_request(RequestStatus::Pending);
        let json = serde_json::to_string(&req).unwrap();
        let back: Request = serde_json::from_str(&json).unwrap();
        assert_eq!(req, back);
    }
}
