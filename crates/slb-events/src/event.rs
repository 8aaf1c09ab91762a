//! Event types.

use serde::{Deserialize, Serialize};
use slb_core::{RequestId, RiskTier, Timestamp};
use uuid::Uuid;

/// Metadata every event carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// When the event was published.
    pub at: Timestamp,
    /// Component that published it.
    pub source: String,
}

impl EventMetadata {
    /// Create metadata stamped now.
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            at: Timestamp::now(),
            source: source.into(),
        }
    }
}

/// A request lifecycle event.
///
/// The `type` tag on the wire matches [`SlbEvent::event_type`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SlbEvent {
    /// A request was created and awaits review.
    RequestPending {
        /// Event metadata.
        metadata: EventMetadata,
        /// The request.
        request_id: RequestId,
        /// Project the request belongs to.
        project_path: String,
        /// Risk tier assigned at creation.
        tier: RiskTier,
        /// Display form of the command (redacted when sensitive).
        command: String,
    },
    /// A review was recorded (quorum may or may not be reached).
    #[serde(rename = "request_review_added")]
    RequestReviewAdded {
        /// Event metadata.
        metadata: EventMetadata,
        /// The request.
        request_id: RequestId,
        /// Project the request belongs to.
        project_path: String,
        /// Reviewer agent name.
        reviewer_agent: String,
        /// `approve` or `reject`.
        decision: String,
    },
    /// Quorum reached; the request may execute.
    RequestApproved {
        /// Event metadata.
        metadata: EventMetadata,
        /// The request.
        request_id: RequestId,
        /// Project the request belongs to.
        project_path: String,
    },
    /// A reviewer rejected the request.
    RequestRejected {
        /// Event metadata.
        metadata: EventMetadata,
        /// The request.
        request_id: RequestId,
        /// Project the request belongs to.
        project_path: String,
    },
    /// The requestor withdrew the request.
    RequestCancelled {
        /// Event metadata.
        metadata: EventMetadata,
        /// The request.
        request_id: RequestId,
        /// Project the request belongs to.
        project_path: String,
    },
    /// The decision window lapsed while pending.
    RequestTimeout {
        /// Event metadata.
        metadata: EventMetadata,
        /// The request.
        request_id: RequestId,
        /// Project the request belongs to.
        project_path: String,
    },
    /// Execution started.
    RequestExecuting {
        /// Event metadata.
        metadata: EventMetadata,
        /// The request.
        request_id: RequestId,
        /// Project the request belongs to.
        project_path: String,
    },
    /// Execution finished.
    RequestExecuted {
        /// Event metadata.
        metadata: EventMetadata,
        /// The request.
        request_id: RequestId,
        /// Project the request belongs to.
        project_path: String,
        /// Exit code of the command.
        exit_code: i32,
    },
    /// The command could not be launched or was aborted.
    RequestExecutionFailed {
        /// Event metadata.
        metadata: EventMetadata,
        /// The request.
        request_id: RequestId,
        /// Project the request belongs to.
        project_path: String,
    },
    /// Approved but never executed inside the approval window.
    RequestTimedOut {
        /// Event metadata.
        metadata: EventMetadata,
        /// The request.
        request_id: RequestId,
        /// Project the request belongs to.
        project_path: String,
    },
}

impl SlbEvent {
    /// The wire name of this event.
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::RequestPending { .. } => "request_pending",
            Self::RequestReviewAdded { .. } => "request_review_added",
            Self::RequestApproved { .. } => "request_approved",
            Self::RequestRejected { .. } => "request_rejected",
            Self::RequestCancelled { .. } => "request_cancelled",
            Self::RequestTimeout { .. } => "request_timeout",
            Self::RequestExecuting { .. } => "request_executing",
            Self::RequestExecuted { .. } => "request_executed",
            Self::RequestExecutionFailed { .. } => "request_execution_failed",
            Self::RequestTimedOut { .. } => "request_timed_out",
        }
    }

    /// The request this event is about.
    #[must_use]
    pub const fn request_id(&self) -> RequestId {
        match self {
            Self::RequestPending { request_id, .. }
            | Self::RequestReviewAdded { request_id, .. }
            | Self::RequestApproved { request_id, .. }
            | Self::RequestRejected { request_id, .. }
            | Self::RequestCancelled { request_id, .. }
            | Self::RequestTimeout { request_id, .. }
            | Self::RequestExecuting { request_id, .. }
            | Self::RequestExecuted { request_id, .. }
            | Self::RequestExecutionFailed { request_id, .. }
            | Self::RequestTimedOut { request_id, .. } => *request_id,
        }
    }

    /// The project this event belongs to.
    #[must_use]
    pub fn project_path(&self) -> &str {
        match self {
            Self::RequestPending { project_path, .. }
            | Self::RequestReviewAdded { project_path, .. }
            | Self::RequestApproved { project_path, .. }
            | Self::RequestRejected { project_path, .. }
            | Self::RequestCancelled { project_path, .. }
            | Self::RequestTimeout { project_path, .. }
            | Self::RequestExecuting { project_path, .. }
            | Self::RequestExecuted { project_path, .. }
            | Self::RequestExecutionFailed { project_path, .. }
            | Self::RequestTimedOut { project_path, .. } => project_path,
        }
    }
}

/// Subscription filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFilter {
    /// Only events for this project, when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    /// Only events for this request, when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<RequestId>,
}

impl EventFilter {
    /// Whether an event passes this filter.
    #[must_use]
    pub fn matches(&self, event: &SlbEvent) -> bool {
        if let Some(project) = &self.project {
            if event.project_path() != project {
                return false;
            }
        }
        if let Some(request_id) = self.request_id {
            if event.request_id() != request_id {
                return false;
            }
        }
        true
    }
}
