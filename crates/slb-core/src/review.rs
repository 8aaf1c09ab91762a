//! Review entity: one reviewer's signed decision on a request.

use serde::{Deserialize, Serialize};
use slb_crypto::ReviewSignature;
use std::fmt;

use crate::ids::{RequestId, ReviewId, SessionId};
use crate::time::Timestamp;

/// A reviewer's verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    /// The command should run.
    Approve,
    /// The command should not run.
    Reject,
}

impl ReviewDecision {
    /// Stable lowercase name; also the MAC input field.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
        }
    }
}

impl fmt::Display for ReviewDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The reviewer's answers to the requestor's justification fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewResponses {
    /// Reviewer's reading of why the command is needed.
    pub reason: String,
    /// Reviewer's expectation of its effect.
    pub effect: String,
    /// Whether the reviewer agrees with the stated goal.
    pub goal: String,
    /// Reviewer's own safety assessment.
    pub safety: String,
}

/// A recorded review.
///
/// At most one review per `(request, reviewer session)`, and the reviewer
/// session is never the requestor session; the store and the review engine
/// both enforce this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    /// Unique review identifier.
    pub id: ReviewId,
    /// The request being reviewed.
    pub request_id: RequestId,
    /// Session that authored the decision.
    pub reviewer_session_id: SessionId,
    /// Agent name of the reviewer.
    pub reviewer_agent: String,
    /// Model of the reviewer, used by the distinct-model quorum rule.
    pub reviewer_model: String,
    /// The verdict.
    pub decision: ReviewDecision,
    /// Keyed MAC over `(request_id, decision, signature_timestamp)` under
    /// the reviewer's session key.
    pub signature: ReviewSignature,
    /// Timestamp the signature covers.
    pub signature_timestamp: Timestamp,
    /// The reviewer's answers to the justification questions.
    pub responses: ReviewResponses,
    /// Free-form comments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    /// When the review was recorded.
    pub created_at: Timestamp,
}
