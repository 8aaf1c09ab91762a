//! Pure safety-gate predicates.
//!
//! Each gate returns a decision, never mutates, and is exhaustively tested
//! here; callers route on these and do not re-derive the logic.

use slb_core::{Request, RequestStatus, Review, ReviewDecision, RiskTier, SessionId};

/// Decision of the cancel-authorization gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CancelCheck {
    /// Whether cancellation is allowed.
    pub allow: bool,
    /// Why, when it is not.
    pub reason: &'static str,
}

/// Only the requestor may cancel, and only while the request is pending.
#[must_use]
pub fn can_cancel(request: &Request, actor: SessionId) -> CancelCheck {
    if actor != request.requestor_session_id {
        return CancelCheck {
            allow: false,
            reason: "only the requestor may cancel",
        };
    }
    if request.status != RequestStatus::Pending {
        return CancelCheck {
            allow: false,
            reason: "request is no longer pending",
        };
    }
    CancelCheck {
        allow: true,
        reason: "",
    }
}

/// Outcome of evaluating quorum over the recorded reviews.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuorumDecision {
    /// Quorum reached; transition to approved.
    Approve,
    /// At least one rejection; transition to rejected.
    Reject,
    /// Keep waiting for reviews.
    Wait,
}

/// Evaluate quorum: one rejection rejects; otherwise approvals must reach
/// `min_approvals` and, when `require_different_model` is set, the
/// approving reviews must span at least two distinct models. Any such pair
/// necessarily contains a model other than the requestor's, so a single
/// model (the requestor's included) can never approve a critical request
/// alone.
#[must_use]
pub fn evaluate_quorum(request: &Request, reviews: &[Review]) -> QuorumDecision {
    if reviews
        .iter()
        .any(|review| review.decision == ReviewDecision::Reject)
    {
        return QuorumDecision::Reject;
    }

    let approvals: Vec<&Review> = reviews
        .iter()
        .filter(|review| review.decision == ReviewDecision::Approve)
        .collect();

    if (approvals.len() as u32) < request.min_approvals {
        return QuorumDecision::Wait;
    }

    if request.require_different_model && !has_distinct_model_pair(&approvals) {
        return QuorumDecision::Wait;
    }

    QuorumDecision::Approve
}

fn has_distinct_model_pair(approvals: &[&Review]) -> bool {
    let distinct: std::collections::HashSet<&str> = approvals
        .iter()
        .map(|review| review.reviewer_model.as_str())
        .collect();
    distinct.len() >= 2
}

/// The auto-approval safety gate.
///
/// Returns `true` only for a pending CAUTION request. This is the predicate
/// that keeps the watcher from ever auto-approving DANGEROUS or CRITICAL,
/// so it stays fully branch-covered in tests.
#[must_use]
pub fn should_auto_approve_caution(status: RequestStatus, tier: RiskTier) -> bool {
    status == RequestStatus::Pending && tier == RiskTier::Caution
}
