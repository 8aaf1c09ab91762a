//! Row shapes: each table stores the full entity under `data` plus the
//! extracted columns the indexes and queries need. Queries never project
//! the record id, so entity serde stays free of `RecordId` concerns.
//!
//! Rows are owned values; the query layer binds them whole.

use serde::{Deserialize, Serialize};
use slb_core::{AuditRow, Outcome, Request, Review, Session};
use slb_patterns::RemovalRequest;

/// Generic projection wrapper: `SELECT data, ... FROM ...`.
#[derive(Debug, Deserialize)]
pub(crate) struct DataRow<T> {
    pub data: T,
}

#[derive(Debug, Serialize)]
pub(crate) struct SessionRow {
    pub session_id: String,
    pub agent_name: String,
    pub project_path: String,
    pub active: bool,
    pub key_hex: String,
    pub last_active_ms: i64,
    pub data: Session,
}

impl SessionRow {
    pub(crate) fn new(session: &Session, key_hex: &str) -> Self {
        Self {
            session_id: session.id.0.to_string(),
            agent_name: session.agent_name.clone(),
            project_path: session.project_path.clone(),
            active: session.is_active(),
            key_hex: key_hex.to_string(),
            last_active_ms: session.last_active_at.epoch_ms(),
            data: session.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct RequestRow {
    pub request_id: String,
    pub project_path: String,
    pub status: &'static str,
    pub tier: &'static str,
    pub command_raw: String,
    pub command_hash: String,
    pub reason: String,
    pub created_ms: i64,
    pub data: Request,
}

impl RequestRow {
    pub(crate) fn new(request: &Request) -> Self {
        Self {
            request_id: request.id.0.to_string(),
            project_path: request.project_path.clone(),
            status: request.status.as_str(),
            tier: request.risk_tier.as_str(),
            command_raw: request.command.raw.clone(),
            command_hash: request.command.hash.to_hex(),
            reason: request.justification.reason.clone(),
            created_ms: request.created_at.epoch_ms(),
            data: request.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ReviewRow {
    pub review_id: String,
    pub request_id: String,
    pub reviewer_session_id: String,
    pub created_ms: i64,
    pub data: Review,
}

impl ReviewRow {
    pub(crate) fn new(review: &Review) -> Self {
        Self {
            review_id: review.id.0.to_string(),
            request_id: review.request_id.0.to_string(),
            reviewer_session_id: review.reviewer_session_id.0.to_string(),
            created_ms: review.created_at.epoch_ms(),
            data: review.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct OutcomeRow {
    pub request_id: String,
    pub project_path: String,
    pub recorded_ms: i64,
    pub data: Outcome,
}

impl OutcomeRow {
    pub(crate) fn new(outcome: &Outcome, project_path: &str) -> Self {
        Self {
            request_id: outcome.request_id.0.to_string(),
            project_path: project_path.to_string(),
            recorded_ms: outcome.recorded_at.epoch_ms(),
            data: outcome.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct AuditRowRecord {
    pub request_id: String,
    pub at_us: i64,
    pub seq: i64,
    pub data: AuditRow,
}

impl AuditRowRecord {
    pub(crate) fn new(row: &AuditRow, seq: i64) -> Self {
        Self {
            request_id: row.request_id.0.to_string(),
            at_us: row.at.0.timestamp_micros(),
            seq,
            data: row.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct RemovalRow {
    pub removal_id: String,
    pub created_ms: i64,
    pub data: RemovalRequest,
}

impl RemovalRow {
    pub(crate) fn new(removal: &RemovalRequest) -> Self {
        Self {
            removal_id: removal.id.0.to_string(),
            created_ms: removal.created_at.epoch_ms(),
            data: removal.clone(),
        }
    }
}
