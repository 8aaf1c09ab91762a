//! Session entity.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::ids::SessionId;
use crate::time::Timestamp;

/// An agent's working session within one project.
///
/// At most one active session (`ended_at` null) exists per
/// `(agent_name, project_path)`. The session's MAC key is not part of this
/// struct; the store keeps it beside the row and hands it out only to the
/// session manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Unique session identifier.
    pub id: SessionId,
    /// Agent identity (e.g. `claude-main`, `reviewer-2`).
    pub agent_name: String,
    /// Program hosting the agent (e.g. `claude-code`, `cursor`).
    pub program: String,
    /// Model backing the agent, used by the distinct-model quorum rule.
    pub model: String,
    /// Project this session works in.
    pub project_path: String,
    /// When the session started.
    pub started_at: Timestamp,
    /// Advanced by any request, review, or heartbeat.
    pub last_active_at: Timestamp,
    /// Set when the session ends, explicitly or by GC.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<Timestamp>,
}

impl Session {
    /// Whether the session is still active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.ended_at.is_none()
    }

    /// Whether the session has been idle at least `threshold` as of `now`.
    #[must_use]
    pub fn is_stale(&self, threshold: Duration, now: Timestamp) -> bool {
        self.is_active() && self.last_active_at.is_older_than(threshold, now)
    }

    /// Whether this session matches the full identity tuple used by resume.
    #[must_use]
    pub fn matches(&self, agent_name: &str, program: &str, model: &str, project_path: &str) -> bool {
        self.agent_name == agent_name
            && self.program == program
            && self.model == model
            && self.project_path == project_path
    }
}
