//! CAUTION auto-approval.
//!
//! The auto-approver is a real reviewer as far as the review engine is
//! concerned: it owns a pseudo-session (`slb-auto-approver`) and posts
//! signed reviews through the same door as everyone else, so every
//! auto-approval is attributed and audited.

use chrono::Duration;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use slb_core::{Request, ReviewDecision, ReviewResponses, SessionId, Timestamp};
use slb_crypto::{SessionKey, sign_review};
use slb_request::policy::should_auto_approve_caution;
use slb_request::{NewReview, RequestEngine};
use slb_session::{NewSession, ResumeOptions, SessionManager};

use crate::error::WatchResult;

/// Agent name of the auto-approver pseudo-session.
pub const AUTO_APPROVER_AGENT: &str = "slb-auto-approver";

/// Posts signed approvals for pending CAUTION requests past their grace
/// period. Never touches any other tier; the
/// [`should_auto_approve_caution`] gate decides, not this type.
pub struct AutoApprover {
    engine: Arc<RequestEngine>,
    sessions: SessionManager,
    project: String,
    grace: Duration,
    cached: Mutex<Option<(SessionId, SessionKey)>>,
}

impl AutoApprover {
    /// Create an auto-approver for one project.
    #[must_use]
    pub fn new(
        engine: Arc<RequestEngine>,
        sessions: SessionManager,
        project: impl Into<String>,
        grace: Duration,
    ) -> Self {
        Self {
            engine,
            sessions,
            project: project.into(),
            grace,
            cached: Mutex::new(None),
        }
    }

    /// Approve `request` if the gate and the grace period allow it.
    ///
    /// Returns whether an approval was posted.
    ///
    /// # Errors
    ///
    /// Returns an error when the pseudo-session or the review submission
    /// fails; callers log and keep watching.
    pub async fn maybe_approve(&self, request: &Request) -> WatchResult<bool> {
        if !should_auto_approve_caution(request.status, request.risk_tier) {
            return Ok(false);
        }
        let now = Timestamp::now();
        if now < request.created_at.plus(self.grace) {
            debug!(request = %request.id, "caution grace period still running");
            return Ok(false);
        }

        let (session_id, key) = self.session().await?;
        let ts = Timestamp::now();
        let signature = sign_review(
            &key,
            &request.id.0.to_string(),
            ReviewDecision::Approve.as_str(),
            &ts.to_rfc3339(),
        );

        self.engine
            .submit_review(NewReview {
                request_id: request.id,
                reviewer_session_id: session_id,
                decision: ReviewDecision::Approve,
                comments: Some("auto-approved: caution tier grace period elapsed".to_string()),
                responses: ReviewResponses {
                    reason: "caution tier auto-approval".to_string(),
                    effect: "as stated by the requestor".to_string(),
                    goal: "unblock routine work".to_string(),
                    safety: "tier policy allows auto-approval after the grace period".to_string(),
                },
                signature,
                signature_timestamp: ts,
            })
            .await?;

        info!(request = %request.id, "caution request auto-approved");
        Ok(true)
    }

    /// The pseudo-session, established on first use.
    async fn session(&self) -> WatchResult<(SessionId, SessionKey)> {
        let mut cached = self.cached.lock().await;
        if let Some((id, key)) = cached.as_ref() {
            // Confirm the session is still alive (GC may have ended it).
            if let Ok(Some(session)) = self.engine.store().get_session(*id).await {
                if session.is_active() {
                    return Ok((*id, key.clone()));
                }
            }
            *cached = None;
        }

        let resumed = self
            .sessions
            .resume(
                NewSession {
                    agent_name: AUTO_APPROVER_AGENT.to_string(),
                    program: "slb-watch".to_string(),
                    model: "auto".to_string(),
                    project_path: self.project.clone(),
                },
                ResumeOptions {
                    create_if_missing: true,
                    force_end_mismatch: true,
                },
            )
            .await?;
        let key = SessionKey::from_hex(&resumed.session_key)
            .map_err(|_| slb_session::SessionError::MissingKey(resumed.session.id.to_string()))?;
        let pair = (resumed.session.id, key.clone());
        *cached = Some(pair);
        Ok((resumed.session.id, key))
    }
}

impl std::fmt::Debug for AutoApprover {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutoApprover")
            .field("project", &self.project)
            .finish_non_exhaustive()
    }
}
