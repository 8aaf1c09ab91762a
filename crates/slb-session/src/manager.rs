//! The session manager.

use chrono::Duration;
use std::sync::Arc;
use tracing::{debug, info, warn};

use slb_core::{Session, SessionId, Timestamp};
use slb_crypto::SessionKey;
use slb_store::Store;

use crate::error::{SessionError, SessionResult};

/// Identity tuple for a new or resumed session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSession {
    /// Agent identity (e.g. `claude-main`).
    pub agent_name: String,
    /// Program hosting the agent.
    pub program: String,
    /// Model backing the agent.
    pub model: String,
    /// Project the session works in.
    pub project_path: String,
}

/// A freshly started session and its key. The key is returned here and
/// nowhere else.
#[derive(Debug)]
pub struct StartedSession {
    /// The session.
    pub session: Session,
    /// Hex session key for signing reviews.
    pub session_key: String,
}

/// Options for [`SessionManager::resume`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ResumeOptions {
    /// Start a session when none is active.
    pub create_if_missing: bool,
    /// End a conflicting active session and start fresh.
    pub force_end_mismatch: bool,
}

/// Result of a resume.
#[derive(Debug)]
pub struct ResumedSession {
    /// The active session (existing or fresh).
    pub session: Session,
    /// Hex session key.
    pub session_key: String,
    /// Whether a new session was created.
    pub created: bool,
}

/// Garbage-collection report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GcReport {
    /// Sessions whose idle time exceeded the threshold.
    pub candidates: Vec<SessionId>,
    /// Sessions actually ended (empty on dry runs).
    pub ended: Vec<SessionId>,
    /// Candidates that could not be ended.
    pub skipped: Vec<SessionId>,
    /// Whether this was a dry run.
    pub dry_run: bool,
}

/// Session lifecycle operations over the store.
#[derive(Debug, Clone)]
pub struct SessionManager {
    store: Arc<Store>,
}

impl SessionManager {
    /// Create a manager over a store.
    #[must_use]
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Start a new session.
    ///
    /// Generates the session key, persists the session, and returns the key
    /// exactly once.
    ///
    /// # Errors
    ///
    /// Propagates [`slb_store::StoreError::ActiveSessionExists`] when the
    /// uniqueness invariant would be violated.
    pub async fn start(&self, new: NewSession) -> SessionResult<StartedSession> {
        let now = Timestamp::now();
        let session = Session {
            id: SessionId::new(),
            agent_name: new.agent_name,
            program: new.program,
            model: new.model,
            project_path: new.project_path,
            started_at: now,
            last_active_at: now,
            ended_at: None,
        };
        let key = SessionKey::generate();
        self.store.create_session(&session, &key.to_hex()).await?;
        info!(session = %session.id, agent = %session.agent_name, project = %session.project_path, "session started");
        Ok(StartedSession {
            session,
            session_key: key.to_hex(),
        })
    }

    /// Resume the active session matching the full identity tuple.
    ///
    /// With `create_if_missing`, starts one when none is active. With
    /// `force_end_mismatch`, ends a conflicting session (same agent and
    /// project, different program or model) and starts fresh.
    ///
    /// # Errors
    ///
    /// [`SessionError::NoActiveSession`] when nothing matches and creation
    /// is off; [`SessionError::SessionMismatch`] for a conflict without
    /// `force_end_mismatch`.
    pub async fn resume(
        &self,
        new: NewSession,
        opts: ResumeOptions,
    ) -> SessionResult<ResumedSession> {
        let existing = self
            .store
            .find_active_session(&new.agent_name, &new.project_path)
            .await?;

        match existing {
            Some(session)
                if session.matches(
                    &new.agent_name,
                    &new.program,
                    &new.model,
                    &new.project_path,
                ) =>
            {
                let session = self.store.touch_session(session.id, Timestamp::now()).await?;
                let session_key = self
                    .store
                    .get_session_key(session.id)
                    .await?
                    .ok_or_else(|| SessionError::MissingKey(session.id.to_string()))?;
                debug!(session = %session.id, "session resumed");
                Ok(ResumedSession {
                    session,
                    session_key,
                    created: false,
                })
            }
            Some(conflicting) => {
                if !opts.force_end_mismatch {
                    return Err(SessionError::SessionMismatch {
                        existing_id: conflicting.id.to_string(),
                        agent: new.agent_name,
                        project: new.project_path,
                    });
                }
                warn!(ended = %conflicting.id, "ending mismatched session on forced resume");
                self.store.end_session(conflicting.id, Timestamp::now()).await?;
                let started = self.start(new).await?;
                Ok(ResumedSession {
                    session: started.session,
                    session_key: started.session_key,
                    created: true,
                })
            }
            None => {
                if !opts.create_if_missing {
                    return Err(SessionError::NoActiveSession {
                        agent: new.agent_name,
                        project: new.project_path,
                    });
                }
                let started = self.start(new).await?;
                Ok(ResumedSession {
                    session: started.session,
                    session_key: started.session_key,
                    created: true,
                })
            }
        }
    }

    /// Advance a session's `last_active_at` to now.
    ///
    /// # Errors
    ///
    /// Propagates store `NotFound`.
    pub async fn heartbeat(&self, id: SessionId) -> SessionResult<Timestamp> {
        let now = Timestamp::now();
        self.store.touch_session(id, now).await?;
        Ok(now)
    }

    /// End a session explicitly.
    ///
    /// # Errors
    ///
    /// Propagates store `NotFound`.
    pub async fn end(&self, id: SessionId) -> SessionResult<Session> {
        let session = self.store.end_session(id, Timestamp::now()).await?;
        info!(session = %id, "session ended");
        Ok(session)
    }

    /// List sessions.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub async fn list(
        &self,
        project: Option<&str>,
        include_ended: bool,
    ) -> SessionResult<Vec<Session>> {
        Ok(self.store.list_sessions(project, include_ended).await?)
    }

    /// Garbage-collect stale sessions: active sessions idle at least
    /// `threshold`. Dry runs only report candidates; interactive
    /// confirmation is the caller's concern.
    ///
    /// # Errors
    ///
    /// Propagates store errors from the listing; per-session end failures
    /// are collected into `skipped`, not raised.
    pub async fn gc(
        &self,
        project: Option<&str>,
        threshold: Duration,
        dry_run: bool,
    ) -> SessionResult<GcReport> {
        let now = Timestamp::now();
        let candidates: Vec<SessionId> = self
            .store
            .list_sessions(project, false)
            .await?
            .into_iter()
            .filter(|session| session.is_stale(threshold, now))
            .map(|session| session.id)
            .collect();

        if dry_run {
            return Ok(GcReport {
                candidates,
                ended: Vec::new(),
                skipped: Vec::new(),
                dry_run: true,
            });
        }

        let mut ended = Vec::new();
        let mut skipped = Vec::new();
        for id in &candidates {
            match self.store.end_session(*id, now).await {
                Ok(_) => ended.push(*id),
                Err(e) => {
                    warn!(session = %id, error = %e, "gc could not end session");
                    skipped.push(*id);
                }
            }
        }
        info!(ended = ended.len(), skipped = skipped.len(), "session gc complete");
        Ok(GcReport {
            candidates,
            ended,
            skipped,
            dry_run: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_session(agent: &str, project: &str) -> NewSession {
        NewSession {
            agent_name: agent.to_string(),
            program: "claude-code".to_string(),
            model: "model-a".to_string(),
            project_path: project.to_string(),
        }
    }

    async fn manager() -> SessionManager {
        SessionManager::new(Arc::new(Store::open_memory().await.unwrap()))
    }

    #[tokio::test]
    async fn test_start_returns_key_once() {
        let mgr = manager().await;
        let started = mgr.start(new_session("alice", "/p")).await.unwrap();
        assert_eq!(started.session_key.len(), 64);
        assert!(started.session.is_active());
    }

    #[tokio::test]
    async fn test_start_conflict() {
        let mgr = manager().await;
        mgr.start(new_session("alice", "/p")).await.unwrap();
        let err = mgr.start(new_session("alice", "/p")).await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::Store(slb_store::StoreError::ActiveSessionExists { .. })
        ));
    }

    #[tokio::test]
    async fn test_resume_exact_match() {
        let mgr = manager().await;
        let started = mgr.start(new_session("alice", "/p")).await.unwrap();

        let resumed = mgr
            .resume(new_session("alice", "/p"), ResumeOptions::default())
            .await
            .unwrap();
        assert!(!resumed.created);
        assert_eq!(resumed.session.id, started.session.id);
        assert_eq!(resumed.session_key, started.session_key);
    }

    #[tokio::test]
    async fn test_resume_missing_without_create() {
        let mgr = manager().await;
        let err = mgr
            .resume(new_session("alice", "/p"), ResumeOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::NoActiveSession { .. }));
    }

    #[tokio::test]
    async fn test_resume_create_if_missing() {
        let mgr = manager().await;
        let resumed = mgr
            .resume(
                new_session("alice", "/p"),
                ResumeOptions {
                    create_if_missing: true,
                    force_end_mismatch: false,
                },
            )
            .await
            .unwrap();
        assert!(resumed.created);
    }

    #[tokio::test]
    async fn test_resume_mismatch_refused_then_forced() {
        let mgr = manager().await;
        let started = mgr.start(new_session("alice", "/p")).await.unwrap();

        let mut mismatched = new_session("alice", "/p");
        mismatched.model = "model-b".to_string();

        let err = mgr
            .resume(mismatched.clone(), ResumeOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::SessionMismatch { .. }));

        let resumed = mgr
            .resume(
                mismatched,
                ResumeOptions {
                    create_if_missing: false,
                    force_end_mismatch: true,
                },
            )
            .await
            .unwrap();
        assert!(resumed.created);
        assert_ne!(resumed.session.id, started.session.id);

        // The old session is ended.
        let old = mgr.store.get_session(started.session.id).await.unwrap().unwrap();
        assert!(!old.is_active());
    }

    #[tokio::test]
    async fn test_heartbeat_advances() {
        let mgr = manager().await;
        let started = mgr.start(new_session("alice", "/p")).await.unwrap();
        let before = started.session.last_active_at;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let at = mgr.heartbeat(started.session.id).await.unwrap();
        assert!(at > before);
    }

    #[tokio::test]
    async fn test_gc_dry_run_then_force() {
        let mgr = manager().await;
        let stale = mgr.start(new_session("alice", "/p")).await.unwrap();
        let fresh = mgr.start(new_session("bob", "/p")).await.unwrap();

        // Age the first session by two hours.
        let old = Timestamp(Timestamp::now().0 - Duration::hours(2));
        mgr.store.touch_session(stale.session.id, old).await.unwrap();

        let report = mgr.gc(Some("/p"), Duration::minutes(30), true).await.unwrap();
        assert!(report.dry_run);
        assert_eq!(report.candidates, vec![stale.session.id]);
        assert!(report.ended.is_empty());

        // Dry run mutated nothing.
        assert!(
            mgr.store
                .get_session(stale.session.id)
                .await
                .unwrap()
                .unwrap()
                .is_active()
        );

        let report = mgr.gc(Some("/p"), Duration::minutes(30), false).await.unwrap();
        assert_eq!(report.ended, vec![stale.session.id]);
        assert!(report.skipped.is_empty());

        assert!(
            !mgr.store
                .get_session(stale.session.id)
                .await
                .unwrap()
                .unwrap()
                .is_active()
        );
        assert!(
            mgr.store
                .get_session(fresh.session.id)
                .await
                .unwrap()
                .unwrap()
                .is_active()
        );
    }
}
