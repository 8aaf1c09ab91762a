//! The store API: every durable read and write in SLB goes through here.

use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};
use surrealdb::Surreal;
use surrealdb::engine::any::Any;
use tokio::sync::Mutex;
use tracing::debug;

use slb_core::{
    AuditRow, Outcome, Request, RequestId, RequestStatus, Review, Session, SessionId, Timestamp,
};
use slb_patterns::RemovalRequest;

use surrealdb::types::SerdeWrapper;

use crate::db;
use crate::error::{StoreError, StoreResult};
use crate::rows::{
    AuditRowRecord, DataRow, OutcomeRow, RemovalRow, RequestRow, ReviewRow, SessionRow,
};

/// A search hit with its relevance score.
#[derive(Debug, Clone)]
pub struct ScoredRequest {
    /// The matching request.
    pub request: Request,
    /// Summed BM25 score across the indexed columns.
    pub score: f64,
}

/// The embedded store.
///
/// Writes serialize behind `writer`; reads go straight to the database.
pub struct Store {
    db: Surreal<Any>,
    writer: Mutex<()>,
    audit_seq: AtomicI64,
}

impl Store {
    /// Open (and migrate) the on-disk store at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub async fn open(path: &Path) -> StoreResult<Self> {
        Ok(Self {
            db: db::connect_embedded(path).await?,
            writer: Mutex::new(()),
            audit_seq: AtomicI64::new(0),
        })
    }

    /// Open an in-memory store (for tests).
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub async fn open_memory() -> StoreResult<Self> {
        Ok(Self {
            db: db::connect_memory().await?,
            writer: Mutex::new(()),
            audit_seq: AtomicI64::new(0),
        })
    }

    // -- Sessions ---------------------------------------------------------

    /// Persist a new session with its MAC key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ActiveSessionExists`] when an active session
    /// already exists for the same `(agent_name, project_path)`.
    pub async fn create_session(&self, session: &Session, key_hex: &str) -> StoreResult<()> {
        let _guard = self.writer.lock().await;

        if let Some(existing) = self
            .find_active_session(&session.agent_name, &session.project_path)
            .await?
        {
            debug!(existing = %existing.id, "active session conflict");
            return Err(StoreError::ActiveSessionExists {
                agent: session.agent_name.clone(),
                project: session.project_path.clone(),
            });
        }

        self.db
            .query("CREATE session CONTENT $row")
            .bind(("row", SerdeWrapper(SessionRow::new(session, key_hex))))
            .await?
            .check()?;
        Ok(())
    }

    /// Fetch a session by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get_session(&self, id: SessionId) -> StoreResult<Option<Session>> {
        let mut res = self
            .db
            .query("SELECT data FROM session WHERE session_id = $sid")
            .bind(("sid", id.0.to_string()))
            .await?;
        let rows: Vec<SerdeWrapper<DataRow<Session>>> = res.take(0)?;
        Ok(rows.into_iter().next().map(|row| row.0.data))
    }

    /// Fetch a session's MAC key (hex).
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get_session_key(&self, id: SessionId) -> StoreResult<Option<String>> {
        #[derive(serde::Deserialize)]
        struct KeyRow {
            key_hex: String,
        }

        let mut res = self
            .db
            .query("SELECT key_hex FROM session WHERE session_id = $sid")
            .bind(("sid", id.0.to_string()))
            .await?;
        let rows: Vec<SerdeWrapper<KeyRow>> = res.take(0)?;
        Ok(rows.into_iter().next().map(|row| row.0.key_hex))
    }

    /// Find the active session for `(agent, project)`, when one exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn find_active_session(
        &self,
        agent: &str,
        project: &str,
    ) -> StoreResult<Option<Session>> {
        let mut res = self
            .db
            .query(
                "SELECT data FROM session \
                 WHERE agent_name = $agent AND project_path = $project AND active = true \
                 LIMIT 1",
            )
            .bind(("agent", agent.to_string()))
            .bind(("project", project.to_string()))
            .await?;
        let rows: Vec<SerdeWrapper<DataRow<Session>>> = res.take(0)?;
        Ok(rows.into_iter().next().map(|row| row.0.data))
    }

    /// List sessions, optionally scoped to a project; `include_ended`
    /// widens the listing past active sessions.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_sessions(
        &self,
        project: Option<&str>,
        include_ended: bool,
    ) -> StoreResult<Vec<Session>> {
        let query = match (project.is_some(), include_ended) {
            (true, true) => {
                "SELECT data, last_active_ms FROM session WHERE project_path = $project \
                 ORDER BY last_active_ms DESC"
            }
            (true, false) => {
                "SELECT data, last_active_ms FROM session \
                 WHERE project_path = $project AND active = true \
                 ORDER BY last_active_ms DESC"
            }
            (false, true) => {
                "SELECT data, last_active_ms FROM session ORDER BY last_active_ms DESC"
            }
            (false, false) => {
                "SELECT data, last_active_ms FROM session WHERE active = true \
                 ORDER BY last_active_ms DESC"
            }
        };
        let mut q = self.db.query(query);
        if let Some(project) = project {
            q = q.bind(("project", project.to_string()));
        }
        let mut res = q.await?;
        let rows: Vec<SerdeWrapper<DataRow<Session>>> = res.take(0)?;
        Ok(rows.into_iter().map(|row| row.0.data).collect())
    }

    /// Advance a session's `last_active_at`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for an unknown session.
    pub async fn touch_session(&self, id: SessionId, at: Timestamp) -> StoreResult<Session> {
        let _guard = self.writer.lock().await;
        let mut session = self
            .get_session(id)
            .await?
            .ok_or_else(|| not_found("session", id.to_string()))?;
        session.last_active_at = at;
        self.write_session(&session).await?;
        Ok(session)
    }

    /// End a session.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for an unknown session.
    pub async fn end_session(&self, id: SessionId, at: Timestamp) -> StoreResult<Session> {
        let _guard = self.writer.lock().await;
        let mut session = self
            .get_session(id)
            .await?
            .ok_or_else(|| not_found("session", id.to_string()))?;
        if session.is_active() {
            session.ended_at = Some(at);
            session.last_active_at = at;
            self.write_session(&session).await?;
        }
        Ok(session)
    }

    async fn write_session(&self, session: &Session) -> StoreResult<()> {
        self.db
            .query(
                "UPDATE session \
                 SET active = $active, last_active_ms = $ms, data = $data \
                 WHERE session_id = $sid",
            )
            .bind(("active", session.is_active()))
            .bind(("ms", session.last_active_at.epoch_ms()))
            .bind(("data", SerdeWrapper(session.clone())))
            .bind(("sid", session.id.0.to_string()))
            .await?
            .check()?;
        Ok(())
    }

    // -- Requests ---------------------------------------------------------

    /// Persist a new request, writing its creation audit row in the same
    /// transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn create_request(&self, request: &Request) -> StoreResult<()> {
        let _guard = self.writer.lock().await;
        let audit = AuditRow {
            request_id: request.id,
            from: None,
            to: request.status,
            actor_session_id: Some(request.requestor_session_id),
            at: request.created_at,
            note: None,
        };
        self.db
            .query(
                "BEGIN TRANSACTION; \
                 CREATE request CONTENT $row; \
                 CREATE audit CONTENT $audit; \
                 COMMIT TRANSACTION;",
            )
            .bind(("row", SerdeWrapper(RequestRow::new(request))))
            .bind((
                "audit",
                SerdeWrapper(AuditRowRecord::new(&audit, self.next_seq())),
            ))
            .await?
            .check()?;
        Ok(())
    }

    /// Fetch a request by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get_request(&self, id: RequestId) -> StoreResult<Option<Request>> {
        let mut res = self
            .db
            .query("SELECT data FROM request WHERE request_id = $rid")
            .bind(("rid", id.0.to_string()))
            .await?;
        let rows: Vec<SerdeWrapper<DataRow<Request>>> = res.take(0)?;
        Ok(rows.into_iter().next().map(|row| row.0.data))
    }

    /// List pending requests, oldest first; `project = None` means all
    /// projects.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_pending(&self, project: Option<&str>) -> StoreResult<Vec<Request>> {
        self.list_by_status(RequestStatus::Pending, project).await
    }

    /// List pending requests across a set of projects (the review pool).
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_pending_in(&self, projects: &[String]) -> StoreResult<Vec<Request>> {
        let mut res = self
            .db
            .query(
                "SELECT data, created_ms FROM request \
                 WHERE status = 'pending' AND project_path IN $projects \
                 ORDER BY created_ms ASC",
            )
            .bind(("projects", projects.to_vec()))
            .await?;
        let rows: Vec<SerdeWrapper<DataRow<Request>>> = res.take(0)?;
        Ok(rows.into_iter().map(|row| row.0.data).collect())
    }

    /// List requests in a given status, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_by_status(
        &self,
        status: RequestStatus,
        project: Option<&str>,
    ) -> StoreResult<Vec<Request>> {
        let query = if project.is_some() {
            "SELECT data, created_ms FROM request \
             WHERE status = $status AND project_path = $project \
             ORDER BY created_ms ASC"
        } else {
            "SELECT data, created_ms FROM request WHERE status = $status \
             ORDER BY created_ms ASC"
        };
        let mut q = self.db.query(query).bind(("status", status.as_str()));
        if let Some(project) = project {
            q = q.bind(("project", project.to_string()));
        }
        let mut res = q.await?;
        let rows: Vec<SerdeWrapper<DataRow<Request>>> = res.take(0)?;
        Ok(rows.into_iter().map(|row| row.0.data).collect())
    }

    /// List every request, oldest first, optionally scoped to a project.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_requests(&self, project: Option<&str>) -> StoreResult<Vec<Request>> {
        let query = if project.is_some() {
            "SELECT data, created_ms FROM request WHERE project_path = $project \
             ORDER BY created_ms ASC"
        } else {
            "SELECT data, created_ms FROM request ORDER BY created_ms ASC"
        };
        let mut q = self.db.query(query);
        if let Some(project) = project {
            q = q.bind(("project", project.to_string()));
        }
        let mut res = q.await?;
        let rows: Vec<SerdeWrapper<DataRow<Request>>> = res.take(0)?;
        Ok(rows.into_iter().map(|row| row.0.data).collect())
    }

    /// Find an approved request for this exact command hash in a project.
    /// Used by the hook fast path to let an already-approved command run.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn find_approved_by_hash(
        &self,
        project: &str,
        command_hash: &str,
    ) -> StoreResult<Option<Request>> {
        let mut res = self
            .db
            .query(
                "SELECT data, created_ms FROM request \
                 WHERE project_path = $project AND command_hash = $hash \
                   AND status = 'approved' \
                 ORDER BY created_ms DESC LIMIT 1",
            )
            .bind(("project", project.to_string()))
            .bind(("hash", command_hash.to_string()))
            .await?;
        let rows: Vec<SerdeWrapper<DataRow<Request>>> = res.take(0)?;
        Ok(rows.into_iter().next().map(|row| row.0.data))
    }

    /// Transition a request `from -> to`, applying `update` to the entity
    /// and writing the audit row in the same transaction.
    ///
    /// This is the single door for status changes: it CAS-checks the
    /// current status under the writer lock, so a losing racer gets
    /// [`StoreError::RequestNotPending`] instead of double-transitioning.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] for an unknown request,
    /// [`StoreError::RequestNotPending`] when the current status is not
    /// `from`, and [`StoreError::IllegalTransition`] for a transition the
    /// state machine forbids.
    pub async fn transition_request(
        &self,
        id: RequestId,
        from: RequestStatus,
        to: RequestStatus,
        actor: Option<SessionId>,
        note: Option<String>,
        update: impl FnOnce(&mut Request),
    ) -> StoreResult<Request> {
        let _guard = self.writer.lock().await;

        let mut request = self
            .get_request(id)
            .await?
            .ok_or_else(|| not_found("request", id.to_string()))?;

        if request.status != from {
            return Err(StoreError::RequestNotPending {
                id: id.to_string(),
                actual: request.status,
            });
        }
        if !from.can_transition_to(to) {
            return Err(StoreError::IllegalTransition { from, to });
        }

        let at = Timestamp::now();
        request.status = to;
        if to.is_terminal() || to == RequestStatus::Approved {
            request.resolved_at.get_or_insert(at);
        }
        update(&mut request);

        let audit = AuditRow {
            request_id: id,
            from: Some(from),
            to,
            actor_session_id: actor,
            at,
            note,
        };

        self.db
            .query(
                "BEGIN TRANSACTION; \
                 UPDATE request SET status = $status, data = $data \
                 WHERE request_id = $rid; \
                 CREATE audit CONTENT $audit; \
                 COMMIT TRANSACTION;",
            )
            .bind(("status", to.as_str()))
            .bind(("data", SerdeWrapper(request.clone())))
            .bind(("rid", id.0.to_string()))
            .bind((
                "audit",
                SerdeWrapper(AuditRowRecord::new(&audit, self.next_seq())),
            ))
            .await?
            .check()?;

        debug!(request = %id, %from, %to, "request transitioned");
        Ok(request)
    }

    /// Attach a rollback record to a request without changing its status.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for an unknown request.
    pub async fn set_request_rollback(
        &self,
        id: RequestId,
        rollback: slb_core::RollbackRecord,
    ) -> StoreResult<Request> {
        let _guard = self.writer.lock().await;
        let mut request = self
            .get_request(id)
            .await?
            .ok_or_else(|| not_found("request", id.to_string()))?;
        request.rollback = Some(rollback);
        self.db
            .query("UPDATE request SET data = $data WHERE request_id = $rid")
            .bind(("data", SerdeWrapper(request.clone())))
            .bind(("rid", id.0.to_string()))
            .await?
            .check()?;
        Ok(request)
    }

    /// Ranked full-text search over command text and justification reason.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn search_requests(
        &self,
        query: &str,
        limit: usize,
    ) -> StoreResult<Vec<ScoredRequest>> {
        #[derive(serde::Deserialize)]
        struct ScoredRow {
            data: Request,
            #[serde(default)]
            score: Option<f64>,
        }

        let mut hits: std::collections::HashMap<RequestId, ScoredRequest> =
            std::collections::HashMap::new();

        for column_query in [
            "SELECT data, search::score(0) AS score FROM request WHERE command_raw @0@ $query",
            "SELECT data, search::score(0) AS score FROM request WHERE reason @0@ $query",
        ] {
            let mut res = self
                .db
                .query(column_query)
                .bind(("query", query.to_string()))
                .await?;
            let rows: Vec<SerdeWrapper<ScoredRow>> = res.take(0)?;
            for row in rows.into_iter().map(|row| row.0) {
                let score = row.score.unwrap_or(0.0);
                hits.entry(row.data.id)
                    .and_modify(|hit| hit.score += score)
                    .or_insert(ScoredRequest {
                        request: row.data,
                        score,
                    });
            }
        }

        let mut results: Vec<ScoredRequest> = hits.into_values().collect();
        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.request.created_at.cmp(&b.request.created_at))
        });
        results.truncate(limit);
        Ok(results)
    }

    // -- Reviews ----------------------------------------------------------

    /// Persist a review.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateReview`] when this reviewer already
    /// reviewed this request (also backed by a unique index).
    pub async fn create_review(&self, review: &Review) -> StoreResult<()> {
        let _guard = self.writer.lock().await;

        let existing = self.list_reviews(review.request_id).await?;
        if existing
            .iter()
            .any(|r| r.reviewer_session_id == review.reviewer_session_id)
        {
            return Err(StoreError::DuplicateReview {
                request: review.request_id.to_string(),
                reviewer: review.reviewer_session_id.to_string(),
            });
        }

        self.db
            .query("CREATE review CONTENT $row")
            .bind(("row", SerdeWrapper(ReviewRow::new(review))))
            .await?
            .check()?;
        Ok(())
    }

    /// List reviews for a request, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_reviews(&self, request_id: RequestId) -> StoreResult<Vec<Review>> {
        let mut res = self
            .db
            .query(
                "SELECT data, created_ms FROM review WHERE request_id = $rid \
                 ORDER BY created_ms ASC",
            )
            .bind(("rid", request_id.0.to_string()))
            .await?;
        let rows: Vec<SerdeWrapper<DataRow<Review>>> = res.take(0)?;
        Ok(rows.into_iter().map(|row| row.0.data).collect())
    }

    // -- Outcomes ---------------------------------------------------------

    /// Record a post-execution outcome. One per request.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::OutcomeExists`] for a second outcome.
    pub async fn record_outcome(&self, outcome: &Outcome, project: &str) -> StoreResult<()> {
        let _guard = self.writer.lock().await;

        if self.get_outcome(outcome.request_id).await?.is_some() {
            return Err(StoreError::OutcomeExists {
                request: outcome.request_id.to_string(),
            });
        }

        self.db
            .query("CREATE outcome CONTENT $row")
            .bind(("row", SerdeWrapper(OutcomeRow::new(outcome, project))))
            .await?
            .check()?;
        Ok(())
    }

    /// Fetch the outcome for a request, when one was recorded.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get_outcome(&self, request_id: RequestId) -> StoreResult<Option<Outcome>> {
        let mut res = self
            .db
            .query("SELECT data FROM outcome WHERE request_id = $rid")
            .bind(("rid", request_id.0.to_string()))
            .await?;
        let rows: Vec<SerdeWrapper<DataRow<Outcome>>> = res.take(0)?;
        Ok(rows.into_iter().next().map(|row| row.0.data))
    }

    /// List outcomes, newest first, optionally scoped to a project.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_outcomes(&self, project: Option<&str>) -> StoreResult<Vec<Outcome>> {
        let query = if project.is_some() {
            "SELECT data, recorded_ms FROM outcome WHERE project_path = $project \
             ORDER BY recorded_ms DESC"
        } else {
            "SELECT data, recorded_ms FROM outcome ORDER BY recorded_ms DESC"
        };
        let mut q = self.db.query(query);
        if let Some(project) = project {
            q = q.bind(("project", project.to_string()));
        }
        let mut res = q.await?;
        let rows: Vec<DataRow<Outcome>> = res.take(0)?;
        Ok(rows.into_iter().map(|row| row.data).collect())
    }

    // -- Audit ------------------------------------------------------------

    /// The transition history of a request, in order.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn audit_trail(&self, request_id: RequestId) -> StoreResult<Vec<AuditRow>> {
        let mut res = self
            .db
            .query(
                "SELECT data, at_us, seq FROM audit WHERE request_id = $rid \
                 ORDER BY at_us ASC, seq ASC",
            )
            .bind(("rid", request_id.0.to_string()))
            .await?;
        let rows: Vec<DataRow<AuditRow>> = res.take(0)?;
        Ok(rows.into_iter().map(|row| row.data).collect())
    }

    // -- Removal requests -------------------------------------------------

    /// Persist a pattern removal request.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn create_removal_request(&self, removal: &RemovalRequest) -> StoreResult<()> {
        let _guard = self.writer.lock().await;
        self.db
            .query("CREATE removal_request CONTENT $row")
            .bind(("row", RemovalRow::new(removal)))
            .await?
            .check()?;
        Ok(())
    }

    /// List pattern removal requests, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_removal_requests(&self) -> StoreResult<Vec<RemovalRequest>> {
        let mut res = self
            .db
            .query("SELECT data, created_ms FROM removal_request ORDER BY created_ms ASC")
            .await?;
        let rows: Vec<DataRow<RemovalRequest>> = res.take(0)?;
        Ok(rows.into_iter().map(|row| row.data).collect())
    }

    // -- Aggregates -------------------------------------------------------

    /// Number of pending requests across all projects.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn count_pending(&self) -> StoreResult<usize> {
        Ok(self.list_pending(None).await?.len())
    }

    /// Number of distinct projects with an active session.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn count_active_projects(&self) -> StoreResult<usize> {
        let sessions = self.list_sessions(None, false).await?;
        let projects: std::collections::HashSet<&str> = sessions
            .iter()
            .map(|session| session.project_path.as_str())
            .collect();
        Ok(projects.len())
    }

    fn next_seq(&self) -> i64 {
        self.audit_seq.fetch_add(1, Ordering::Relaxed)
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").finish_non_exhaustive()
    }
}

fn not_found(entity: &'static str, id: String) -> StoreError {
    StoreError::NotFound { entity, id }
}
