//! Integration suite for the embedded store.

use chrono::Duration;
use slb_core::{
    AuditRow, CommandSpec, Justification, Outcome, Rating, Request, RequestId, RequestStatus,
    Review, ReviewDecision, ReviewResponses, RiskTier, Session, SessionId, Timestamp,
};
use slb_crypto::{SessionKey, sign_review};
use slb_store::{Store, StoreError};

fn session(agent: &str, project: &str) -> Session {
    let now = Timestamp::now();
    Session {
        id: SessionId::new(),
        agent_name: agent.to_string(),
        program: "claude-code".to_string(),
        model: "model-a".to_string(),
        project_path: project.to_string(),
        started_at: now,
        last_active_at: now,
        ended_at: None,
    }
}

fn request(requestor: &Session, raw: &str, reason: &str) -> Request {
    let now = Timestamp::now();
    Request {
        id: RequestId::new(),
        project_path: requestor.project_path.clone(),
        command: CommandSpec::build(raw, &requestor.project_path, true, &[]).unwrap(),
        risk_tier: RiskTier::Dangerous,
        status: RequestStatus::Pending,
        min_approvals: 1,
        require_different_model: false,
        requestor_session_id: requestor.id,
        requestor_agent: requestor.agent_name.clone(),
        requestor_model: requestor.model.clone(),
        justification: Justification {
            reason: reason.to_string(),
            ..Justification::default()
        },
        attachments: Vec::new(),
        dry_run: None,
        created_at: now,
        expires_at: Some(now.plus(Duration::minutes(30))),
        approval_expires_at: None,
        resolved_at: None,
        execution: None,
        rollback: None,
    }
}

fn review(req: &Request, reviewer: &Session, key: &SessionKey, decision: ReviewDecision) -> Review {
    let ts = Timestamp::now();
    Review {
        id: slb_core::ReviewId::new(),
        request_id: req.id,
        reviewer_session_id: reviewer.id,
        reviewer_agent: reviewer.agent_name.clone(),
        reviewer_model: reviewer.model.clone(),
        decision,
        signature: sign_review(key, &req.id.0.to_string(), decision.as_str(), &ts.to_rfc3339()),
        signature_timestamp: ts,
        responses: ReviewResponses::default(),
        comments: None,
        created_at: ts,
    }
}

#[tokio::test]
async fn session_uniqueness_and_lifecycle() {
    let store = Store::open_memory().await.unwrap();
    let s1 = session("alice", "/work/demo");
    let key = SessionKey::generate();

    store.create_session(&s1, &key.to_hex()).await.unwrap();

    // Second active session for the same (agent, project) is refused.
    let dup = session("alice", "/work/demo");
    let err = store.create_session(&dup, &key.to_hex()).await.unwrap_err();
    assert!(matches!(err, StoreError::ActiveSessionExists { .. }));

    // Same agent, different project is fine.
    let other = session("alice", "/work/other");
    store.create_session(&other, &key.to_hex()).await.unwrap();

    // End, then a fresh session may start.
    store.end_session(s1.id, Timestamp::now()).await.unwrap();
    let fresh = session("alice", "/work/demo");
    store.create_session(&fresh, &key.to_hex()).await.unwrap();

    let active = store.list_sessions(Some("/work/demo"), false).await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, fresh.id);

    let all = store.list_sessions(Some("/work/demo"), true).await.unwrap();
    assert_eq!(all.len(), 2);
}

#[tokio::test]
async fn session_key_roundtrip() {
    let store = Store::open_memory().await.unwrap();
    let s = session("alice", "/work/demo");
    let key = SessionKey::generate();
    store.create_session(&s, &key.to_hex()).await.unwrap();

    let stored = store.get_session_key(s.id).await.unwrap().unwrap();
    assert_eq!(stored, key.to_hex());
    assert!(store.get_session_key(SessionId::new()).await.unwrap().is_none());
}

#[tokio::test]
async fn touch_session_advances_last_active() {
    let store = Store::open_memory().await.unwrap();
    let s = session("alice", "/work/demo");
    store
        .create_session(&s, &SessionKey::generate().to_hex())
        .await
        .unwrap();

    let later = Timestamp::now().plus(Duration::minutes(5));
    let touched = store.touch_session(s.id, later).await.unwrap();
    assert_eq!(touched.last_active_at, later);

    let fetched = store.get_session(s.id).await.unwrap().unwrap();
    assert_eq!(fetched.last_active_at, later);
}

#[tokio::test]
async fn request_create_fetch_and_pending_listing() {
    let store = Store::open_memory().await.unwrap();
    let s = session("alice", "/work/demo");
    store
        .create_session(&s, &SessionKey::generate().to_hex())
        .await
        .unwrap();

    let r1 = request(&s, "rm -rf ./build", "clean the build dir");
    let r2 = request(&s, "git reset --hard", "drop local edits");
    store.create_request(&r1).await.unwrap();
    store.create_request(&r2).await.unwrap();

    let fetched = store.get_request(r1.id).await.unwrap().unwrap();
    assert_eq!(fetched, r1);

    let pending = store.list_pending(Some("/work/demo")).await.unwrap();
    assert_eq!(pending.len(), 2);

    let none = store.list_pending(Some("/work/elsewhere")).await.unwrap();
    assert!(none.is_empty());

    let pool = store
        .list_pending_in(&["/work/demo".to_string(), "/x".to_string()])
        .await
        .unwrap();
    assert_eq!(pool.len(), 2);
}

#[tokio::test]
async fn transition_cas_and_audit_trail() {
    let store = Store::open_memory().await.unwrap();
    let s = session("alice", "/work/demo");
    store
        .create_session(&s, &SessionKey::generate().to_hex())
        .await
        .unwrap();
    let r = request(&s, "rm -rf ./build", "clean");
    store.create_request(&r).await.unwrap();

    let approved = store
        .transition_request(
            r.id,
            RequestStatus::Pending,
            RequestStatus::Approved,
            Some(s.id),
            None,
            |req| {
                req.approval_expires_at = Some(Timestamp::now().plus(Duration::minutes(10)));
            },
        )
        .await
        .unwrap();
    assert_eq!(approved.status, RequestStatus::Approved);
    assert!(approved.approval_expires_at.is_some());
    assert!(approved.resolved_at.is_some());

    // Losing racer: the request is no longer pending.
    let err = store
        .transition_request(
            r.id,
            RequestStatus::Pending,
            RequestStatus::Rejected,
            None,
            None,
            |_| {},
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::RequestNotPending { .. }));

    // Illegal transition is refused even with the right `from`.
    let err = store
        .transition_request(
            r.id,
            RequestStatus::Approved,
            RequestStatus::Rejected,
            None,
            None,
            |_| {},
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::IllegalTransition { .. }));

    let trail: Vec<AuditRow> = store.audit_trail(r.id).await.unwrap();
    assert_eq!(trail.len(), 2);
    assert_eq!(trail[0].from, None);
    assert_eq!(trail[0].to, RequestStatus::Pending);
    assert_eq!(trail[1].from, Some(RequestStatus::Pending));
    assert_eq!(trail[1].to, RequestStatus::Approved);
}

#[tokio::test]
async fn transition_unknown_request() {
    let store = Store::open_memory().await.unwrap();
    let err = store
        .transition_request(
            RequestId::new(),
            RequestStatus::Pending,
            RequestStatus::Approved,
            None,
            None,
            |_| {},
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound { entity: "request", .. }));
}

#[tokio::test]
async fn review_duplicate_pair_refused() {
    let store = Store::open_memory().await.unwrap();
    let requestor = session("alice", "/work/demo");
    let reviewer = session("bob", "/work/demo2");
    let key = SessionKey::generate();
    store
        .create_session(&requestor, &SessionKey::generate().to_hex())
        .await
        .unwrap();
    store.create_session(&reviewer, &key.to_hex()).await.unwrap();

    let r = request(&requestor, "rm -rf ./build", "clean");
    store.create_request(&r).await.unwrap();

    let v1 = review(&r, &reviewer, &key, ReviewDecision::Approve);
    store.create_review(&v1).await.unwrap();

    let v2 = review(&r, &reviewer, &key, ReviewDecision::Reject);
    let err = store.create_review(&v2).await.unwrap_err();
    assert!(matches!(err, StoreError::DuplicateReview { .. }));

    let reviews = store.list_reviews(r.id).await.unwrap();
    assert_eq!(reviews.len(), 1);
    assert_eq!(reviews[0].decision, ReviewDecision::Approve);
}

#[tokio::test]
async fn outcome_unique_per_request() {
    let store = Store::open_memory().await.unwrap();
    let s = session("alice", "/work/demo");
    store
        .create_session(&s, &SessionKey::generate().to_hex())
        .await
        .unwrap();
    let r = request(&s, "rm -rf ./build", "clean");
    store.create_request(&r).await.unwrap();

    let outcome = Outcome {
        request_id: r.id,
        caused_problems: false,
        problem_description: None,
        rating: Some(Rating::new(5).unwrap()),
        notes: None,
        recorded_at: Timestamp::now(),
    };
    store.record_outcome(&outcome, "/work/demo").await.unwrap();

    let err = store.record_outcome(&outcome, "/work/demo").await.unwrap_err();
    assert!(matches!(err, StoreError::OutcomeExists { .. }));

    let listed = store.list_outcomes(Some("/work/demo")).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0], outcome);
}

#[tokio::test]
async fn full_text_search_ranks_matches() {
    let store = Store::open_memory().await.unwrap();
    let s = session("alice", "/work/demo");
    store
        .create_session(&s, &SessionKey::generate().to_hex())
        .await
        .unwrap();

    let build = request(&s, "rm -rf ./build", "clean the build directory");
    let db = request(&s, "psql -c 'drop table users'", "remove stale table");
    store.create_request(&build).await.unwrap();
    store.create_request(&db).await.unwrap();

    let hits = store.search_requests("build", 10).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].request.id, build.id);
    assert!(hits[0].score > 0.0);

    let hits = store.search_requests("table", 10).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].request.id, db.id);

    let hits = store.search_requests("nonexistentterm", 10).await.unwrap();
    assert!(hits.is_empty());
}

#[tokio::test]
async fn find_approved_by_hash() {
    let store = Store::open_memory().await.unwrap();
    let s = session("alice", "/work/demo");
    store
        .create_session(&s, &SessionKey::generate().to_hex())
        .await
        .unwrap();

    let r = request(&s, "rm -rf ./build", "clean");
    store.create_request(&r).await.unwrap();
    let hash = r.command.hash.to_hex();

    // Pending requests do not authorize execution.
    assert!(
        store
            .find_approved_by_hash("/work/demo", &hash)
            .await
            .unwrap()
            .is_none()
    );

    store
        .transition_request(
            r.id,
            RequestStatus::Pending,
            RequestStatus::Approved,
            None,
            None,
            |_| {},
        )
        .await
        .unwrap();

    let found = store
        .find_approved_by_hash("/work/demo", &hash)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, r.id);

    // Wrong project sees nothing.
    assert!(
        store
            .find_approved_by_hash("/work/other", &hash)
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn removal_requests_persist() {
    let store = Store::open_memory().await.unwrap();
    let engine = slb_patterns::PatternEngine::with_builtins();
    let pattern = engine.patterns().first().cloned().unwrap();
    let removal = engine
        .request_removal(&pattern.pattern, "too broad", &slb_core::Actor::agent("bot"))
        .unwrap();

    store.create_removal_request(&removal).await.unwrap();
    let listed = store.list_removal_requests().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0], removal);
}

#[tokio::test]
async fn counts_for_daemon_status() {
    let store = Store::open_memory().await.unwrap();
    let s1 = session("alice", "/work/a");
    let s2 = session("bob", "/work/b");
    let s3 = session("carol", "/work/a");
    for s in [&s1, &s2, &s3] {
        store
            .create_session(s, &SessionKey::generate().to_hex())
            .await
            .unwrap();
    }
    assert_eq!(store.count_active_projects().await.unwrap(), 2);

    store.create_request(&request(&s1, "rm -rf ./x", "x")).await.unwrap();
    store.create_request(&request(&s2, "rm -rf ./y", "y")).await.unwrap();
    assert_eq!(store.count_pending().await.unwrap(), 2);
}
