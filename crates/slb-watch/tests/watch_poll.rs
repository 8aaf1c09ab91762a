//! Polling watcher and auto-approval behavior.

use chrono::Duration as ChronoDuration;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use slb_config::SlbConfig;
use slb_core::{Justification, RequestStatus, RiskTier};
use slb_events::EventBus;
use slb_patterns::PatternEngine;
use slb_request::{CreateOutcome, CreateRequestInput, RequestEngine};
use slb_session::{NewSession, SessionManager, StartedSession};
use slb_store::Store;
use slb_watch::{AUTO_APPROVER_AGENT, AutoApprover, Watcher};

struct Fixture {
    store: Arc<Store>,
    sessions: SessionManager,
    engine: Arc<RequestEngine>,
}

async fn fixture() -> Fixture {
    let store = Arc::new(Store::open_memory().await.unwrap());
    let sessions = SessionManager::new(Arc::clone(&store));
    let engine = Arc::new(RequestEngine::new(
        Arc::clone(&store),
        Arc::new(PatternEngine::with_builtins()),
        EventBus::new(),
        SlbConfig::default(),
    ));
    Fixture {
        store,
        sessions,
        engine,
    }
}

impl Fixture {
    async fn session(&self, agent: &str, model: &str) -> StartedSession {
        self.sessions
            .start(NewSession {
                agent_name: agent.to_string(),
                program: "claude-code".to_string(),
                model: model.to_string(),
                project_path: "/work/demo".to_string(),
            })
            .await
            .unwrap()
    }

    async fn create(&self, session: &StartedSession, command: &str) -> slb_core::Request {
        let outcome = self
            .engine
            .create(CreateRequestInput {
                session_id: session.session.id,
                command: command.to_string(),
                cwd: "/work/demo".to_string(),
                shell: true,
                justification: Justification::default(),
                attachments: Vec::new(),
                redact_patterns: Vec::new(),
                dry_run: None,
                project_path: None,
            })
            .await
            .unwrap();
        match outcome {
            CreateOutcome::Created { request, .. } => request,
            CreateOutcome::Skipped { .. } => panic!("{command:?} skipped"),
        }
    }

    fn watcher(&self) -> Watcher {
        Watcher::new(
            Arc::clone(&self.store),
            Some("/work/demo".to_string()),
            Duration::from_millis(50),
        )
    }

    fn auto_approver(&self) -> AutoApprover {
        AutoApprover::new(
            Arc::clone(&self.engine),
            self.sessions.clone(),
            "/work/demo",
            ChronoDuration::zero(),
        )
    }
}

fn drain(rx: &mut mpsc::Receiver<Value>) -> Vec<Value> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn poll_emits_pending_then_status_change() {
    let f = fixture().await;
    let requestor = f.session("alice", "model-a").await;
    let request = f.create(&requestor, "rm -rf ./build").await;

    let watcher = f.watcher();
    let (tx, mut rx) = mpsc::channel(64);
    let mut seen = HashMap::new();

    // First pass: the new pending request is announced once.
    watcher.poll_once(&tx, &mut seen).await.unwrap();
    let events = drain(&mut rx);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["event"], "request_pending");
    assert_eq!(events[0]["request_id"], request.id.0.to_string());

    // Second pass with no change stays silent.
    watcher.poll_once(&tx, &mut seen).await.unwrap();
    assert!(drain(&mut rx).is_empty());

    // Approve through the store door; the request leaves the pending list
    // and the watcher fetches it individually.
    f.store
        .transition_request(
            request.id,
            RequestStatus::Pending,
            RequestStatus::Approved,
            None,
            None,
            |_| {},
        )
        .await
        .unwrap();

    watcher.poll_once(&tx, &mut seen).await.unwrap();
    let events = drain(&mut rx);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["event"], "request_approved");

    // Approved is not terminal; it stays tracked until it is.
    assert!(seen.contains_key(&request.id));

    f.store
        .transition_request(
            request.id,
            RequestStatus::Approved,
            RequestStatus::TimedOut,
            None,
            None,
            |_| {},
        )
        .await
        .unwrap();
    watcher.poll_once(&tx, &mut seen).await.unwrap();
    let events = drain(&mut rx);
    assert_eq!(events.len(), 1);
    // Post-execution terminals coarsen to request_executed.
    assert_eq!(events[0]["event"], "request_executed");
    assert!(!seen.contains_key(&request.id));
}

#[tokio::test]
async fn poll_scopes_to_project() {
    let f = fixture().await;
    let requestor = f.session("alice", "model-a").await;
    f.create(&requestor, "rm -rf ./build").await;

    let elsewhere = Watcher::new(
        Arc::clone(&f.store),
        Some("/work/elsewhere".to_string()),
        Duration::from_millis(50),
    );
    let (tx, mut rx) = mpsc::channel(64);
    let mut seen = HashMap::new();
    elsewhere.poll_once(&tx, &mut seen).await.unwrap();
    assert!(drain(&mut rx).is_empty());
}

// Spec scenario 5: the watcher auto-approves a CAUTION request via a
// signed review from the auto-approver pseudo-session.
#[tokio::test]
async fn auto_approves_caution_only() {
    let f = fixture().await;
    let requestor = f.session("alice", "model-a").await;

    let caution = f.create(&requestor, "git push origin main").await;
    assert_eq!(caution.risk_tier, RiskTier::Caution);
    let dangerous = f.create(&requestor, "rm -rf ./build").await;
    assert_eq!(dangerous.risk_tier, RiskTier::Dangerous);

    let watcher = f.watcher().with_auto_approval(f.auto_approver());
    let (tx, mut rx) = mpsc::channel(64);
    let mut seen = HashMap::new();
    watcher.poll_once(&tx, &mut seen).await.unwrap();
    drain(&mut rx);

    let caution_after = f.store.get_request(caution.id).await.unwrap().unwrap();
    assert_eq!(caution_after.status, RequestStatus::Approved);

    // The approval is a real signed review from the pseudo-session.
    let reviews = f.store.list_reviews(caution.id).await.unwrap();
    assert_eq!(reviews.len(), 1);
    assert_eq!(reviews[0].reviewer_agent, AUTO_APPROVER_AGENT);

    // The dangerous request is untouched.
    let dangerous_after = f.store.get_request(dangerous.id).await.unwrap().unwrap();
    assert_eq!(dangerous_after.status, RequestStatus::Pending);
    assert!(f.store.list_reviews(dangerous.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn auto_approval_respects_grace_period() {
    let f = fixture().await;
    let requestor = f.session("alice", "model-a").await;
    let caution = f.create(&requestor, "git push origin main").await;

    let patient = AutoApprover::new(
        Arc::clone(&f.engine),
        f.sessions.clone(),
        "/work/demo",
        ChronoDuration::hours(1),
    );
    let approved = patient.maybe_approve(&caution).await.unwrap();
    assert!(!approved);
    assert_eq!(
        f.store.get_request(caution.id).await.unwrap().unwrap().status,
        RequestStatus::Pending
    );
}

#[tokio::test]
async fn auto_approver_never_touches_non_pending() {
    let f = fixture().await;
    let requestor = f.session("alice", "model-a").await;
    let caution = f.create(&requestor, "git push origin main").await;

    // Cancel it first.
    f.engine
        .cancel(caution.id, requestor.session.id)
        .await
        .unwrap();
    let cancelled = f.store.get_request(caution.id).await.unwrap().unwrap();

    let auto = f.auto_approver();
    let approved = auto.maybe_approve(&cancelled).await.unwrap();
    assert!(!approved);
}
