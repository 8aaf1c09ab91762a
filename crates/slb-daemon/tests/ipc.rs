//! Daemon IPC behavior over a real Unix socket.

use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio_util::sync::CancellationToken;

use slb_config::SlbConfig;
use slb_core::Timestamp;
use slb_daemon::{Daemon, DaemonClient, DaemonContext};
use slb_events::{EventBus, EventFilter};
use slb_patterns::PatternEngine;
use slb_request::RequestEngine;
use slb_session::{NewSession, SessionManager};
use slb_store::Store;

const DEADLINE: Duration = Duration::from_secs(2);

struct Fixture {
    ctx: Arc<DaemonContext>,
    socket: std::path::PathBuf,
    shutdown: CancellationToken,
    _dir: tempfile::TempDir,
}

async fn start_daemon() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("slbd.sock");

    let store = Arc::new(Store::open_memory().await.unwrap());
    let patterns = Arc::new(PatternEngine::with_builtins());
    let engine = Arc::new(RequestEngine::new(
        Arc::clone(&store),
        Arc::clone(&patterns),
        EventBus::new(),
        SlbConfig::default(),
    ));
    let ctx = Arc::new(DaemonContext {
        sessions: SessionManager::new(Arc::clone(&store)),
        store,
        patterns,
        engine,
        config: SlbConfig::default(),
        project_path: "/work/demo".to_string(),
        started_at: Timestamp::now(),
    });

    let listener = UnixListener::bind(&socket).unwrap();
    let shutdown = CancellationToken::new();
    tokio::spawn({
        let ctx = Arc::clone(&ctx);
        let shutdown = shutdown.clone();
        async move {
            Daemon::new(ctx).run(listener, shutdown).await.unwrap();
        }
    });

    Fixture {
        ctx,
        socket,
        shutdown,
        _dir: dir,
    }
}

async fn start_session(fixture: &Fixture, agent: &str, model: &str) -> slb_session::StartedSession {
    fixture
        .ctx
        .sessions
        .start(NewSession {
            agent_name: agent.to_string(),
            program: "claude-code".to_string(),
            model: model.to_string(),
            project_path: "/work/demo".to_string(),
        })
        .await
        .unwrap()
}

#[tokio::test]
async fn daemon_status_reports_counts() {
    let fixture = start_daemon().await;
    start_session(&fixture, "alice", "model-a").await;

    let mut client = DaemonClient::connect(&fixture.socket).await.unwrap();
    let status = client.daemon_status(DEADLINE).await.unwrap();

    assert_eq!(status["pending_count"], 0);
    assert_eq!(status["project_count"], 1);
    assert!(status["pattern_hash"].as_str().unwrap().len() == 64);
    assert!(status["version"].is_string());

    fixture.shutdown.cancel();
}

#[tokio::test]
async fn hook_query_allow_ask_block() {
    let fixture = start_daemon().await;
    let mut client = DaemonClient::connect(&fixture.socket).await.unwrap();

    let safe = client
        .hook_query("echo hi", None, None, DEADLINE)
        .await
        .unwrap();
    assert_eq!(safe.action, "allow");
    assert!(!safe.needs_approval);

    let caution = client
        .hook_query("git push origin main", None, None, DEADLINE)
        .await
        .unwrap();
    assert_eq!(caution.action, "ask");
    assert_eq!(caution.tier, "caution");

    let dangerous = client
        .hook_query("rm -rf ./build", None, None, DEADLINE)
        .await
        .unwrap();
    assert_eq!(dangerous.action, "block");
    assert!(dangerous.needs_approval);
    assert!(dangerous.message.unwrap().contains("approval"));

    fixture.shutdown.cancel();
}

#[tokio::test]
async fn hook_query_allows_already_approved_command() {
    let fixture = start_daemon().await;
    let requestor = start_session(&fixture, "alice", "model-a").await;

    let mut client = DaemonClient::connect(&fixture.socket).await.unwrap();
    let created = client
        .call(
            "create_request",
            json!({
                "session_id": requestor.session.id,
                "command": "rm -rf ./build",
                "cwd": "/work/demo",
                "justification": {
                    "reason": "clean",
                    "expected_effect": "build dir gone",
                    "goal": "fresh build",
                    "safety_argument": "regenerated by the next build",
                },
            }),
            DEADLINE,
        )
        .await
        .unwrap();
    let request_id = created["id"].as_str().unwrap().to_string();

    // Approve it directly through the store door.
    fixture
        .ctx
        .store
        .transition_request(
            request_id.parse().unwrap(),
            slb_core::RequestStatus::Pending,
            slb_core::RequestStatus::Approved,
            None,
            None,
            |_| {},
        )
        .await
        .unwrap();

    let decision = client
        .hook_query("rm -rf ./build", None, Some("/work/demo"), DEADLINE)
        .await
        .unwrap();
    assert_eq!(decision.action, "allow");
    assert!(decision.message.unwrap().contains("approved by request"));

    fixture.shutdown.cancel();
}

#[tokio::test]
async fn create_request_safe_skip_and_pending_listing() {
    let fixture = start_daemon().await;
    let requestor = start_session(&fixture, "alice", "model-a").await;
    let mut client = DaemonClient::connect(&fixture.socket).await.unwrap();

    let skipped = client
        .call(
            "create_request",
            json!({
                "session_id": requestor.session.id,
                "command": "echo hi",
            }),
            DEADLINE,
        )
        .await
        .unwrap();
    assert_eq!(skipped["skipped"], true);
    assert_eq!(skipped["reason"], "safe");

    let created = client
        .call(
            "create_request",
            json!({
                "session_id": requestor.session.id,
                "command": "rm -rf ./build",
            }),
            DEADLINE,
        )
        .await
        .unwrap();
    assert_eq!(created["status"], "pending");
    assert_eq!(created["risk_tier"], "dangerous");

    let pending = client
        .call("list_pending", json!({}), DEADLINE)
        .await
        .unwrap();
    assert_eq!(pending.as_array().unwrap().len(), 1);

    fixture.shutdown.cancel();
}

#[tokio::test]
async fn unknown_method_and_parse_error() {
    let fixture = start_daemon().await;
    let mut client = DaemonClient::connect(&fixture.socket).await.unwrap();

    let err = client
        .call("no_such_method", json!({}), DEADLINE)
        .await
        .unwrap_err();
    match err {
        slb_daemon::DaemonError::Rpc { code, .. } => assert_eq!(code, -32601),
        other => panic!("expected rpc error, got {other:?}"),
    }

    // Raw connection: a malformed line gets -32700 and the connection
    // stays usable.
    let stream = UnixStream::connect(&fixture.socket).await.unwrap();
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    write_half.write_all(b"this is not json\n").await.unwrap();
    let reply: Value =
        serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
    assert_eq!(reply["error"]["code"], -32700);

    write_half
        .write_all(b"{\"jsonrpc\":\"2.0\",\"id\":9,\"method\":\"daemon_status\"}\n")
        .await
        .unwrap();
    let reply: Value =
        serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
    assert_eq!(reply["id"], 9);
    assert!(reply["result"]["pending_count"].is_number());

    fixture.shutdown.cancel();
}

#[tokio::test]
async fn get_request_not_found_maps_to_error() {
    let fixture = start_daemon().await;
    let mut client = DaemonClient::connect(&fixture.socket).await.unwrap();

    let err = client
        .call(
            "get_request",
            json!({"id": uuid::Uuid::new_v4().to_string()}),
            DEADLINE,
        )
        .await
        .unwrap_err();
    match err {
        slb_daemon::DaemonError::Rpc { code, message } => {
            assert_eq!(code, -32004);
            assert!(message.contains("not found"));
        }
        other => panic!("expected rpc error, got {other:?}"),
    }

    fixture.shutdown.cancel();
}

#[tokio::test]
async fn subscribe_streams_pending_events() {
    let fixture = start_daemon().await;
    let requestor = start_session(&fixture, "alice", "model-a").await;

    let subscriber = DaemonClient::connect(&fixture.socket).await.unwrap();
    let mut stream = subscriber
        .subscribe(EventFilter::default(), DEADLINE)
        .await
        .unwrap();

    let mut client = DaemonClient::connect(&fixture.socket).await.unwrap();
    let created = client
        .call(
            "create_request",
            json!({
                "session_id": requestor.session.id,
                "command": "rm -rf ./build",
            }),
            DEADLINE,
        )
        .await
        .unwrap();

    let event = tokio::time::timeout(DEADLINE, stream.next_event())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(event["type"], "request_pending");
    assert_eq!(event["request_id"], created["id"]);

    fixture.shutdown.cancel();
}

#[tokio::test]
async fn subscribe_filter_excludes_other_projects() {
    let fixture = start_daemon().await;
    let requestor = start_session(&fixture, "alice", "model-a").await;

    let subscriber = DaemonClient::connect(&fixture.socket).await.unwrap();
    let mut stream = subscriber
        .subscribe(
            EventFilter {
                project: Some("/work/elsewhere".to_string()),
                request_id: None,
            },
            DEADLINE,
        )
        .await
        .unwrap();

    let mut client = DaemonClient::connect(&fixture.socket).await.unwrap();
    client
        .call(
            "create_request",
            json!({
                "session_id": requestor.session.id,
                "command": "rm -rf ./build",
            }),
            DEADLINE,
        )
        .await
        .unwrap();

    // The event is for /work/demo; the filtered stream stays silent.
    let silent = tokio::time::timeout(Duration::from_millis(300), stream.next_event()).await;
    assert!(silent.is_err(), "filtered subscriber saw a foreign event");

    fixture.shutdown.cancel();
}

#[tokio::test]
async fn connection_limit_rejects_excess_clients() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("slbd.sock");

    let store = Arc::new(Store::open_memory().await.unwrap());
    let patterns = Arc::new(PatternEngine::with_builtins());
    let engine = Arc::new(RequestEngine::new(
        Arc::clone(&store),
        Arc::clone(&patterns),
        EventBus::new(),
        SlbConfig::default(),
    ));
    let mut config = SlbConfig::default();
    config.daemon.max_connections = 1;
    let ctx = Arc::new(DaemonContext {
        sessions: SessionManager::new(Arc::clone(&store)),
        store,
        patterns,
        engine,
        config,
        project_path: "/work/demo".to_string(),
        started_at: Timestamp::now(),
    });

    let listener = UnixListener::bind(&socket).unwrap();
    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            Daemon::new(ctx).run(listener, shutdown).await.unwrap();
        }
    });

    // First client occupies the single slot.
    let mut first = DaemonClient::connect(&socket).await.unwrap();
    first.daemon_status(DEADLINE).await.unwrap();

    // Second client is politely refused.
    let stream = UnixStream::connect(&socket).await.unwrap();
    let (read_half, _write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();
    let reply: Value =
        serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
    assert_eq!(reply["error"]["code"], -32002);

    shutdown.cancel();
}
