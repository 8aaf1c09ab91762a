//! The daemon server: accept loop, connection handlers, method dispatch.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use slb_config::SlbConfig;
use slb_core::{
    Attachment, CommandSpec, DryRun, Justification, RequestId, ReviewDecision, ReviewResponses,
    SessionId, Timestamp,
};
use slb_crypto::ReviewSignature;
use slb_events::EventFilter;
use slb_patterns::PatternEngine;
use slb_request::{CreateOutcome, CreateRequestInput, NewReview, RequestEngine, RequestError};
use slb_session::SessionManager;
use slb_store::{Store, StoreError};

use crate::error::DaemonResult;
use crate::rpc::{self, RpcError, RpcNotification, RpcRequest, RpcResponse};

/// Shared state behind every connection handler.
pub struct DaemonContext {
    /// The store.
    pub store: Arc<Store>,
    /// The pattern engine.
    pub patterns: Arc<PatternEngine>,
    /// The request engine.
    pub engine: Arc<RequestEngine>,
    /// The session manager.
    pub sessions: SessionManager,
    /// Daemon configuration.
    pub config: SlbConfig,
    /// The project this daemon serves.
    pub project_path: String,
    /// When the daemon started.
    pub started_at: Timestamp,
}

/// The daemon's answer to a hook query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookDecision {
    /// `allow`, `ask`, or `block`.
    pub action: String,
    /// Explanation for the editor to surface.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// The classified tier.
    pub tier: String,
    /// Whether a reviewer decision is needed.
    pub needs_approval: bool,
}

/// The daemon: accept loop plus per-connection handlers.
pub struct Daemon {
    ctx: Arc<DaemonContext>,
}

impl Daemon {
    /// Create a daemon over its context.
    #[must_use]
    pub fn new(ctx: Arc<DaemonContext>) -> Self {
        Self { ctx }
    }

    /// Serve until `shutdown` fires, then drain within the configured
    /// grace period.
    ///
    /// # Errors
    ///
    /// Returns an error only for accept-loop failures; per-connection
    /// errors are logged and contained.
    pub async fn run(self, listener: UnixListener, shutdown: CancellationToken) -> DaemonResult<()> {
        let permits = Arc::new(Semaphore::new(self.ctx.config.daemon.max_connections));
        let tracker = TaskTracker::new();

        info!(
            project = %self.ctx.project_path,
            max_connections = self.ctx.config.daemon.max_connections,
            "daemon serving"
        );

        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                accepted = listener.accept() => {
                    let (stream, _addr) = accepted?;
                    match Arc::clone(&permits).try_acquire_owned() {
                        Ok(permit) => {
                            let ctx = Arc::clone(&self.ctx);
                            let cancel = shutdown.child_token();
                            tracker.spawn(async move {
                                let _permit = permit;
                                if let Err(e) = handle_connection(stream, ctx, cancel).await {
                                    debug!(error = %e, "connection ended with error");
                                }
                            });
                        }
                        Err(_) => {
                            tracker.spawn(async move {
                                let response = RpcResponse::err(
                                    Value::Null,
                                    rpc::CONNECTION_LIMIT,
                                    "connection limit reached, try again shortly",
                                );
                                let mut stream = stream;
                                let _ = write_json_line(&mut stream, &response).await;
                            });
                        }
                    }
                }
            }
        }

        // Drain in-flight connections, bounded.
        tracker.close();
        let grace = Duration::from_millis(self.ctx.config.daemon.shutdown_grace_ms);
        if tokio::time::timeout(grace, tracker.wait()).await.is_err() {
            warn!("shutdown grace period elapsed with connections still open");
        }
        info!("daemon stopped");
        Ok(())
    }
}

async fn write_json_line<W, T>(writer: &mut W, value: &T) -> std::io::Result<()>
where
    W: tokio::io::AsyncWrite + Unpin,
    T: Serialize,
{
    let mut line = serde_json::to_vec(value)?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    writer.flush().await
}

async fn handle_connection(
    stream: UnixStream,
    ctx: Arc<DaemonContext>,
    cancel: CancellationToken,
) -> std::io::Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    loop {
        let line = tokio::select! {
            () = cancel.cancelled() => return Ok(()),
            line = lines.next_line() => line?,
        };
        let Some(line) = line else {
            return Ok(()); // client closed
        };
        if line.trim().is_empty() {
            continue;
        }

        let request: RpcRequest = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(e) => {
                let response =
                    RpcResponse::err(Value::Null, rpc::PARSE_ERROR, format!("parse error: {e}"));
                write_json_line(&mut write_half, &response).await?;
                continue;
            }
        };

        let id = request.id.clone().unwrap_or(Value::Null);

        if request.method == "subscribe" {
            let filter: EventFilter =
                serde_json::from_value(request.params.clone()).unwrap_or_default();
            write_json_line(
                &mut write_half,
                &RpcResponse::ok(id, json!({ "subscribed": true })),
            )
            .await?;
            return stream_events(&ctx, &cancel, &mut lines, &mut write_half, &filter).await;
        }

        let response = match dispatch(&ctx, &request).await {
            Ok(result) => RpcResponse::ok(id, result),
            Err(error) => RpcResponse {
                jsonrpc: "2.0".to_string(),
                id,
                result: None,
                error: Some(error),
            },
        };
        write_json_line(&mut write_half, &response).await?;
    }
}

/// Forward bus events matching `filter` until the client closes, the
/// daemon shuts down, or the subscriber falls behind.
async fn stream_events<R, W>(
    ctx: &Arc<DaemonContext>,
    cancel: &CancellationToken,
    lines: &mut tokio::io::Lines<BufReader<R>>,
    writer: &mut W,
    filter: &EventFilter,
) -> std::io::Result<()>
where
    R: tokio::io::AsyncRead + Unpin,
    W: tokio::io::AsyncWrite + Unpin,
{
    let mut receiver = ctx.engine.bus().subscribe();
    loop {
        tokio::select! {
            () = cancel.cancelled() => return Ok(()),
            line = lines.next_line() => {
                if line?.is_none() {
                    return Ok(()); // client closed
                }
                // Requests on a subscribed connection are ignored.
            }
            event = receiver.recv_strict() => match event {
                Ok(Some(event)) => {
                    if filter.matches(&event) {
                        let notification =
                            RpcNotification::event(serde_json::to_value(&*event)?);
                        write_json_line(writer, &notification).await?;
                    }
                }
                Ok(None) => return Ok(()), // bus gone (shutdown)
                Err(lagged) => {
                    warn!(dropped = lagged.0, "dropping slow subscriber");
                    let response = RpcResponse::err(
                        Value::Null,
                        rpc::SLOW_CONSUMER,
                        format!("slow_consumer: {} events dropped", lagged.0),
                    );
                    let _ = write_json_line(writer, &response).await;
                    return Ok(());
                }
            }
        }
    }
}

// -- Method dispatch ------------------------------------------------------

async fn dispatch(ctx: &Arc<DaemonContext>, request: &RpcRequest) -> Result<Value, RpcError> {
    match request.method.as_str() {
        "hook_query" => hook_query(ctx, &request.params).await,
        "list_pending" => list_pending(ctx, &request.params).await,
        "get_request" => get_request(ctx, &request.params).await,
        "create_request" => create_request(ctx, &request.params).await,
        "submit_review" => submit_review(ctx, &request.params).await,
        "cancel" => cancel(ctx, &request.params).await,
        "daemon_status" => daemon_status(ctx).await,
        other => Err(RpcError {
            code: rpc::METHOD_NOT_FOUND,
            message: format!("unknown method: {other}"),
            data: None,
        }),
    }
}

fn invalid_params(e: impl std::fmt::Display) -> RpcError {
    RpcError {
        code: rpc::INVALID_PARAMS,
        message: format!("invalid params: {e}"),
        data: None,
    }
}

fn internal(e: impl std::fmt::Display) -> RpcError {
    RpcError {
        code: rpc::INTERNAL_ERROR,
        message: e.to_string(),
        data: None,
    }
}

fn map_store_error(e: &StoreError) -> RpcError {
    let code = match e {
        StoreError::NotFound { .. } => rpc::NOT_FOUND,
        StoreError::ActiveSessionExists { .. }
        | StoreError::DuplicateReview { .. }
        | StoreError::RequestNotPending { .. }
        | StoreError::IllegalTransition { .. }
        | StoreError::OutcomeExists { .. } => rpc::CONFLICT,
        StoreError::Db(_) => rpc::INTERNAL_ERROR,
    };
    RpcError {
        code,
        message: e.to_string(),
        data: None,
    }
}

fn map_request_error(e: &RequestError) -> RpcError {
    let code = match e {
        RequestError::SessionNotActive(_)
        | RequestError::SelfReview
        | RequestError::SignatureMismatch
        | RequestError::CancelRefused { .. } => rpc::UNAUTHORIZED,
        RequestError::ProjectMismatch { .. } | RequestError::InvalidCommand(_) => {
            rpc::INVALID_PARAMS
        }
        RequestError::DecisionWindowExpired(_)
        | RequestError::ApprovalWindowExpired(_)
        | RequestError::WaitTimeout(_) => rpc::EXPIRED,
        RequestError::NotExecuted { .. } => rpc::CONFLICT,
        RequestError::Store(store) => return map_store_error(store),
        RequestError::Io(_) => rpc::INTERNAL_ERROR,
    };
    RpcError {
        code,
        message: e.to_string(),
        data: None,
    }
}

// -- Handlers -------------------------------------------------------------

#[derive(Deserialize)]
struct HookQueryParams {
    command: String,
    #[serde(default)]
    cwd: Option<String>,
    // Present in the hook payload; the decision does not depend on it.
    #[serde(default)]
    #[allow(dead_code)]
    session_id: Option<String>,
}

async fn hook_query(ctx: &Arc<DaemonContext>, params: &Value) -> Result<Value, RpcError> {
    let params: HookQueryParams =
        serde_json::from_value(params.clone()).map_err(invalid_params)?;

    let classification = ctx.patterns.classify(&params.command);
    let tier = classification.tier.as_str().to_string();

    if classification.is_safe {
        return to_value(&HookDecision {
            action: "allow".to_string(),
            message: None,
            tier,
            needs_approval: false,
        });
    }

    // An already-approved request for this exact command may run.
    let cwd = params.cwd.unwrap_or_else(|| ctx.project_path.clone());
    if let Ok(spec) = CommandSpec::build(&params.command, &cwd, true, &[]) {
        if let Some(approved) = ctx
            .store
            .find_approved_by_hash(&ctx.project_path, &spec.hash.to_hex())
            .await
            .map_err(|e| map_store_error(&e))?
        {
            return to_value(&HookDecision {
                action: "allow".to_string(),
                message: Some(format!("approved by request {}", approved.id)),
                tier,
                needs_approval: false,
            });
        }
    }

    let decision = if classification.tier == slb_core::RiskTier::Caution {
        HookDecision {
            action: "ask".to_string(),
            message: Some("caution tier: auto-approves after the grace period".to_string()),
            tier,
            needs_approval: true,
        }
    } else {
        HookDecision {
            action: "block".to_string(),
            message: Some(format!(
                "{} tier requires {} approval(s); create an approval request first",
                classification.tier, classification.min_approvals
            )),
            tier,
            needs_approval: true,
        }
    };
    to_value(&decision)
}

#[derive(Deserialize)]
struct ListPendingParams {
    #[serde(default)]
    project: Option<String>,
    #[serde(default)]
    all_projects: bool,
}

async fn list_pending(ctx: &Arc<DaemonContext>, params: &Value) -> Result<Value, RpcError> {
    let params: ListPendingParams =
        serde_json::from_value(params.clone()).map_err(invalid_params)?;
    let project = if params.all_projects {
        None
    } else {
        Some(params.project.unwrap_or_else(|| ctx.project_path.clone()))
    };
    let pending = ctx
        .store
        .list_pending(project.as_deref())
        .await
        .map_err(|e| map_store_error(&e))?;
    to_value(&pending)
}

#[derive(Deserialize)]
struct GetRequestParams {
    id: RequestId,
}

async fn get_request(ctx: &Arc<DaemonContext>, params: &Value) -> Result<Value, RpcError> {
    let params: GetRequestParams =
        serde_json::from_value(params.clone()).map_err(invalid_params)?;
    let request = ctx
        .engine
        .get(params.id)
        .await
        .map_err(|e| map_request_error(&e))?;
    to_value(&request)
}

#[derive(Deserialize)]
struct CreateRequestParams {
    session_id: SessionId,
    command: String,
    #[serde(default)]
    cwd: Option<String>,
    #[serde(default = "default_shell")]
    shell: bool,
    #[serde(default)]
    justification: Justification,
    #[serde(default)]
    attachments: Vec<Attachment>,
    #[serde(default)]
    redact_patterns: Vec<String>,
    #[serde(default)]
    dry_run: Option<DryRun>,
    #[serde(default)]
    project_path: Option<String>,
}

fn default_shell() -> bool {
    true
}

async fn create_request(ctx: &Arc<DaemonContext>, params: &Value) -> Result<Value, RpcError> {
    let params: CreateRequestParams =
        serde_json::from_value(params.clone()).map_err(invalid_params)?;
    let outcome = ctx
        .engine
        .create(CreateRequestInput {
            session_id: params.session_id,
            command: params.command,
            cwd: params.cwd.unwrap_or_else(|| ctx.project_path.clone()),
            shell: params.shell,
            justification: params.justification,
            attachments: params.attachments,
            redact_patterns: params.redact_patterns,
            dry_run: params.dry_run,
            project_path: params.project_path,
        })
        .await
        .map_err(|e| map_request_error(&e))?;

    match outcome {
        CreateOutcome::Skipped { classification } => Ok(json!({
            "skipped": true,
            "reason": "safe",
            "tier": classification.tier.as_str(),
        })),
        CreateOutcome::Created { request, .. } => to_value(&request),
    }
}

#[derive(Deserialize)]
struct SubmitReviewParams {
    request_id: RequestId,
    reviewer_session_id: SessionId,
    decision: ReviewDecision,
    #[serde(default)]
    comments: Option<String>,
    #[serde(default)]
    responses: ReviewResponses,
    signature: ReviewSignature,
    signature_timestamp: Timestamp,
}

async fn submit_review(ctx: &Arc<DaemonContext>, params: &Value) -> Result<Value, RpcError> {
    let params: SubmitReviewParams =
        serde_json::from_value(params.clone()).map_err(invalid_params)?;
    let (review, request) = ctx
        .engine
        .submit_review(NewReview {
            request_id: params.request_id,
            reviewer_session_id: params.reviewer_session_id,
            decision: params.decision,
            comments: params.comments,
            responses: params.responses,
            signature: params.signature,
            signature_timestamp: params.signature_timestamp,
        })
        .await
        .map_err(|e| map_request_error(&e))?;
    Ok(json!({
        "review_id": review.id,
        "request_status": request.status,
    }))
}

#[derive(Deserialize)]
struct CancelParams {
    id: RequestId,
    session_id: SessionId,
}

async fn cancel(ctx: &Arc<DaemonContext>, params: &Value) -> Result<Value, RpcError> {
    let params: CancelParams = serde_json::from_value(params.clone()).map_err(invalid_params)?;
    let request = ctx
        .engine
        .cancel(params.id, params.session_id)
        .await
        .map_err(|e| map_request_error(&e))?;
    to_value(&request)
}

async fn daemon_status(ctx: &Arc<DaemonContext>) -> Result<Value, RpcError> {
    let pending_count = ctx
        .store
        .count_pending()
        .await
        .map_err(|e| map_store_error(&e))?;
    let project_count = ctx
        .store
        .count_active_projects()
        .await
        .map_err(|e| map_store_error(&e))?;
    let uptime_secs = Timestamp::now()
        .0
        .signed_duration_since(ctx.started_at.0)
        .num_seconds();
    Ok(json!({
        "uptime_secs": uptime_secs,
        "project_count": project_count,
        "pending_count": pending_count,
        "version": env!("CARGO_PKG_VERSION"),
        "pattern_hash": ctx.patterns.pattern_hash(),
    }))
}

fn to_value<T: Serialize>(value: &T) -> Result<Value, RpcError> {
    serde_json::to_value(value).map_err(internal)
}
