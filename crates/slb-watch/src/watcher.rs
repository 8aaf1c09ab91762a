//! The watcher: subscription path, polling path, NDJSON emission.

use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use slb_core::{Request, RequestId, RequestStatus, RiskTier, Timestamp};
use slb_daemon::DaemonClient;
use slb_events::EventFilter;
use slb_store::Store;

use crate::auto::AutoApprover;
use crate::error::{WatchError, WatchResult};
use crate::evaluate::{WatchAction, evaluate, event_name_for};

/// One NDJSON line of watcher output.
#[derive(Debug, Clone, Serialize)]
pub struct WatchEvent {
    /// Event name (`request_pending`, `request_approved`, ...).
    pub event: String,
    /// The request.
    pub request_id: RequestId,
    /// Project the request belongs to.
    pub project_path: String,
    /// Current status.
    pub status: RequestStatus,
    /// Risk tier, where known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<RiskTier>,
    /// When the watcher observed it.
    pub at: Timestamp,
}

impl WatchEvent {
    fn from_request(request: &Request, event: &str) -> Self {
        Self {
            event: event.to_string(),
            request_id: request.id,
            project_path: request.project_path.clone(),
            status: request.status,
            tier: Some(request.risk_tier),
            at: Timestamp::now(),
        }
    }
}

/// Streams request events as JSON values over an mpsc channel.
pub struct Watcher {
    store: Arc<Store>,
    project: Option<String>,
    poll_interval: Duration,
    auto: Option<AutoApprover>,
}

impl Watcher {
    /// Create a watcher over a store. `project = None` watches all
    /// projects.
    #[must_use]
    pub fn new(store: Arc<Store>, project: Option<String>, poll_interval: Duration) -> Self {
        Self {
            store,
            project,
            poll_interval,
            auto: None,
        }
    }

    /// Enable CAUTION auto-approval.
    #[must_use]
    pub fn with_auto_approval(mut self, auto: AutoApprover) -> Self {
        self.auto = Some(auto);
        self
    }

    /// Run the watcher: the daemon subscription when a socket is given and
    /// reachable, the polling fallback otherwise.
    ///
    /// # Errors
    ///
    /// Propagates stream failures; an unreachable daemon is not an error,
    /// just the polling path.
    pub async fn run(
        &self,
        socket: Option<&Path>,
        tx: mpsc::Sender<Value>,
        cancel: CancellationToken,
    ) -> WatchResult<()> {
        if let Some(socket) = socket {
            match self.run_subscription(socket, tx.clone(), cancel.clone()).await {
                Ok(()) => return Ok(()),
                Err(WatchError::Daemon(e)) => {
                    info!(error = %e, "daemon unreachable, falling back to polling");
                }
                Err(other) => return Err(other),
            }
        }
        self.run_polling(tx, cancel).await
    }

    /// The push path: forward the daemon's event notifications.
    ///
    /// # Errors
    ///
    /// [`WatchError::Daemon`] when the connection cannot be established or
    /// breaks (including a `slow_consumer` drop).
    pub async fn run_subscription(
        &self,
        socket: &Path,
        tx: mpsc::Sender<Value>,
        cancel: CancellationToken,
    ) -> WatchResult<()> {
        let client = DaemonClient::connect(socket).await?;
        let filter = EventFilter {
            project: self.project.clone(),
            request_id: None,
        };
        let mut stream = client.subscribe(filter, Duration::from_secs(2)).await?;
        info!(socket = %socket.display(), "watching via daemon subscription");

        loop {
            tokio::select! {
                () = cancel.cancelled() => return Ok(()),
                event = stream.next_event() => match event? {
                    Some(value) => {
                        self.auto_approve_from_event(&value).await;
                        if tx.send(value).await.is_err() {
                            return Err(WatchError::ConsumerClosed);
                        }
                    }
                    None => return Ok(()),
                }
            }
        }
    }

    /// The fallback path: poll the store and derive events from status
    /// changes.
    ///
    /// # Errors
    ///
    /// Propagates store failures and a closed consumer.
    pub async fn run_polling(
        &self,
        tx: mpsc::Sender<Value>,
        cancel: CancellationToken,
    ) -> WatchResult<()> {
        info!(interval_ms = self.poll_interval.as_millis(), "watching via store polling");
        let mut seen: HashMap<RequestId, RequestStatus> = HashMap::new();
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                () = cancel.cancelled() => return Ok(()),
                _ = ticker.tick() => self.poll_once(&tx, &mut seen).await?,
            }
        }
    }

    /// One polling pass; exposed for tests.
    ///
    /// # Errors
    ///
    /// Propagates store failures and a closed consumer.
    pub async fn poll_once(
        &self,
        tx: &mpsc::Sender<Value>,
        seen: &mut HashMap<RequestId, RequestStatus>,
    ) -> WatchResult<()> {
        let pending = self.store.list_pending(self.project.as_deref()).await?;

        for request in &pending {
            match evaluate(request.status, seen.get(&request.id).copied()) {
                WatchAction::EmitPending => {
                    self.emit(tx, WatchEvent::from_request(request, "request_pending"))
                        .await?;
                }
                WatchAction::EmitStatusChange(status) => {
                    self.emit(tx, WatchEvent::from_request(request, event_name_for(status)))
                        .await?;
                }
                WatchAction::Skip => {}
            }
            seen.insert(request.id, request.status);

            if let Some(auto) = &self.auto {
                if let Err(e) = auto.maybe_approve(request).await {
                    warn!(request = %request.id, error = %e, "auto-approval failed");
                }
            }
        }

        // Requests we tracked that left the pending list transitioned;
        // fetch them individually to emit the terminal event.
        let pending_ids: std::collections::HashSet<RequestId> =
            pending.iter().map(|request| request.id).collect();
        let departed: Vec<RequestId> = seen
            .keys()
            .filter(|id| !pending_ids.contains(id))
            .copied()
            .collect();

        for id in departed {
            let Some(request) = self.store.get_request(id).await? else {
                seen.remove(&id);
                continue;
            };
            match evaluate(request.status, seen.get(&id).copied()) {
                WatchAction::EmitStatusChange(status) => {
                    self.emit(tx, WatchEvent::from_request(&request, event_name_for(status)))
                        .await?;
                }
                WatchAction::EmitPending | WatchAction::Skip => {}
            }
            if request.status.is_terminal() {
                seen.remove(&id);
            } else {
                seen.insert(id, request.status);
            }
        }
        Ok(())
    }

    async fn emit(&self, tx: &mpsc::Sender<Value>, event: WatchEvent) -> WatchResult<()> {
        debug!(event = %event.event, request = %event.request_id, "watch event");
        let value = serde_json::to_value(&event)
            .unwrap_or_else(|_| Value::String(event.event.clone()));
        tx.send(value).await.map_err(|_| WatchError::ConsumerClosed)
    }

    /// On the subscription path, `request_pending` events trigger the
    /// auto-approval check against the store's current truth.
    async fn auto_approve_from_event(&self, event: &Value) {
        let Some(auto) = &self.auto else { return };
        if event.get("type").and_then(Value::as_str) != Some("request_pending") {
            return;
        }
        let Some(id) = event
            .get("request_id")
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<RequestId>().ok())
        else {
            return;
        };
        match self.store.get_request(id).await {
            Ok(Some(request)) => {
                if let Err(e) = auto.maybe_approve(&request).await {
                    warn!(request = %id, error = %e, "auto-approval failed");
                }
            }
            Ok(None) => {}
            Err(e) => warn!(request = %id, error = %e, "auto-approval lookup failed"),
        }
    }
}

impl std::fmt::Debug for Watcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watcher")
            .field("project", &self.project)
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}
