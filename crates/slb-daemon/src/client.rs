//! Daemon client: one connection, newline-delimited JSON-RPC.
//!
//! Used by the watcher's subscription path and the guard-script test
//! harness. Every call carries a deadline; a missing socket or a timeout
//! surfaces as [`DaemonError::Unavailable`] / [`DaemonError::Timeout`] so
//! callers can fall back to direct store access.

use serde_json::{Value, json};
use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::UnixStream;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};

use slb_events::EventFilter;

use crate::error::{DaemonError, DaemonResult};
use crate::rpc::{RpcNotification, RpcResponse};
use crate::server::HookDecision;

/// A connected daemon client.
pub struct DaemonClient {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
    next_id: u64,
}

impl DaemonClient {
    /// Connect to the daemon socket.
    ///
    /// # Errors
    ///
    /// [`DaemonError::Unavailable`] when the socket is absent or refuses.
    pub async fn connect(socket: &Path) -> DaemonResult<Self> {
        let stream = UnixStream::connect(socket)
            .await
            .map_err(|e| DaemonError::Unavailable(format!("{}: {e}", socket.display())))?;
        let (read_half, writer) = stream.into_split();
        Ok(Self {
            lines: BufReader::new(read_half).lines(),
            writer,
            next_id: 1,
        })
    }

    /// Issue a request and wait for its response.
    ///
    /// # Errors
    ///
    /// [`DaemonError::Timeout`] when `deadline` elapses,
    /// [`DaemonError::Rpc`] for an error response, and
    /// [`DaemonError::Protocol`] for malformed traffic.
    pub async fn call(
        &mut self,
        method: &str,
        params: Value,
        deadline: Duration,
    ) -> DaemonResult<Value> {
        let id = self.next_id;
        self.next_id += 1;

        let request = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        let mut line = serde_json::to_vec(&request)
            .map_err(|e| DaemonError::Protocol(e.to_string()))?;
        line.push(b'\n');

        tokio::time::timeout(deadline, async {
            self.writer.write_all(&line).await?;
            self.writer.flush().await?;

            loop {
                let Some(line) = self.lines.next_line().await? else {
                    return Err(DaemonError::Unavailable("daemon closed the connection".into()));
                };
                let response: RpcResponse = serde_json::from_str(&line)
                    .map_err(|e| DaemonError::Protocol(format!("bad response: {e}")))?;
                if response.id != Value::from(id) {
                    // A stray notification or an answer to someone else's id.
                    continue;
                }
                if let Some(error) = response.error {
                    return Err(DaemonError::Rpc {
                        code: error.code,
                        message: error.message,
                    });
                }
                return Ok(response.result.unwrap_or(Value::Null));
            }
        })
        .await
        .map_err(|_| DaemonError::Timeout(deadline))?
    }

    /// The hook fast path. Callers treat any error as "fall back to local
    /// classification".
    ///
    /// # Errors
    ///
    /// As for [`DaemonClient::call`].
    pub async fn hook_query(
        &mut self,
        command: &str,
        session_id: Option<&str>,
        cwd: Option<&str>,
        deadline: Duration,
    ) -> DaemonResult<HookDecision> {
        let result = self
            .call(
                "hook_query",
                json!({
                    "command": command,
                    "session_id": session_id,
                    "cwd": cwd,
                }),
                deadline,
            )
            .await?;
        serde_json::from_value(result).map_err(|e| DaemonError::Protocol(e.to_string()))
    }

    /// Daemon status snapshot.
    ///
    /// # Errors
    ///
    /// As for [`DaemonClient::call`].
    pub async fn daemon_status(&mut self, deadline: Duration) -> DaemonResult<Value> {
        self.call("daemon_status", Value::Null, deadline).await
    }

    /// Subscribe and convert this connection into an event stream.
    ///
    /// # Errors
    ///
    /// As for [`DaemonClient::call`].
    pub async fn subscribe(
        mut self,
        filter: EventFilter,
        deadline: Duration,
    ) -> DaemonResult<EventStream> {
        let params = serde_json::to_value(&filter)
            .map_err(|e| DaemonError::Protocol(e.to_string()))?;
        self.call("subscribe", params, deadline).await?;
        Ok(EventStream { lines: self.lines })
    }
}

impl std::fmt::Debug for DaemonClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DaemonClient").finish_non_exhaustive()
    }
}

/// A subscribed connection yielding event payloads.
pub struct EventStream {
    lines: Lines<BufReader<OwnedReadHalf>>,
}

impl EventStream {
    /// The next event payload, or `None` when the daemon closes the
    /// stream (shutdown or slow-consumer drop).
    ///
    /// # Errors
    ///
    /// [`DaemonError::Rpc`] when the daemon ends the stream with an error
    /// (e.g. `slow_consumer`), I/O errors otherwise.
    pub async fn next_event(&mut self) -> DaemonResult<Option<Value>> {
        loop {
            let Some(line) = self.lines.next_line().await? else {
                return Ok(None);
            };
            if line.trim().is_empty() {
                continue;
            }
            // The stream carries `event` notifications; a response object
            // here is the server ending the subscription with an error.
            if let Ok(notification) = serde_json::from_str::<RpcNotification>(&line) {
                if notification.method == "event" {
                    return Ok(Some(notification.params));
                }
                continue;
            }
            if let Ok(response) = serde_json::from_str::<RpcResponse>(&line) {
                if let Some(error) = response.error {
                    return Err(DaemonError::Rpc {
                        code: error.code,
                        message: error.message,
                    });
                }
                continue;
            }
            return Err(DaemonError::Protocol(format!("unexpected line: {line}")));
        }
    }
}

impl std::fmt::Debug for EventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStream").finish_non_exhaustive()
    }
}
