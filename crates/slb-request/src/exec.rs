//! Execution of approved requests.
//!
//! SLB gates commands; it does not sandbox them. Execution happens in the
//! requester's own shell environment, with stdout and stderr captured to
//! the per-request log for the audit trail. Exit codes are recorded as-is;
//! a nonzero exit is still `executed`. `execution_failed` means the
//! command never ran (spawn failure) or was aborted.

use std::path::Path;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use slb_core::{ExecutionRecord, Request, RequestId, RequestStatus, SessionId, Timestamp};

use crate::engine::RequestEngine;
use crate::error::{RequestError, RequestResult};

/// How an execution attempt ended.
#[derive(Debug, Clone)]
pub enum ExecResult {
    /// The command ran to completion (any exit code).
    Completed {
        /// Exit code; `-1` when the process died to a signal.
        exit_code: i32,
        /// Wall-clock duration in milliseconds.
        duration_ms: u64,
        /// Path of the captured log.
        log_path: String,
    },
    /// The command never ran.
    Failed {
        /// What went wrong.
        error: String,
    },
}

impl RequestEngine {
    /// Transition an approved request to `executing`.
    ///
    /// # Errors
    ///
    /// [`RequestError::ApprovalWindowExpired`] when the execution window
    /// already lapsed (the request is moved to `timed_out` first), plus
    /// store conflicts when the request is not approved.
    pub async fn begin_execution(
        &self,
        id: RequestId,
        executor: SessionId,
    ) -> RequestResult<Request> {
        let request = self.get(id).await?;
        let now = Timestamp::now();

        if request.approval_expired(now) {
            let timed_out = self
                .store()
                .transition_request(
                    id,
                    RequestStatus::Approved,
                    RequestStatus::TimedOut,
                    None,
                    Some("approval window expired".to_string()),
                    |_| {},
                )
                .await?;
            self.publish_transition(&timed_out);
            return Err(RequestError::ApprovalWindowExpired(id.to_string()));
        }

        let executing = self
            .store()
            .transition_request(
                id,
                RequestStatus::Approved,
                RequestStatus::Executing,
                Some(executor),
                None,
                |_| {},
            )
            .await?;
        self.publish_transition(&executing);
        Ok(executing)
    }

    /// Record the result of an execution attempt.
    ///
    /// # Errors
    ///
    /// Propagates store conflicts when the request is not `executing`.
    pub async fn finish_execution(
        &self,
        id: RequestId,
        executor: SessionId,
        result: ExecResult,
    ) -> RequestResult<Request> {
        let session = self.active_session(executor).await?;

        let finished = match result {
            ExecResult::Completed {
                exit_code,
                duration_ms,
                log_path,
            } => {
                let record = ExecutionRecord {
                    log_path,
                    exit_code,
                    duration_ms,
                    executed_by_session_id: session.id,
                    executed_by_agent: session.agent_name.clone(),
                    executed_by_model: session.model.clone(),
                    executed_at: Timestamp::now(),
                };
                self.store()
                    .transition_request(
                        id,
                        RequestStatus::Executing,
                        RequestStatus::Executed,
                        Some(executor),
                        None,
                        move |req| req.execution = Some(record),
                    )
                    .await?
            }
            ExecResult::Failed { error } => {
                warn!(request = %id, error = %error, "execution failed");
                self.store()
                    .transition_request(
                        id,
                        RequestStatus::Executing,
                        RequestStatus::ExecutionFailed,
                        Some(executor),
                        Some(error),
                        |_| {},
                    )
                    .await?
            }
        };

        self.publish_transition(&finished);
        Ok(finished)
    }

    /// Execute an approved request end to end: transition to `executing`,
    /// run the command with output captured to `log_dir/<id>.log`, record
    /// the result. Returns the final request; the caller propagates
    /// `execution.exit_code`.
    ///
    /// # Errors
    ///
    /// Transition errors as in [`RequestEngine::begin_execution`]; spawn
    /// failures are recorded as `execution_failed` and returned as the
    /// final request, not as an `Err`.
    pub async fn execute(
        &self,
        id: RequestId,
        executor: SessionId,
        log_dir: &Path,
    ) -> RequestResult<Request> {
        let request = self.begin_execution(id, executor).await?;

        tokio::fs::create_dir_all(log_dir).await?;
        let log_path = log_dir.join(format!("{}.log", request.id.0));
        let started = tokio::time::Instant::now();

        let result = match run_command(&request, &log_path).await {
            Ok(exit_code) => {
                let duration_ms =
                    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                info!(request = %id, exit_code, duration_ms, "command executed");
                ExecResult::Completed {
                    exit_code,
                    duration_ms,
                    log_path: log_path.display().to_string(),
                }
            }
            Err(e) => ExecResult::Failed {
                error: e.to_string(),
            },
        };

        self.finish_execution(id, executor, result).await
    }
}

async fn run_command(request: &Request, log_path: &Path) -> std::io::Result<i32> {
    let command = &request.command;
    let mut cmd = if command.shell {
        let mut cmd = tokio::process::Command::new("sh");
        cmd.arg("-c").arg(&command.raw);
        cmd
    } else {
        let (program, args) = command
            .argv
            .split_first()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty argv"))?;
        let mut cmd = tokio::process::Command::new(program);
        cmd.args(args);
        cmd
    };

    let output = cmd
        .current_dir(&command.cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    let mut log = tokio::fs::File::create(log_path).await?;
    log.write_all(&output.stdout).await?;
    log.write_all(&output.stderr).await?;
    log.flush().await?;

    Ok(output.status.code().unwrap_or(-1))
}
