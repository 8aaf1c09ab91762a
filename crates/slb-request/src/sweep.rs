//! Expiry sweeps.
//!
//! Two background sweeps keep clock-driven transitions honest:
//! - decision expiry: `pending` past `expires_at` becomes `timeout`
//! - approval expiry: `approved` past `approval_expires_at` becomes
//!   `timed_out`
//!
//! Sweeps log per-request failures and continue; a wedged request must
//! never stall the rest of the queue.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use slb_core::{RequestId, RequestStatus, Timestamp};

use crate::engine::RequestEngine;
use crate::error::RequestResult;

/// What one sweep pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Pending requests moved to `timeout`.
    pub decision_expired: Vec<RequestId>,
    /// Approved requests moved to `timed_out`.
    pub approval_expired: Vec<RequestId>,
}

impl SweepReport {
    /// Whether the pass changed anything.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.decision_expired.is_empty() && self.approval_expired.is_empty()
    }
}

impl RequestEngine {
    /// Run one expiry pass over the whole store.
    ///
    /// # Errors
    ///
    /// Returns an error only when the listings fail; per-request
    /// transition failures are logged and skipped.
    pub async fn sweep_once(&self) -> RequestResult<SweepReport> {
        let now = Timestamp::now();
        let mut report = SweepReport::default();

        for request in self.store().list_pending(None).await? {
            if !request.decision_expired(now) {
                continue;
            }
            match self
                .store()
                .transition_request(
                    request.id,
                    RequestStatus::Pending,
                    RequestStatus::Timeout,
                    None,
                    Some("decision window expired".to_string()),
                    |_| {},
                )
                .await
            {
                Ok(updated) => {
                    self.publish_transition(&updated);
                    report.decision_expired.push(request.id);
                }
                Err(e) => warn!(request = %request.id, error = %e, "decision-expiry sweep skipped request"),
            }
        }

        for request in self
            .store()
            .list_by_status(RequestStatus::Approved, None)
            .await?
        {
            if !request.approval_expired(now) {
                continue;
            }
            match self
                .store()
                .transition_request(
                    request.id,
                    RequestStatus::Approved,
                    RequestStatus::TimedOut,
                    None,
                    Some("approval window expired".to_string()),
                    |_| {},
                )
                .await
            {
                Ok(updated) => {
                    self.publish_transition(&updated);
                    report.approval_expired.push(request.id);
                }
                Err(e) => warn!(request = %request.id, error = %e, "approval-expiry sweep skipped request"),
            }
        }

        if !report.is_empty() {
            info!(
                decision_expired = report.decision_expired.len(),
                approval_expired = report.approval_expired.len(),
                "expiry sweep transitioned requests"
            );
        }
        Ok(report)
    }
}

/// Spawn the periodic sweeper. Runs until the token is cancelled.
#[must_use]
pub fn spawn_sweeper(
    engine: Arc<RequestEngine>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    debug!("sweeper stopped");
                    return;
                }
                _ = ticker.tick() => {
                    if let Err(e) = engine.sweep_once().await {
                        warn!(error = %e, "expiry sweep failed");
                    }
                }
            }
        }
    })
}
