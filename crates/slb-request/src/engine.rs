//! The request engine.

use std::sync::Arc;
use std::time::Duration as StdDuration;
use tracing::{debug, info, warn};

use slb_config::SlbConfig;
use slb_core::{
    Attachment, CommandSpec, DryRun, Justification, Request, RequestId, RequestStatus, Review,
    ReviewDecision, ReviewId, ReviewResponses, Session, SessionId, Timestamp,
};
use slb_crypto::{ReviewSignature, SessionKey, verify_review};
use slb_events::{EventBus, EventMetadata, SlbEvent};
use slb_patterns::{Classification, PatternEngine};
use slb_store::{Store, StoreError};

use crate::error::{RequestError, RequestResult};
use crate::policy::{QuorumDecision, can_cancel, evaluate_quorum};

/// Input for creating a request.
#[derive(Debug, Clone)]
pub struct CreateRequestInput {
    /// The requesting session.
    pub session_id: SessionId,
    /// The command as typed.
    pub command: String,
    /// Working directory for the command.
    pub cwd: String,
    /// Whether a shell interprets the command.
    pub shell: bool,
    /// The requestor's justification.
    pub justification: Justification,
    /// Evidence for reviewers.
    pub attachments: Vec<Attachment>,
    /// Regexes masking sensitive spans for display.
    pub redact_patterns: Vec<String>,
    /// Dry-run evidence, when any.
    pub dry_run: Option<DryRun>,
    /// Project path override; must match the session's project when set.
    pub project_path: Option<String>,
}

/// Result of a create call.
#[derive(Debug)]
pub enum CreateOutcome {
    /// The command classified SAFE; nothing was persisted.
    Skipped {
        /// The classification that skipped it.
        classification: Classification,
    },
    /// A pending request was persisted.
    Created {
        /// The request.
        request: Request,
        /// Its classification.
        classification: Classification,
    },
}

/// A reviewer's submission.
#[derive(Debug, Clone)]
pub struct NewReview {
    /// The request under review.
    pub request_id: RequestId,
    /// The reviewing session.
    pub reviewer_session_id: SessionId,
    /// The verdict.
    pub decision: ReviewDecision,
    /// Free-form comments.
    pub comments: Option<String>,
    /// Answers to the justification questions.
    pub responses: ReviewResponses,
    /// MAC over `(request_id, decision, signature_timestamp)`.
    pub signature: ReviewSignature,
    /// Timestamp the signature covers.
    pub signature_timestamp: Timestamp,
}

/// The request lifecycle coordinator.
pub struct RequestEngine {
    store: Arc<Store>,
    patterns: Arc<PatternEngine>,
    bus: EventBus,
    config: SlbConfig,
}

impl RequestEngine {
    /// Create an engine.
    #[must_use]
    pub fn new(
        store: Arc<Store>,
        patterns: Arc<PatternEngine>,
        bus: EventBus,
        config: SlbConfig,
    ) -> Self {
        Self {
            store,
            patterns,
            bus,
            config,
        }
    }

    /// The event bus this engine publishes on.
    #[must_use]
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// The pattern engine backing classification.
    #[must_use]
    pub fn patterns(&self) -> &Arc<PatternEngine> {
        &self.patterns
    }

    /// The store backing this engine.
    #[must_use]
    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// The engine's configuration.
    #[must_use]
    pub fn config(&self) -> &SlbConfig {
        &self.config
    }

    /// Create a request from a command.
    ///
    /// SAFE commands are skipped without persisting anything; everything
    /// else is stored as `pending` and a `request_pending` event follows
    /// the commit.
    ///
    /// # Errors
    ///
    /// [`RequestError::SessionNotActive`] for a missing or ended session,
    /// [`RequestError::ProjectMismatch`] when the named project differs
    /// from the session's, and [`RequestError::InvalidCommand`] for
    /// commands that cannot be built.
    pub async fn create(&self, input: CreateRequestInput) -> RequestResult<CreateOutcome> {
        let session = self.active_session(input.session_id).await?;
        if let Some(project) = &input.project_path {
            if *project != session.project_path {
                return Err(RequestError::ProjectMismatch {
                    expected: session.project_path,
                    got: project.clone(),
                });
            }
        }

        let command = CommandSpec::build(
            &input.command,
            &input.cwd,
            input.shell,
            &input.redact_patterns,
        )?;
        let classification = self.patterns.classify(&command.raw);

        // Any interaction counts as activity.
        let _ = self.store.touch_session(session.id, Timestamp::now()).await;

        if classification.is_safe {
            debug!(command = %command.display(), "safe command skipped");
            return Ok(CreateOutcome::Skipped { classification });
        }

        let tier = classification.tier;
        let now = Timestamp::now();
        let request = Request {
            id: RequestId::new(),
            project_path: session.project_path.clone(),
            risk_tier: tier,
            status: RequestStatus::Pending,
            min_approvals: self.config.quorum.min_approvals(tier),
            require_different_model: self.config.quorum.require_different_model(tier),
            requestor_session_id: session.id,
            requestor_agent: session.agent_name.clone(),
            requestor_model: session.model.clone(),
            justification: input.justification,
            attachments: input.attachments,
            dry_run: input.dry_run,
            created_at: now,
            expires_at: self
                .config
                .timing
                .decision_window(tier)
                .map(|window| now.plus(window)),
            approval_expires_at: None,
            resolved_at: None,
            execution: None,
            rollback: None,
            command,
        };

        self.store.create_request(&request).await?;
        info!(request = %request.id, tier = %tier, "request created");

        self.bus.publish(SlbEvent::RequestPending {
            metadata: EventMetadata::new("request-engine"),
            request_id: request.id,
            project_path: request.project_path.clone(),
            tier,
            command: request.command.display().to_string(),
        });

        Ok(CreateOutcome::Created {
            request,
            classification,
        })
    }

    /// Cancel a pending request. Only the requestor may cancel.
    ///
    /// # Errors
    ///
    /// [`RequestError::CancelRefused`] when the cancel gate says no.
    pub async fn cancel(&self, id: RequestId, actor: SessionId) -> RequestResult<Request> {
        let request = self.get(id).await?;

        let check = can_cancel(&request, actor);
        if !check.allow {
            return Err(RequestError::CancelRefused {
                id: id.to_string(),
                reason: check.reason.to_string(),
            });
        }

        let cancelled = self
            .store
            .transition_request(
                id,
                RequestStatus::Pending,
                RequestStatus::Cancelled,
                Some(actor),
                None,
                |_| {},
            )
            .await?;

        self.publish_transition(&cancelled);
        Ok(cancelled)
    }

    /// Validate and record a review, then re-evaluate quorum.
    ///
    /// # Errors
    ///
    /// [`RequestError::SelfReview`], [`RequestError::SignatureMismatch`],
    /// [`RequestError::DecisionWindowExpired`], plus store conflicts for
    /// duplicates and non-pending requests.
    pub async fn submit_review(&self, new: NewReview) -> RequestResult<(Review, Request)> {
        let request = self.get(new.request_id).await?;
        let now = Timestamp::now();

        if request.status != RequestStatus::Pending {
            return Err(StoreError::RequestNotPending {
                id: request.id.to_string(),
                actual: request.status,
            }
            .into());
        }
        if request.expires_at.is_some_and(|deadline| now >= deadline) {
            return Err(RequestError::DecisionWindowExpired(request.id.to_string()));
        }
        if new.reviewer_session_id == request.requestor_session_id {
            return Err(RequestError::SelfReview);
        }

        let reviewer = self.active_session(new.reviewer_session_id).await?;

        let key_hex = self
            .store
            .get_session_key(reviewer.id)
            .await?
            .ok_or_else(|| RequestError::SessionNotActive(reviewer.id.to_string()))?;
        let key = SessionKey::from_hex(&key_hex)
            .map_err(|_| RequestError::SignatureMismatch)?;
        if !verify_review(
            &key,
            &request.id.0.to_string(),
            new.decision.as_str(),
            &new.signature_timestamp.to_rfc3339(),
            &new.signature,
        ) {
            return Err(RequestError::SignatureMismatch);
        }

        let review = Review {
            id: ReviewId::new(),
            request_id: request.id,
            reviewer_session_id: reviewer.id,
            reviewer_agent: reviewer.agent_name.clone(),
            reviewer_model: reviewer.model.clone(),
            decision: new.decision,
            signature: new.signature,
            signature_timestamp: new.signature_timestamp,
            responses: new.responses,
            comments: new.comments,
            created_at: now,
        };
        self.store.create_review(&review).await?;
        let _ = self.store.touch_session(reviewer.id, now).await;

        self.bus.publish(SlbEvent::RequestReviewAdded {
            metadata: EventMetadata::new("review-engine"),
            request_id: request.id,
            project_path: request.project_path.clone(),
            reviewer_agent: review.reviewer_agent.clone(),
            decision: review.decision.as_str().to_string(),
        });

        let request = self.evaluate_and_transition(request, Some(reviewer.id)).await?;
        Ok((review, request))
    }

    /// Re-evaluate quorum for a pending request and transition when the
    /// decision is in. Used after each review and by the CAUTION
    /// auto-approval path (where `min_approvals` is zero).
    ///
    /// # Errors
    ///
    /// Propagates store errors; a concurrent transition to the same target
    /// state is treated as success.
    pub async fn evaluate_and_transition(
        &self,
        request: Request,
        actor: Option<SessionId>,
    ) -> RequestResult<Request> {
        let reviews = self.store.list_reviews(request.id).await?;
        let decision = evaluate_quorum(&request, &reviews);

        let (to, note) = match decision {
            QuorumDecision::Wait => return Ok(request),
            QuorumDecision::Reject => (RequestStatus::Rejected, "rejected by review"),
            QuorumDecision::Approve => (RequestStatus::Approved, "quorum reached"),
        };

        let execute_window = self.config.timing.execute_window();
        let result = self
            .store
            .transition_request(
                request.id,
                RequestStatus::Pending,
                to,
                actor,
                Some(note.to_string()),
                |req| {
                    if to == RequestStatus::Approved {
                        req.approval_expires_at = Some(Timestamp::now().plus(execute_window));
                    }
                },
            )
            .await;

        match result {
            Ok(updated) => {
                self.publish_transition(&updated);
                Ok(updated)
            }
            // Another reviewer's transition won the race to the same state.
            Err(StoreError::RequestNotPending { actual, .. }) if actual == to => {
                self.get(request.id).await
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Fetch a request.
    ///
    /// # Errors
    ///
    /// [`slb_store::StoreError::NotFound`] when it does not exist.
    pub async fn get(&self, id: RequestId) -> RequestResult<Request> {
        Ok(self
            .store
            .get_request(id)
            .await?
            .ok_or(StoreError::NotFound {
                entity: "request",
                id: id.to_string(),
            })?)
    }

    /// Block until the request leaves `pending`, or `deadline` elapses.
    ///
    /// Subscribes to the bus and double-checks the store on every wake-up,
    /// so a missed event cannot wedge the wait.
    ///
    /// # Errors
    ///
    /// [`RequestError::WaitTimeout`] when the deadline passes first.
    pub async fn wait_for_decision(
        &self,
        id: RequestId,
        deadline: StdDuration,
    ) -> RequestResult<Request> {
        let mut receiver = self.bus.subscribe();
        let started = tokio::time::Instant::now();

        loop {
            let request = self.get(id).await?;
            if request.status != RequestStatus::Pending {
                return Ok(request);
            }

            let remaining = deadline
                .checked_sub(started.elapsed())
                .ok_or_else(|| RequestError::WaitTimeout(id.to_string()))?;
            let slice = remaining.min(StdDuration::from_millis(500));

            // Any event, a dropped bus, or the tick itself: re-check the
            // store. Waking on foreign events is cheap and misses nothing.
            let _ = tokio::time::timeout(slice, receiver.recv()).await;
        }
    }

    /// Record a rollback capture for an executed request.
    ///
    /// # Errors
    ///
    /// [`RequestError::NotExecuted`] unless the request is `executed`.
    pub async fn record_rollback(&self, id: RequestId, path: String) -> RequestResult<Request> {
        let request = self.get(id).await?;
        if request.status != RequestStatus::Executed {
            return Err(RequestError::NotExecuted {
                id: id.to_string(),
                actual: request.status,
            });
        }

        // Not a status transition; annotate the entity in place.
        let rollback = slb_core::RollbackRecord {
            path,
            rolled_back_at: Some(Timestamp::now()),
        };
        Ok(self.store.set_request_rollback(id, rollback).await?)
    }

    pub(crate) async fn active_session(&self, id: SessionId) -> RequestResult<Session> {
        let session = self
            .store
            .get_session(id)
            .await?
            .ok_or_else(|| RequestError::SessionNotActive(id.to_string()))?;
        if !session.is_active() {
            return Err(RequestError::SessionNotActive(id.to_string()));
        }
        Ok(session)
    }

    /// Publish the event matching a request's (new) status.
    pub(crate) fn publish_transition(&self, request: &Request) {
        let metadata = EventMetadata::new("request-engine");
        let request_id = request.id;
        let project_path = request.project_path.clone();
        let event = match request.status {
            RequestStatus::Approved => SlbEvent::RequestApproved {
                metadata,
                request_id,
                project_path,
            },
            RequestStatus::Rejected => SlbEvent::RequestRejected {
                metadata,
                request_id,
                project_path,
            },
            RequestStatus::Cancelled => SlbEvent::RequestCancelled {
                metadata,
                request_id,
                project_path,
            },
            RequestStatus::Timeout => SlbEvent::RequestTimeout {
                metadata,
                request_id,
                project_path,
            },
            RequestStatus::Executing => SlbEvent::RequestExecuting {
                metadata,
                request_id,
                project_path,
            },
            RequestStatus::Executed => SlbEvent::RequestExecuted {
                metadata,
                request_id,
                project_path,
                exit_code: request
                    .execution
                    .as_ref()
                    .map_or(0, |execution| execution.exit_code),
            },
            RequestStatus::ExecutionFailed => SlbEvent::RequestExecutionFailed {
                metadata,
                request_id,
                project_path,
            },
            RequestStatus::TimedOut => SlbEvent::RequestTimedOut {
                metadata,
                request_id,
                project_path,
            },
            RequestStatus::Pending => {
                warn!(request = %request.id, "no transition event for pending");
                return;
            }
        };
        self.bus.publish(event);
    }
}

impl std::fmt::Debug for RequestEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestEngine").finish_non_exhaustive()
    }
}
