//! The audit service.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use slb_core::{
    AuditRow, Outcome, Rating, Request, RequestId, RequestStatus, Review, RiskTier, Timestamp,
};
use slb_crypto::ContentHash;
use slb_store::{Store, StoreError};

use crate::error::{AuditError, AuditResult};

/// Default search result cap when the caller passes zero.
const DEFAULT_SEARCH_LIMIT: usize = 50;

/// Filters for history search.
#[derive(Debug, Clone, Default)]
pub struct HistoryQuery {
    /// Full-text query over command text and justification reason; `None`
    /// lists without ranking.
    pub text: Option<String>,
    /// Only requests in this status.
    pub status: Option<RequestStatus>,
    /// Only requests from this agent.
    pub agent: Option<String>,
    /// Only requests at this tier.
    pub tier: Option<RiskTier>,
    /// Only requests created at or after this time.
    pub since: Option<Timestamp>,
    /// Result cap; zero means the default.
    pub limit: usize,
}

/// A request with everything the audit browser shows.
#[derive(Debug, Clone, Serialize)]
pub struct RequestDetail {
    /// The request.
    pub request: Request,
    /// Its reviews, oldest first.
    pub reviews: Vec<Review>,
    /// Its outcome, when recorded.
    pub outcome: Option<Outcome>,
    /// Its transition history.
    pub trail: Vec<AuditRow>,
}

/// Aggregate outcome statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutcomeStats {
    /// Recorded outcomes.
    pub total: usize,
    /// Outcomes flagged as having caused problems.
    pub problems: usize,
    /// Mean rating over rated outcomes.
    pub average_rating: Option<f64>,
    /// Outcome counts per risk tier of the underlying request.
    pub by_tier: HashMap<String, usize>,
}

/// A deterministic history export.
#[derive(Debug, Clone)]
pub struct ExportDocument {
    /// Canonical JSON text.
    pub json: String,
    /// BLAKE3 integrity hash of `json`.
    pub integrity_hash: ContentHash,
}

/// Outcome recording, search, and export over the store.
#[derive(Debug, Clone)]
pub struct AuditService {
    store: Arc<Store>,
}

impl AuditService {
    /// Create a service over a store.
    #[must_use]
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Record post-execution feedback for a request.
    ///
    /// # Errors
    ///
    /// [`AuditError::RequestNotExecuted`] unless the request is `executed`
    /// or `execution_failed`; store `OutcomeExists` for a second outcome.
    pub async fn record_outcome(
        &self,
        request_id: RequestId,
        caused_problems: bool,
        problem_description: Option<String>,
        rating: Option<Rating>,
        notes: Option<String>,
    ) -> AuditResult<Outcome> {
        let request = self
            .store
            .get_request(request_id)
            .await?
            .ok_or(StoreError::NotFound {
                entity: "request",
                id: request_id.to_string(),
            })?;

        if !matches!(
            request.status,
            RequestStatus::Executed | RequestStatus::ExecutionFailed
        ) {
            return Err(AuditError::RequestNotExecuted {
                id: request_id.to_string(),
                actual: request.status,
            });
        }

        let outcome = Outcome {
            request_id,
            caused_problems,
            problem_description,
            rating,
            notes,
            recorded_at: Timestamp::now(),
        };
        self.store
            .record_outcome(&outcome, &request.project_path)
            .await?;
        info!(request = %request_id, caused_problems, "outcome recorded");
        Ok(outcome)
    }

    /// The outcome for a request, when one was recorded.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub async fn get_outcome(&self, request_id: RequestId) -> AuditResult<Option<Outcome>> {
        Ok(self.store.get_outcome(request_id).await?)
    }

    /// List outcomes, newest first.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub async fn list_outcomes(&self, project: Option<&str>) -> AuditResult<Vec<Outcome>> {
        Ok(self.store.list_outcomes(project).await?)
    }

    /// Aggregate statistics over recorded outcomes.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub async fn outcome_stats(&self, project: Option<&str>) -> AuditResult<OutcomeStats> {
        let outcomes = self.store.list_outcomes(project).await?;
        let total = outcomes.len();
        let problems = outcomes.iter().filter(|o| o.caused_problems).count();

        let ratings: Vec<f64> = outcomes
            .iter()
            .filter_map(|o| o.rating.map(|r| f64::from(r.get())))
            .collect();
        let average_rating = if ratings.is_empty() {
            None
        } else {
            Some(ratings.iter().sum::<f64>() / ratings.len() as f64)
        };

        let mut by_tier: HashMap<String, usize> = HashMap::new();
        for outcome in &outcomes {
            if let Some(request) = self.store.get_request(outcome.request_id).await? {
                *by_tier.entry(request.risk_tier.as_str().to_string()).or_default() += 1;
            }
        }

        Ok(OutcomeStats {
            total,
            problems,
            average_rating,
            by_tier,
        })
    }

    /// Search history. With `text`, ranked full-text hits; without, a
    /// chronological listing. The remaining filters apply either way.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub async fn search(&self, query: &HistoryQuery) -> AuditResult<Vec<Request>> {
        let limit = if query.limit == 0 {
            DEFAULT_SEARCH_LIMIT
        } else {
            query.limit
        };

        let candidates: Vec<Request> = if let Some(text) = &query.text {
            // Over-fetch before the in-memory filters trim the set.
            self.store
                .search_requests(text, limit.saturating_mul(4))
                .await?
                .into_iter()
                .map(|hit| hit.request)
                .collect()
        } else {
            self.store.list_requests(None).await?
        };

        let mut results: Vec<Request> = candidates
            .into_iter()
            .filter(|request| {
                query.status.is_none_or(|status| request.status == status)
                    && query
                        .agent
                        .as_ref()
                        .is_none_or(|agent| request.requestor_agent == *agent)
                    && query.tier.is_none_or(|tier| request.risk_tier == tier)
                    && query.since.is_none_or(|since| request.created_at >= since)
            })
            .collect();
        results.truncate(limit);
        Ok(results)
    }

    /// Everything the audit browser shows for one request.
    ///
    /// # Errors
    ///
    /// Store `NotFound` for an unknown request.
    pub async fn request_detail(&self, id: RequestId) -> AuditResult<RequestDetail> {
        let request = self
            .store
            .get_request(id)
            .await?
            .ok_or(StoreError::NotFound {
                entity: "request",
                id: id.to_string(),
            })?;
        Ok(RequestDetail {
            reviews: self.store.list_reviews(id).await?,
            outcome: self.store.get_outcome(id).await?,
            trail: self.store.audit_trail(id).await?,
            request,
        })
    }

    /// Export history as canonical JSON with an integrity hash.
    ///
    /// Requests sort by `(created_at, id)`; object keys sort
    /// lexicographically; timestamps are RFC 3339. Two exports of the same
    /// history are byte-identical, so the hash doubles as a tamper check.
    ///
    /// # Errors
    ///
    /// Propagates store and serialization errors.
    pub async fn export(&self, project: Option<&str>) -> AuditResult<ExportDocument> {
        let mut requests = self.store.list_requests(project).await?;
        requests.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });

        let mut entries = Vec::with_capacity(requests.len());
        for request in requests {
            let id = request.id;
            entries.push(RequestDetail {
                reviews: self.store.list_reviews(id).await?,
                outcome: self.store.get_outcome(id).await?,
                trail: self.store.audit_trail(id).await?,
                request,
            });
        }

        // Round-trip through Value: object keys come out sorted.
        let value = serde_json::to_value(&entries)?;
        let json = serde_json::to_string_pretty(&value)?;
        let integrity_hash = ContentHash::digest("slb-history", &[json.as_bytes()]);
        Ok(ExportDocument {
            json,
            integrity_hash,
        })
    }
}
