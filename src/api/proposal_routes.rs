//! Proposal REST routes.
//!
//! ## Endpoints
//!
//! - `POST /api/proposals`                 - Propose an operation
//! - `GET  /api/proposals/pending`         - Pending proposals for a tenant (paged)
//! - `GET  /api/proposals/:id`             - One proposal
//! - `POST /api/proposals/:id/approve`     - Approve and execute
//! - `POST /api/proposals/:id/reject`      - Reject
//! - `PUT  /api/proposals/:id/payload`     - Replace payload, re-validate
//! - `POST /api/proposals/bulk/approve`    - Approve many
//! - `POST /api/proposals/bulk/reject`     - Reject many
//! - `GET  /api/health`                    - Liveness

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use proposal_types::{BulkOutcome, Page, PageRequest, ProposalResponse, ProposeResponse};
use serde::{Deserialize, Serialize};
use tracing::error;
use uuid::Uuid;

use crate::error::ProposalError;
use crate::proposal::{ProposalService, ProposeRequest};

// ── State ────────────────────────────────────────────────────

#[derive(Clone)]
pub struct ProposalState {
    pub service: Arc<ProposalService>,
}

impl ProposalState {
    pub fn new(service: Arc<ProposalService>) -> Self {
        Self { service }
    }
}

// ── Request/Response Types ───────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct PendingQuery {
    pub tenant_id: Uuid,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub page_size: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub reviewer_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct BulkReviewRequest {
    pub ids: Vec<Uuid>,
    pub reviewer_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePayloadRequest {
    pub payload: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// `ProposalError` rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub ProposalError);

impl From<ProposalError> for ApiError {
    fn from(err: ProposalError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let message = match &self.0 {
            ProposalError::Store(_) | ProposalError::Policy(_) => {
                error!("Request failed: {:?}", self.0);
                "Internal error".to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorResponse {
            error: self.0.kind().to_string(),
            message,
        };
        (status, Json(body)).into_response()
    }
}

// ── Router ───────────────────────────────────────────────────

/// Create the proposal router.
pub fn create_proposal_router(service: Arc<ProposalService>) -> Router<()> {
    let state = ProposalState::new(service);

    Router::new()
        .route("/api/health", get(health))
        .route("/api/proposals", post(propose))
        .route("/api/proposals/pending", get(list_pending))
        .route("/api/proposals/bulk/approve", post(bulk_approve))
        .route("/api/proposals/bulk/reject", post(bulk_reject))
        .route("/api/proposals/:id", get(get_proposal))
        .route("/api/proposals/:id/approve", post(approve))
        .route("/api/proposals/:id/reject", post(reject))
        .route("/api/proposals/:id/payload", put(update_payload))
        .with_state(state)
}

// ── Handlers ─────────────────────────────────────────────────

/// GET /api/health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// POST /api/proposals
async fn propose(
    State(state): State<ProposalState>,
    Json(req): Json<ProposeRequest>,
) -> Result<(StatusCode, Json<ProposeResponse>), ApiError> {
    let response = state.service.propose(req).await?;
    let status = match response {
        ProposeResponse::Pending(_) => StatusCode::CREATED,
        ProposeResponse::Executed(_) => StatusCode::OK,
    };
    Ok((status, Json(response)))
}

/// GET /api/proposals/pending?tenant_id=..&page=..&page_size=..
async fn list_pending(
    State(state): State<ProposalState>,
    Query(query): Query<PendingQuery>,
) -> Result<Json<Page<ProposalResponse>>, ApiError> {
    let defaults = PageRequest::default();
    let page = PageRequest::new(
        query.page.unwrap_or(defaults.page),
        query.page_size.unwrap_or(defaults.page_size),
    );
    let proposals = state
        .service
        .get_pending_proposals(query.tenant_id, page)
        .await?;
    Ok(Json(proposals))
}

/// GET /api/proposals/:id
async fn get_proposal(
    State(state): State<ProposalState>,
    Path(proposal_id): Path<Uuid>,
) -> Result<Json<ProposalResponse>, ApiError> {
    Ok(Json(state.service.get_proposal(proposal_id).await?))
}

/// POST /api/proposals/:id/approve
async fn approve(
    State(state): State<ProposalState>,
    Path(proposal_id): Path<Uuid>,
    Json(req): Json<ReviewRequest>,
) -> Result<Json<ProposalResponse>, ApiError> {
    let proposal = state
        .service
        .approve_proposal(proposal_id, req.reviewer_id)
        .await?;
    Ok(Json(proposal))
}

/// POST /api/proposals/:id/reject
async fn reject(
    State(state): State<ProposalState>,
    Path(proposal_id): Path<Uuid>,
    Json(req): Json<ReviewRequest>,
) -> Result<Json<ProposalResponse>, ApiError> {
    let proposal = state
        .service
        .reject_proposal(proposal_id, req.reviewer_id)
        .await?;
    Ok(Json(proposal))
}

/// PUT /api/proposals/:id/payload
async fn update_payload(
    State(state): State<ProposalState>,
    Path(proposal_id): Path<Uuid>,
    Json(req): Json<UpdatePayloadRequest>,
) -> Result<Json<ProposalResponse>, ApiError> {
    let proposal = state
        .service
        .update_proposal_payload(proposal_id, req.payload)
        .await?;
    Ok(Json(proposal))
}

/// POST /api/proposals/bulk/approve
async fn bulk_approve(
    State(state): State<ProposalState>,
    Json(req): Json<BulkReviewRequest>,
) -> Json<BulkOutcome> {
    Json(state.service.bulk_approve(&req.ids, req.reviewer_id).await)
}

/// POST /api/proposals/bulk/reject
async fn bulk_reject(
    State(state): State<ProposalState>,
    Json(req): Json<BulkReviewRequest>,
) -> Json<BulkOutcome> {
    Json(state.service.bulk_reject(&req.ids, req.reviewer_id).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExecutionError;
    use crate::execution::{ExecutionRequest, OperationExecutor};
    use crate::proposal::{InMemoryProposalStore, RuleBasedValidator, StaticApprovalPolicy};
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    struct NoopExecutor;

    #[async_trait]
    impl OperationExecutor for NoopExecutor {
        async fn execute(&self, _request: ExecutionRequest) -> Result<(), ExecutionError> {
            Ok(())
        }
    }

    fn router() -> Router<()> {
        let service = ProposalService::new(
            Arc::new(InMemoryProposalStore::new()),
            Arc::new(StaticApprovalPolicy::require_all()),
            Arc::new(RuleBasedValidator::new()),
            Arc::new(NoopExecutor),
        );
        create_proposal_router(Arc::new(service))
    }

    async fn send(
        app: &Router<()>,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(match body {
                Some(v) => Body::from(v.to_string()),
                None => Body::empty(),
            })
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    #[tokio::test]
    async fn test_propose_then_approve_over_http() {
        let app = router();
        let tenant = Uuid::new_v4();

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/proposals",
            Some(json!({
                "tenant_id": tenant,
                "user_id": Uuid::new_v4(),
                "entity_type": "organization",
                "operation": "create",
                "payload": {"name": "Analytical Engines Ltd"}
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["status"], "pending");
        let id = body["id"].as_str().unwrap().to_string();

        let (status, body) = send(
            &app,
            Method::GET,
            &format!("/api/proposals/pending?tenant_id={tenant}"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 1);

        let (status, body) = send(
            &app,
            Method::POST,
            &format!("/api/proposals/{id}/approve"),
            Some(json!({"reviewer_id": Uuid::new_v4()})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "executed");

        let (status, body) = send(
            &app,
            Method::POST,
            &format!("/api/proposals/{id}/reject"),
            Some(json!({"reviewer_id": Uuid::new_v4()})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "not_pending");
    }

    #[tokio::test]
    async fn test_error_mapping() {
        let app = router();

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/proposals",
            Some(json!({
                "tenant_id": Uuid::new_v4(),
                "user_id": Uuid::new_v4(),
                "entity_type": "invoice",
                "operation": "create",
                "payload": {}
            })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "invalid_entity_type");

        let (status, body) = send(
            &app,
            Method::GET,
            &format!("/api/proposals/{}", Uuid::new_v4()),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(&router(), Method::GET, "/api/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }
}
