//! Proposal Service - the approval lifecycle orchestrator
//!
//! Owns propose / approve / reject / bulk / update-payload. Consults the
//! approval policy and payload validator, persists through the proposal
//! store, and calls the operation executor at the approval boundary.
//!
//! ## State machine
//!
//! ```text
//! pending ──approve──► approved ──► executed | failed
//!    └─────reject────► rejected
//! ```
//!
//! `approved` is never observable on its own: the executor runs inline in
//! the same approve call. The pending → approved step is a conditional
//! store write, so two concurrent approvals cannot both execute.
//!
//! Persisting `approved`, executing, and persisting the outcome are three
//! separate writes. A crash between them leaves the proposal `approved`
//! with no outcome; nothing here compensates for that.

use std::sync::Arc;

use proposal_types::{
    BulkItemError, BulkOutcome, EntityType, ImmediateExecutionResponse, Operation, Page,
    PageRequest, Proposal, ProposalResponse, ProposalStatus, ProposeResponse, ValidationProblem,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::policy::ApprovalPolicy;
use super::store::{NewProposal, ProposalStore};
use super::validator::PayloadValidator;
use crate::error::ProposalError;
use crate::execution::{ExecutionRequest, OperationExecutor};

pub const DEFAULT_MAX_PAGE_SIZE: u32 = 100;

/// A raw mutation request, typically produced by an agent.
///
/// `entity_type` and `operation` arrive as strings and are checked against
/// the closed enumerations before anything else happens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposeRequest {
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub entity_type: String,
    #[serde(default)]
    pub entity_id: Option<Uuid>,
    pub operation: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Which single-item operation a bulk request applies.
#[derive(Debug, Clone, Copy)]
enum BulkAction {
    Approve,
    Reject,
}

pub struct ProposalService {
    store: Arc<dyn ProposalStore>,
    policy: Arc<dyn ApprovalPolicy>,
    validator: Arc<dyn PayloadValidator>,
    executor: Arc<dyn OperationExecutor>,
    max_page_size: u32,
}

impl ProposalService {
    pub fn new(
        store: Arc<dyn ProposalStore>,
        policy: Arc<dyn ApprovalPolicy>,
        validator: Arc<dyn PayloadValidator>,
        executor: Arc<dyn OperationExecutor>,
    ) -> Self {
        Self {
            store,
            policy,
            validator,
            executor,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
        }
    }

    pub fn with_max_page_size(mut self, max_page_size: u32) -> Self {
        self.max_page_size = max_page_size.max(1);
        self
    }

    // ==========================================
    // PROPOSE
    // ==========================================

    /// Propose an operation.
    ///
    /// When policy does not require approval the operation runs now and
    /// nothing is stored. Otherwise the payload is validated and a pending
    /// proposal is stored carrying the validation outcome.
    pub async fn propose(&self, request: ProposeRequest) -> Result<ProposeResponse, ProposalError> {
        let entity_type: EntityType = request.entity_type.parse()?;
        let operation: Operation = request.operation.parse()?;

        let requires_approval = self
            .policy
            .requires_approval(request.tenant_id, entity_type)
            .await
            .map_err(ProposalError::Policy)?;

        if !requires_approval {
            self.executor
                .execute(ExecutionRequest {
                    entity_type,
                    operation,
                    entity_id: request.entity_id,
                    payload: request.payload,
                    tenant_id: request.tenant_id,
                    user_id: request.user_id,
                })
                .await?;

            info!(
                tenant_id = %request.tenant_id,
                "Executed {} {} without approval",
                entity_type,
                operation
            );
            return Ok(ProposeResponse::Executed(ImmediateExecutionResponse {
                status: ProposalStatus::Executed,
                message: format!("{entity_type} {operation} executed successfully"),
            }));
        }

        let problems = self.problems(
            entity_type,
            operation,
            request.entity_id,
            &request.payload,
        );
        let problem_count = problems.len();

        let proposal = self
            .store
            .create(NewProposal {
                tenant_id: request.tenant_id,
                proposed_by_id: request.user_id,
                entity_type,
                entity_id: request.entity_id,
                operation,
                payload: request.payload,
                validation_errors: non_empty(problems),
            })
            .await
            .map_err(ProposalError::Store)?;

        info!(
            proposal_id = %proposal.id,
            tenant_id = %proposal.tenant_id,
            validation_errors = problem_count,
            "Created pending {} {} proposal",
            entity_type,
            operation
        );
        Ok(ProposeResponse::Pending(proposal.into()))
    }

    // ==========================================
    // READS
    // ==========================================

    pub async fn get_pending_proposals(
        &self,
        tenant_id: Uuid,
        page: PageRequest,
    ) -> Result<Page<ProposalResponse>, ProposalError> {
        let page = page.normalized(self.max_page_size);
        let proposals = self
            .store
            .find_pending(tenant_id, page)
            .await
            .map_err(ProposalError::Store)?;
        Ok(proposals.map(ProposalResponse::from))
    }

    pub async fn get_proposal(&self, proposal_id: Uuid) -> Result<ProposalResponse, ProposalError> {
        Ok(self.load(proposal_id).await?.into())
    }

    // ==========================================
    // REVIEW
    // ==========================================

    /// Approve a pending proposal and execute it on behalf of the reviewer.
    pub async fn approve_proposal(
        &self,
        proposal_id: Uuid,
        reviewer_id: Uuid,
    ) -> Result<ProposalResponse, ProposalError> {
        let proposal = self.load_pending(proposal_id).await?;

        if proposal.has_validation_errors() {
            let count = proposal.validation_errors.as_ref().map_or(0, Vec::len);
            warn!(
                proposal_id = %proposal_id,
                "Approval blocked by {} validation error(s)",
                count
            );
            return Err(ProposalError::HasValidationErrors {
                id: proposal_id,
                count,
            });
        }

        self.transition_from_pending(proposal_id, ProposalStatus::Approved, reviewer_id)
            .await?;
        info!(proposal_id = %proposal_id, reviewer_id = %reviewer_id, "Proposal approved");

        let outcome = self
            .executor
            .execute(ExecutionRequest {
                entity_type: proposal.entity_type,
                operation: proposal.operation,
                entity_id: proposal.entity_id,
                payload: proposal.payload,
                tenant_id: proposal.tenant_id,
                user_id: reviewer_id,
            })
            .await;

        match outcome {
            Ok(()) => {
                self.store
                    .mark_executed(proposal_id)
                    .await
                    .map_err(ProposalError::Store)?;
                info!(proposal_id = %proposal_id, "Proposal executed");
            }
            Err(exec_err) => {
                let message = exec_err.to_string();
                error!(proposal_id = %proposal_id, "Proposal execution failed: {}", message);
                self.store
                    .mark_failed(proposal_id, &message)
                    .await
                    .map_err(ProposalError::Store)?;
                return Err(ProposalError::ExecutionFailed(proposal_id));
            }
        }

        self.get_proposal(proposal_id).await
    }

    /// Reject a pending proposal. Never executes anything.
    pub async fn reject_proposal(
        &self,
        proposal_id: Uuid,
        reviewer_id: Uuid,
    ) -> Result<ProposalResponse, ProposalError> {
        self.load_pending(proposal_id).await?;
        self.transition_from_pending(proposal_id, ProposalStatus::Rejected, reviewer_id)
            .await?;
        info!(proposal_id = %proposal_id, reviewer_id = %reviewer_id, "Proposal rejected");
        self.get_proposal(proposal_id).await
    }

    pub async fn bulk_approve(&self, proposal_ids: &[Uuid], reviewer_id: Uuid) -> BulkOutcome {
        self.bulk(BulkAction::Approve, proposal_ids, reviewer_id).await
    }

    pub async fn bulk_reject(&self, proposal_ids: &[Uuid], reviewer_id: Uuid) -> BulkOutcome {
        self.bulk(BulkAction::Reject, proposal_ids, reviewer_id).await
    }

    /// Apply the single-item action to each id in turn. A failure is recorded
    /// and processing continues; each item commits independently.
    async fn bulk(
        &self,
        action: BulkAction,
        proposal_ids: &[Uuid],
        reviewer_id: Uuid,
    ) -> BulkOutcome {
        let mut outcome = BulkOutcome::default();

        for &proposal_id in proposal_ids {
            let result = match action {
                BulkAction::Approve => self.approve_proposal(proposal_id, reviewer_id).await,
                BulkAction::Reject => self.reject_proposal(proposal_id, reviewer_id).await,
            };
            match result {
                Ok(proposal) => outcome.results.push(proposal),
                Err(e) => {
                    debug!(proposal_id = %proposal_id, "Bulk {:?} item failed: {}", action, e);
                    outcome.errors.push(BulkItemError {
                        proposal_id,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            "Bulk {:?}: {} succeeded, {} failed",
            action,
            outcome.results.len(),
            outcome.errors.len()
        );
        outcome
    }

    // ==========================================
    // PAYLOAD EDITS
    // ==========================================

    /// Replace the payload of a pending proposal and re-run validation.
    pub async fn update_proposal_payload(
        &self,
        proposal_id: Uuid,
        payload: serde_json::Value,
    ) -> Result<ProposalResponse, ProposalError> {
        let proposal = self.load_pending(proposal_id).await?;

        let problems = non_empty(self.problems(
            proposal.entity_type,
            proposal.operation,
            proposal.entity_id,
            &payload,
        ));

        let updated = self
            .store
            .update_payload(proposal_id, &payload, problems.as_deref())
            .await
            .map_err(ProposalError::Store)?;
        if !updated {
            return Err(self.not_pending(proposal_id).await);
        }

        info!(
            proposal_id = %proposal_id,
            validation_errors = problems.as_ref().map_or(0, Vec::len),
            "Proposal payload updated"
        );
        self.get_proposal(proposal_id).await
    }

    // ==========================================
    // HELPERS
    // ==========================================

    /// Payload problems plus a missing target id for update/delete.
    fn problems(
        &self,
        entity_type: EntityType,
        operation: Operation,
        entity_id: Option<Uuid>,
        payload: &serde_json::Value,
    ) -> Vec<ValidationProblem> {
        let mut problems = self.validator.validate(entity_type, operation, payload);
        if operation.requires_entity_id() && entity_id.is_none() {
            problems.insert(0, ValidationProblem::new("entity_id", "is required"));
        }
        problems
    }

    async fn load(&self, proposal_id: Uuid) -> Result<Proposal, ProposalError> {
        self.store
            .find_by_id(proposal_id)
            .await
            .map_err(ProposalError::Store)?
            .ok_or(ProposalError::NotFound(proposal_id))
    }

    async fn load_pending(&self, proposal_id: Uuid) -> Result<Proposal, ProposalError> {
        let proposal = self.load(proposal_id).await?;
        if proposal.status != ProposalStatus::Pending {
            return Err(ProposalError::NotPending {
                id: proposal_id,
                status: proposal.status,
            });
        }
        Ok(proposal)
    }

    async fn transition_from_pending(
        &self,
        proposal_id: Uuid,
        to: ProposalStatus,
        reviewer_id: Uuid,
    ) -> Result<(), ProposalError> {
        let moved = self
            .store
            .transition_status(proposal_id, ProposalStatus::Pending, to, reviewer_id)
            .await
            .map_err(ProposalError::Store)?;
        if !moved {
            // Lost a race with another reviewer
            return Err(self.not_pending(proposal_id).await);
        }
        Ok(())
    }

    /// Build a not-pending error reporting the current stored status.
    async fn not_pending(&self, proposal_id: Uuid) -> ProposalError {
        match self.load(proposal_id).await {
            Ok(current) => ProposalError::NotPending {
                id: proposal_id,
                status: current.status,
            },
            Err(e) => e,
        }
    }
}

fn non_empty(problems: Vec<ValidationProblem>) -> Option<Vec<ValidationProblem>> {
    if problems.is_empty() {
        None
    } else {
        Some(problems)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
