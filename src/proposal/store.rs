//! Proposal persistence.
//!
//! The service operates exclusively through the `ProposalStore` trait,
//! enabling pluggable backends (`InMemoryProposalStore` for tests and
//! embedded use, `PgProposalStore` for production).

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use proposal_types::{
    EntityType, Operation, Page, PageRequest, Proposal, ProposalStatus, ValidationProblem,
};
use uuid::Uuid;

/// Fields supplied when a proposal is first stored. The store assigns the id
/// and timestamps; status always starts at `pending`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewProposal {
    pub tenant_id: Uuid,
    pub proposed_by_id: Uuid,
    pub entity_type: EntityType,
    pub entity_id: Option<Uuid>,
    pub operation: Operation,
    pub payload: serde_json::Value,
    pub validation_errors: Option<Vec<ValidationProblem>>,
}

#[async_trait]
pub trait ProposalStore: Send + Sync {
    // ── Create / read ──

    async fn create(&self, new: NewProposal) -> Result<Proposal>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Proposal>>;

    /// Pending proposals for a tenant, oldest first.
    async fn find_pending(&self, tenant_id: Uuid, page: PageRequest) -> Result<Page<Proposal>>;

    // ── Status transitions ──

    /// Atomically move `id` from `from` to `to`, recording the reviewer.
    /// Returns `false` when the proposal was not in `from` (or does not exist).
    /// Fails for a pair that is not an edge of the state machine.
    async fn transition_status(
        &self,
        id: Uuid,
        from: ProposalStatus,
        to: ProposalStatus,
        reviewer_id: Uuid,
    ) -> Result<bool>;

    /// Record the execution outcome of an `approved` proposal. Fails when
    /// the proposal is not `approved`.
    async fn mark_executed(&self, id: Uuid) -> Result<()>;
    async fn mark_failed(&self, id: Uuid, message: &str) -> Result<()>;

    // ── Payload ──

    /// Replace payload and validation outcome together, only while pending.
    /// Returns `false` when the proposal is no longer pending.
    async fn update_payload(
        &self,
        id: Uuid,
        payload: &serde_json::Value,
        validation_errors: Option<&[ValidationProblem]>,
    ) -> Result<bool>;
}

// ---------------------------------------------------------------------------
// InMemoryProposalStore
// ---------------------------------------------------------------------------

/// In-memory proposal store.
///
/// A single write lock covers each conditional update, so the
/// check-and-set in `transition_status` is atomic across tasks.
pub struct InMemoryProposalStore {
    proposals: RwLock<HashMap<Uuid, Proposal>>,
}

impl InMemoryProposalStore {
    pub fn new() -> Self {
        Self {
            proposals: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored proposals in any status.
    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, HashMap<Uuid, Proposal>>> {
        self.proposals
            .read()
            .map_err(|_| anyhow!("proposal store lock poisoned"))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<Uuid, Proposal>>> {
        self.proposals
            .write()
            .map_err(|_| anyhow!("proposal store lock poisoned"))
    }

    fn finish(&self, id: Uuid, status: ProposalStatus, message: Option<&str>) -> Result<()> {
        let mut map = self.write()?;
        let proposal = map
            .get_mut(&id)
            .ok_or_else(|| anyhow!("Proposal not found: {}", id))?;
        if !proposal.status.can_transition_to(status) {
            return Err(anyhow!(
                "Proposal {} cannot move from {} to {}",
                id,
                proposal.status,
                status
            ));
        }
        let now = Utc::now();
        proposal.status = status;
        proposal.updated_at = now;
        match message {
            Some(msg) => proposal.error_message = Some(msg.to_string()),
            None => proposal.executed_at = Some(now),
        }
        Ok(())
    }
}

impl Default for InMemoryProposalStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProposalStore for InMemoryProposalStore {
    async fn create(&self, new: NewProposal) -> Result<Proposal> {
        let now = Utc::now();
        let proposal = Proposal {
            id: Uuid::new_v4(),
            tenant_id: new.tenant_id,
            proposed_by_id: new.proposed_by_id,
            entity_type: new.entity_type,
            entity_id: new.entity_id,
            operation: new.operation,
            payload: new.payload,
            status: ProposalStatus::Pending,
            validation_errors: new.validation_errors,
            reviewed_by_id: None,
            reviewed_at: None,
            executed_at: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        };
        self.write()?.insert(proposal.id, proposal.clone());
        Ok(proposal)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Proposal>> {
        Ok(self.read()?.get(&id).cloned())
    }

    async fn find_pending(&self, tenant_id: Uuid, page: PageRequest) -> Result<Page<Proposal>> {
        let map = self.read()?;
        let mut pending: Vec<&Proposal> = map
            .values()
            .filter(|p| p.tenant_id == tenant_id && p.status == ProposalStatus::Pending)
            .collect();
        pending.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        let total = pending.len() as u64;
        let items = pending
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.page_size as usize)
            .cloned()
            .collect();

        Ok(Page {
            items,
            total,
            page: page.page,
            page_size: page.page_size,
        })
    }

    async fn transition_status(
        &self,
        id: Uuid,
        from: ProposalStatus,
        to: ProposalStatus,
        reviewer_id: Uuid,
    ) -> Result<bool> {
        if !from.can_transition_to(to) {
            return Err(anyhow!("Invalid proposal transition {} -> {}", from, to));
        }
        let mut map = self.write()?;
        match map.get_mut(&id) {
            Some(proposal) if proposal.status == from => {
                let now = Utc::now();
                proposal.status = to;
                proposal.reviewed_by_id = Some(reviewer_id);
                proposal.reviewed_at = Some(now);
                proposal.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_executed(&self, id: Uuid) -> Result<()> {
        self.finish(id, ProposalStatus::Executed, None)
    }

    async fn mark_failed(&self, id: Uuid, message: &str) -> Result<()> {
        self.finish(id, ProposalStatus::Failed, Some(message))
    }

    async fn update_payload(
        &self,
        id: Uuid,
        payload: &serde_json::Value,
        validation_errors: Option<&[ValidationProblem]>,
    ) -> Result<bool> {
        let mut map = self.write()?;
        match map.get_mut(&id) {
            Some(proposal) if proposal.status == ProposalStatus::Pending => {
                proposal.payload = payload.clone();
                proposal.validation_errors = validation_errors.map(<[_]>::to_vec);
                proposal.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
