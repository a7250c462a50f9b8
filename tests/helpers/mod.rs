//! Shared harness for proposal lifecycle integration tests.
//!
//! Wires a `ProposalService` over the in-memory store and a real
//! `DispatchingExecutor` whose entity services only record calls.

#![allow(dead_code)]

use std::marker::PhantomData;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;

use approval_gateway::entities::EntityService;
use approval_gateway::execution::inputs::{
    AccountCreateInput, AccountUpdateInput, ContactCreateInput, ContactUpdateInput,
    IndividualCreateInput, IndividualUpdateInput, NoteCreateInput, NoteUpdateInput,
    OrganizationCreateInput, OrganizationUpdateInput, TaskCreateInput, TaskUpdateInput,
};
use approval_gateway::execution::DispatchingExecutor;
use approval_gateway::proposal::{
    InMemoryProposalStore, ProposalService, ProposeRequest, RuleBasedValidator,
    StaticApprovalPolicy,
};

/// One call observed by a recording entity service.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Create { actor: Uuid, input: Value },
    Update { actor: Uuid, entity_id: Uuid, input: Value },
    Delete { actor: Uuid, entity_id: Uuid },
}

/// Entity service that records each call and can be told to fail.
pub struct RecordingService<C, U> {
    calls: Mutex<Vec<Call>>,
    failure: Mutex<Option<String>>,
    _inputs: PhantomData<fn() -> (C, U)>,
}

impl<C, U> RecordingService<C, U> {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failure: Mutex::new(None),
            _inputs: PhantomData,
        }
    }

    pub fn fail_with(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call) -> Result<()> {
        self.calls.lock().unwrap().push(call);
        match self.failure.lock().unwrap().as_ref() {
            Some(message) => Err(anyhow!(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl<C, U> EntityService for RecordingService<C, U>
where
    C: Serialize + DeserializeOwned + Send + Sync + 'static,
    U: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    type CreateInput = C;
    type UpdateInput = U;

    async fn create(&self, _tenant_id: Uuid, actor_id: Uuid, input: C) -> Result<Uuid> {
        self.record(Call::Create {
            actor: actor_id,
            input: serde_json::to_value(&input)?,
        })?;
        Ok(Uuid::new_v4())
    }

    async fn update(
        &self,
        _tenant_id: Uuid,
        actor_id: Uuid,
        entity_id: Uuid,
        input: U,
    ) -> Result<()> {
        self.record(Call::Update {
            actor: actor_id,
            entity_id,
            input: serde_json::to_value(&input)?,
        })
    }

    async fn delete(&self, _tenant_id: Uuid, actor_id: Uuid, entity_id: Uuid) -> Result<()> {
        self.record(Call::Delete {
            actor: actor_id,
            entity_id,
        })
    }
}

pub struct Services {
    pub contacts: Arc<RecordingService<ContactCreateInput, ContactUpdateInput>>,
    pub organizations: Arc<RecordingService<OrganizationCreateInput, OrganizationUpdateInput>>,
    pub individuals: Arc<RecordingService<IndividualCreateInput, IndividualUpdateInput>>,
    pub notes: Arc<RecordingService<NoteCreateInput, NoteUpdateInput>>,
    pub tasks: Arc<RecordingService<TaskCreateInput, TaskUpdateInput>>,
    pub accounts: Arc<RecordingService<AccountCreateInput, AccountUpdateInput>>,
}

impl Services {
    fn new() -> Self {
        Self {
            contacts: Arc::new(RecordingService::new()),
            organizations: Arc::new(RecordingService::new()),
            individuals: Arc::new(RecordingService::new()),
            notes: Arc::new(RecordingService::new()),
            tasks: Arc::new(RecordingService::new()),
            accounts: Arc::new(RecordingService::new()),
        }
    }

    /// Total calls across every entity service.
    pub fn total_calls(&self) -> usize {
        self.contacts.calls().len()
            + self.organizations.calls().len()
            + self.individuals.calls().len()
            + self.notes.calls().len()
            + self.tasks.calls().len()
            + self.accounts.calls().len()
    }
}

pub struct Harness {
    pub service: Arc<ProposalService>,
    pub store: Arc<InMemoryProposalStore>,
    pub services: Services,
    pub tenant: Uuid,
    pub agent: Uuid,
}

impl Harness {
    /// Every entity type requires approval.
    pub fn new() -> Self {
        Self::with_policy(StaticApprovalPolicy::require_all(), Uuid::new_v4())
    }

    pub fn with_policy(policy: StaticApprovalPolicy, tenant: Uuid) -> Self {
        let services = Services::new();
        let executor = DispatchingExecutor::builder()
            .contacts(services.contacts.clone())
            .organizations(services.organizations.clone())
            .individuals(services.individuals.clone())
            .notes(services.notes.clone())
            .tasks(services.tasks.clone())
            .accounts(services.accounts.clone())
            .build();

        let store = Arc::new(InMemoryProposalStore::new());
        let service = ProposalService::new(
            store.clone(),
            Arc::new(policy),
            Arc::new(RuleBasedValidator::new()),
            Arc::new(executor),
        );

        Self {
            service: Arc::new(service),
            store,
            services,
            tenant,
            agent: Uuid::new_v4(),
        }
    }

    pub fn request(
        &self,
        entity_type: &str,
        operation: &str,
        entity_id: Option<Uuid>,
        payload: Value,
    ) -> ProposeRequest {
        ProposeRequest {
            tenant_id: self.tenant,
            user_id: self.agent,
            entity_type: entity_type.to_string(),
            entity_id,
            operation: operation.to_string(),
            payload,
        }
    }

    /// Propose and return the id of the resulting pending proposal.
    pub async fn propose_pending(
        &self,
        entity_type: &str,
        operation: &str,
        entity_id: Option<Uuid>,
        payload: Value,
    ) -> Uuid {
        self.service
            .propose(self.request(entity_type, operation, entity_id, payload))
            .await
            .expect("propose failed")
            .proposal_id()
            .expect("expected a pending proposal")
    }
}
