//! Dispatching Executor - routes operations to entity services
//!
//! Two-level lookup: `EntityType -> Operation -> Handler`. Adding a new
//! entity kind is one `register_entity` call; nothing else changes.
//! - Must NOT persist anything; it only routes
//! - An entity type with no table entry is unsupported
//! - An operation missing from an entity's row is unsupported

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use proposal_types::{EntityType, Operation};
use tracing::debug;

use super::handlers::{entity_handlers, Handler};
use super::{ExecutionRequest, OperationExecutor};
use crate::entities::{
    AccountService, ContactService, EntityService, IndividualService, NoteService,
    OrganizationService, TaskService,
};
use crate::error::ExecutionError;

/// Executor that dispatches on `(entity_type, operation)`.
pub struct DispatchingExecutor {
    routes: HashMap<EntityType, HashMap<Operation, Handler>>,
}

impl DispatchingExecutor {
    pub fn builder() -> DispatchingExecutorBuilder {
        DispatchingExecutorBuilder::default()
    }

    /// Whether a handler is registered for this pair.
    pub fn supports(&self, entity_type: EntityType, operation: Operation) -> bool {
        self.routes
            .get(&entity_type)
            .is_some_and(|ops| ops.contains_key(&operation))
    }

    fn route(
        &self,
        entity_type: EntityType,
        operation: Operation,
    ) -> Result<&Handler, ExecutionError> {
        let operations = self
            .routes
            .get(&entity_type)
            .ok_or(ExecutionError::UnsupportedEntityType(entity_type))?;
        operations
            .get(&operation)
            .ok_or(ExecutionError::UnsupportedOperation {
                entity_type,
                operation,
            })
    }
}

#[async_trait]
impl OperationExecutor for DispatchingExecutor {
    async fn execute(&self, request: ExecutionRequest) -> Result<(), ExecutionError> {
        let handler = self.route(request.entity_type, request.operation)?;
        debug!(
            entity_type = %request.entity_type,
            operation = %request.operation,
            entity_id = ?request.entity_id,
            "Dispatching operation"
        );
        handler(request).await
    }
}

/// Builder for the dispatch table.
#[derive(Default)]
pub struct DispatchingExecutorBuilder {
    routes: HashMap<EntityType, HashMap<Operation, Handler>>,
}

impl DispatchingExecutorBuilder {
    /// Route create/update/delete for `entity_type` to `service`.
    pub fn register_entity<S>(mut self, entity_type: EntityType, service: Arc<S>) -> Self
    where
        S: EntityService + ?Sized + 'static,
    {
        self.routes
            .entry(entity_type)
            .or_default()
            .extend(entity_handlers(service));
        self
    }

    /// Route a single `(entity_type, operation)` cell to a custom handler.
    pub fn register_handler(
        mut self,
        entity_type: EntityType,
        operation: Operation,
        handler: Handler,
    ) -> Self {
        self.routes
            .entry(entity_type)
            .or_default()
            .insert(operation, handler);
        self
    }

    pub fn contacts(self, service: Arc<ContactService>) -> Self {
        self.register_entity(EntityType::Contact, service)
    }

    pub fn organizations(self, service: Arc<OrganizationService>) -> Self {
        self.register_entity(EntityType::Organization, service)
    }

    pub fn individuals(self, service: Arc<IndividualService>) -> Self {
        self.register_entity(EntityType::Individual, service)
    }

    pub fn notes(self, service: Arc<NoteService>) -> Self {
        self.register_entity(EntityType::Note, service)
    }

    pub fn tasks(self, service: Arc<TaskService>) -> Self {
        self.register_entity(EntityType::Task, service)
    }

    pub fn accounts(self, service: Arc<AccountService>) -> Self {
        self.register_entity(EntityType::Account, service)
    }

    pub fn build(self) -> DispatchingExecutor {
        DispatchingExecutor {
            routes: self.routes,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
