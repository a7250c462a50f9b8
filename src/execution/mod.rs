//! Operation execution.
//!
//! `OperationExecutor` is the "apply this operation now" capability the
//! proposal service calls at the approval boundary (or immediately, when
//! policy does not require approval). `DispatchingExecutor` implements it by
//! routing `(entity type, operation)` through a two-level table onto entity
//! service handlers. It holds no state and performs no persistence.

pub mod dispatcher;
pub mod handlers;
pub mod inputs;

use async_trait::async_trait;
use proposal_types::{EntityType, Operation};
use uuid::Uuid;

use crate::error::ExecutionError;

pub use dispatcher::{DispatchingExecutor, DispatchingExecutorBuilder};
pub use handlers::Handler;

/// Everything needed to apply one operation.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionRequest {
    pub entity_type: EntityType,
    pub operation: Operation,
    /// Required for update and delete
    pub entity_id: Option<Uuid>,
    pub payload: serde_json::Value,
    pub tenant_id: Uuid,
    /// Actor recorded by the entity service
    pub user_id: Uuid,
}

/// Trait for applying an operation against the entity services.
///
/// In production this is the `DispatchingExecutor`. In tests, a stub
/// implementation can count or fail calls.
#[async_trait]
pub trait OperationExecutor: Send + Sync {
    async fn execute(&self, request: ExecutionRequest) -> Result<(), ExecutionError>;
}
