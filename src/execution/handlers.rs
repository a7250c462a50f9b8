//! Per-entity execution handlers.
//!
//! Each handler is a small async function of the request: it deserializes
//! the payload into the entity's typed input (create/update), checks that
//! an entity id is present (update/delete), and calls the entity service.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use proposal_types::Operation;
use serde::de::DeserializeOwned;
use tracing::{debug, info};
use uuid::Uuid;

use super::ExecutionRequest;
use crate::entities::EntityService;
use crate::error::ExecutionError;

/// A routed operation: one `(entity type, operation)` cell of the dispatch table.
pub type Handler =
    Arc<dyn Fn(ExecutionRequest) -> BoxFuture<'static, Result<(), ExecutionError>> + Send + Sync>;

/// Build the create/update/delete handlers for one entity service.
pub fn entity_handlers<S>(service: Arc<S>) -> HashMap<Operation, Handler>
where
    S: EntityService + ?Sized + 'static,
{
    HashMap::from([
        (Operation::Create, create_handler(Arc::clone(&service))),
        (Operation::Update, update_handler(Arc::clone(&service))),
        (Operation::Delete, delete_handler(service)),
    ])
}

pub fn create_handler<S>(service: Arc<S>) -> Handler
where
    S: EntityService + ?Sized + 'static,
{
    Arc::new(move |request: ExecutionRequest| {
        let service = Arc::clone(&service);
        async move {
            let (tenant_id, user_id, entity_type) =
                (request.tenant_id, request.user_id, request.entity_type);
            let input: S::CreateInput = parse_payload(request)?;
            let created_id = service.create(tenant_id, user_id, input).await?;
            info!("Created {} {} on behalf of {}", entity_type, created_id, user_id);
            Ok::<(), ExecutionError>(())
        }
        .boxed()
    })
}

pub fn update_handler<S>(service: Arc<S>) -> Handler
where
    S: EntityService + ?Sized + 'static,
{
    Arc::new(move |request: ExecutionRequest| {
        let service = Arc::clone(&service);
        async move {
            let entity_id = require_entity_id(&request)?;
            let (tenant_id, user_id, entity_type) =
                (request.tenant_id, request.user_id, request.entity_type);
            let input: S::UpdateInput = parse_payload(request)?;
            service.update(tenant_id, user_id, entity_id, input).await?;
            info!("Updated {} {} on behalf of {}", entity_type, entity_id, user_id);
            Ok::<(), ExecutionError>(())
        }
        .boxed()
    })
}

pub fn delete_handler<S>(service: Arc<S>) -> Handler
where
    S: EntityService + ?Sized + 'static,
{
    Arc::new(move |request: ExecutionRequest| {
        let service = Arc::clone(&service);
        async move {
            let entity_id = require_entity_id(&request)?;
            service
                .delete(request.tenant_id, request.user_id, entity_id)
                .await?;
            info!(
                "Deleted {} {} on behalf of {}",
                request.entity_type, entity_id, request.user_id
            );
            Ok::<(), ExecutionError>(())
        }
        .boxed()
    })
}

fn require_entity_id(request: &ExecutionRequest) -> Result<Uuid, ExecutionError> {
    request.entity_id.ok_or(ExecutionError::MissingField {
        field: "entity_id",
        entity_type: request.entity_type,
        operation: request.operation,
    })
}

fn parse_payload<T: DeserializeOwned>(request: ExecutionRequest) -> Result<T, ExecutionError> {
    let ExecutionRequest {
        entity_type,
        operation,
        payload,
        ..
    } = request;
    serde_json::from_value(payload).map_err(|source| {
        debug!("Rejected {} {} payload: {}", entity_type, operation, source);
        ExecutionError::Deserialization {
            entity_type,
            operation,
            source,
        }
    })
}
