//! Entity service capabilities.
//!
//! The concrete contact/organization/individual/note/task/account services
//! live outside the gateway. The executor only needs their
//! create/update/delete capabilities, expressed by `EntityService` with the
//! typed inputs from `execution::inputs`.

use anyhow::Result;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::execution::inputs::{
    AccountCreateInput, AccountUpdateInput, ContactCreateInput, ContactUpdateInput,
    IndividualCreateInput, IndividualUpdateInput, NoteCreateInput, NoteUpdateInput,
    OrganizationCreateInput, OrganizationUpdateInput, TaskCreateInput, TaskUpdateInput,
};

/// Create/update/delete capability of a single entity kind.
///
/// `actor_id` is the user on whose behalf the change is made: the proposer
/// for immediate execution, the reviewer for approved proposals.
#[async_trait]
pub trait EntityService: Send + Sync {
    type CreateInput: DeserializeOwned + Send + 'static;
    type UpdateInput: DeserializeOwned + Send + 'static;

    /// Create the entity and return its id.
    async fn create(&self, tenant_id: Uuid, actor_id: Uuid, input: Self::CreateInput)
        -> Result<Uuid>;

    async fn update(
        &self,
        tenant_id: Uuid,
        actor_id: Uuid,
        entity_id: Uuid,
        input: Self::UpdateInput,
    ) -> Result<()>;

    async fn delete(&self, tenant_id: Uuid, actor_id: Uuid, entity_id: Uuid) -> Result<()>;
}

pub type ContactService =
    dyn EntityService<CreateInput = ContactCreateInput, UpdateInput = ContactUpdateInput>;

pub type OrganizationService = dyn EntityService<
    CreateInput = OrganizationCreateInput,
    UpdateInput = OrganizationUpdateInput,
>;

pub type IndividualService =
    dyn EntityService<CreateInput = IndividualCreateInput, UpdateInput = IndividualUpdateInput>;

pub type NoteService =
    dyn EntityService<CreateInput = NoteCreateInput, UpdateInput = NoteUpdateInput>;

pub type TaskService =
    dyn EntityService<CreateInput = TaskCreateInput, UpdateInput = TaskUpdateInput>;

pub type AccountService =
    dyn EntityService<CreateInput = AccountCreateInput, UpdateInput = AccountUpdateInput>;
