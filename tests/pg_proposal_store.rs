//! Integration tests for the Postgres proposal store and approval policy
//!
//! Requires: DATABASE_URL environment variable and `database` feature
//!
//! Run with:
//!   DATABASE_URL=postgresql://localhost/gateway_test \
//!     cargo test --features database --test pg_proposal_store -- --ignored

#![cfg(feature = "database")]

use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use approval_gateway::database::{self, PgApprovalPolicy, PgEntityService, PgProposalStore};
use approval_gateway::entities::EntityService;
use approval_gateway::execution::inputs::{ContactCreateInput, ContactUpdateInput};
use approval_gateway::proposal::{ApprovalPolicy, NewProposal, ProposalStore};
use approval_gateway::{EntityType, Operation, PageRequest, ProposalStatus, ValidationProblem};

/// Helper to get a migrated test database pool
async fn get_test_pool() -> PgPool {
    let database_url =
        std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for integration tests");
    let pool = PgPool::connect(&database_url)
        .await
        .expect("Failed to connect to test database");
    database::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");
    pool
}

fn new_contact(tenant_id: Uuid, problems: Option<Vec<ValidationProblem>>) -> NewProposal {
    NewProposal {
        tenant_id,
        proposed_by_id: Uuid::new_v4(),
        entity_type: EntityType::Contact,
        entity_id: None,
        operation: Operation::Create,
        payload: json!({"first_name": "Ada"}),
        validation_errors: problems,
    }
}

#[tokio::test]
#[ignore]
async fn test_create_round_trips_validation_errors() {
    let store = PgProposalStore::new(get_test_pool().await);
    let problems = vec![ValidationProblem::new("last_name", "is required")];

    let created = store
        .create(new_contact(Uuid::new_v4(), Some(problems.clone())))
        .await
        .unwrap();
    assert_eq!(created.status, ProposalStatus::Pending);

    let found = store.find_by_id(created.id).await.unwrap().unwrap();
    assert_eq!(found.validation_errors, Some(problems));
    assert_eq!(found.entity_type, EntityType::Contact);
}

#[tokio::test]
#[ignore]
async fn test_conditional_transition_is_exclusive() {
    let store = PgProposalStore::new(get_test_pool().await);
    let created = store.create(new_contact(Uuid::new_v4(), None)).await.unwrap();

    let (a, b) = tokio::join!(
        store.transition_status(
            created.id,
            ProposalStatus::Pending,
            ProposalStatus::Approved,
            Uuid::new_v4()
        ),
        store.transition_status(
            created.id,
            ProposalStatus::Pending,
            ProposalStatus::Approved,
            Uuid::new_v4()
        ),
    );
    assert!(a.unwrap() ^ b.unwrap(), "exactly one transition must win");

    store.mark_executed(created.id).await.unwrap();
    let executed = store.find_by_id(created.id).await.unwrap().unwrap();
    assert_eq!(executed.status, ProposalStatus::Executed);
    assert!(executed.executed_at.is_some());
    assert!(executed.reviewed_at.is_some());

    let moved = store
        .update_payload(created.id, &json!({"first_name": "Grace"}), None)
        .await
        .unwrap();
    assert!(!moved);
}

#[tokio::test]
#[ignore]
async fn test_outcome_write_never_reopens_rejected() {
    let store = PgProposalStore::new(get_test_pool().await);
    let created = store.create(new_contact(Uuid::new_v4(), None)).await.unwrap();
    store
        .transition_status(
            created.id,
            ProposalStatus::Pending,
            ProposalStatus::Rejected,
            Uuid::new_v4(),
        )
        .await
        .unwrap();

    assert!(store.mark_executed(created.id).await.is_err());
    assert!(store.mark_failed(created.id, "late").await.is_err());

    let stored = store.find_by_id(created.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ProposalStatus::Rejected);
    assert!(stored.executed_at.is_none());
    assert!(stored.error_message.is_none());
}

#[tokio::test]
#[ignore]
async fn test_pending_pagination() {
    let store = PgProposalStore::new(get_test_pool().await);
    let tenant = Uuid::new_v4();
    for _ in 0..5 {
        store.create(new_contact(tenant, None)).await.unwrap();
    }

    let page = store
        .find_pending(tenant, PageRequest::new(2, 2))
        .await
        .unwrap();
    assert_eq!(page.total, 5);
    assert_eq!(page.items.len(), 2);
}

#[tokio::test]
#[ignore]
async fn test_policy_defaults_to_required() {
    let policy = PgApprovalPolicy::new(get_test_pool().await);
    let tenant = Uuid::new_v4();

    assert!(policy.requires_approval(tenant, EntityType::Task).await.unwrap());

    policy
        .set_requires_approval(tenant, EntityType::Task, false)
        .await
        .unwrap();
    assert!(!policy.requires_approval(tenant, EntityType::Task).await.unwrap());
    assert!(policy.requires_approval(tenant, EntityType::Note).await.unwrap());
}

#[tokio::test]
#[ignore]
async fn test_entity_records_merge_and_soft_delete() {
    let contacts = PgEntityService::<ContactCreateInput, ContactUpdateInput>::new(
        get_test_pool().await,
        EntityType::Contact,
    );
    let tenant = Uuid::new_v4();
    let actor = Uuid::new_v4();

    let input: ContactCreateInput =
        serde_json::from_value(json!({"first_name": "Ada", "last_name": "Lovelace"})).unwrap();
    let id = contacts.create(tenant, actor, input).await.unwrap();

    let update = ContactUpdateInput {
        email: Some("ada@example.com".into()),
        ..Default::default()
    };
    contacts.update(tenant, actor, id, update).await.unwrap();

    let stored = contacts.find(tenant, id).await.unwrap().unwrap();
    assert_eq!(stored["first_name"], "Ada");
    assert_eq!(stored["email"], "ada@example.com");

    // Other tenants cannot see the record
    assert!(contacts.find(Uuid::new_v4(), id).await.unwrap().is_none());

    contacts.delete(tenant, actor, id).await.unwrap();
    assert!(contacts.find(tenant, id).await.unwrap().is_none());
    assert!(contacts.delete(tenant, actor, id).await.is_err());
}
