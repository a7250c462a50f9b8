//! Approval Gateway REST API Server
//!
//! ## Usage
//!
//! ```bash
//! # Start the server
//! DATABASE_URL=postgresql://localhost/gateway cargo run --bin approval_gateway_server --features server
//!
//! # Propose a contact creation
//! curl -X POST http://localhost:3000/api/proposals \
//!   -H "Content-Type: application/json" \
//!   -d '{
//!     "tenant_id": "3f0c1b3e-8d7a-4a57-9a3e-6c1f0b9b2a11",
//!     "user_id": "9b1d2f4a-1c3e-4e5f-8a7b-6c5d4e3f2a10",
//!     "entity_type": "contact",
//!     "operation": "create",
//!     "payload": {"first_name": "Ada", "last_name": "Lovelace"}
//!   }'
//!
//! curl "http://localhost:3000/api/proposals/pending?tenant_id=3f0c1b3e-8d7a-4a57-9a3e-6c1f0b9b2a11"
//! curl http://localhost:3000/api/health
//! ```

use std::sync::Arc;

use anyhow::Context;
use proposal_types::EntityType;
use sqlx::PgPool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use approval_gateway::api::create_proposal_router;
use approval_gateway::database::{self, PgApprovalPolicy, PgEntityService, PgProposalStore};
use approval_gateway::execution::inputs::{
    AccountCreateInput, AccountUpdateInput, ContactCreateInput, ContactUpdateInput,
    IndividualCreateInput, IndividualUpdateInput, NoteCreateInput, NoteUpdateInput,
    OrganizationCreateInput, OrganizationUpdateInput, TaskCreateInput, TaskUpdateInput,
};
use approval_gateway::execution::DispatchingExecutor;
use approval_gateway::proposal::{
    ApprovalPolicy, ProposalService, RuleBasedValidator, StaticApprovalPolicy,
};
use approval_gateway::GatewayConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("approval_gateway=info,tower_http=info")),
        )
        .init();

    info!("Starting Approval Gateway REST API Server");

    let config = GatewayConfig::from_env()?;

    let pool = database::connect(&config.database_url, config.max_connections).await?;
    database::run_migrations(&pool)
        .await
        .context("Failed to apply migrations")?;
    info!("Database connection established");

    let policy: Arc<dyn ApprovalPolicy> = match &config.policy_file {
        Some(path) => {
            info!("Loading approval policy from {}", path.display());
            Arc::new(StaticApprovalPolicy::from_yaml_file(path)?)
        }
        None => Arc::new(PgApprovalPolicy::new(pool.clone())),
    };

    let service = ProposalService::new(
        Arc::new(PgProposalStore::new(pool.clone())),
        policy,
        Arc::new(RuleBasedValidator::new()),
        Arc::new(build_executor(&pool)),
    )
    .with_max_page_size(config.max_page_size);

    let app = create_proposal_router(Arc::new(service))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!("Server running on http://{}", config.bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}

fn build_executor(pool: &PgPool) -> DispatchingExecutor {
    let contacts = PgEntityService::<ContactCreateInput, ContactUpdateInput>::new(
        pool.clone(),
        EntityType::Contact,
    );
    let organizations = PgEntityService::<OrganizationCreateInput, OrganizationUpdateInput>::new(
        pool.clone(),
        EntityType::Organization,
    );
    let individuals = PgEntityService::<IndividualCreateInput, IndividualUpdateInput>::new(
        pool.clone(),
        EntityType::Individual,
    );
    let notes =
        PgEntityService::<NoteCreateInput, NoteUpdateInput>::new(pool.clone(), EntityType::Note);
    let tasks =
        PgEntityService::<TaskCreateInput, TaskUpdateInput>::new(pool.clone(), EntityType::Task);
    let accounts = PgEntityService::<AccountCreateInput, AccountUpdateInput>::new(
        pool.clone(),
        EntityType::Account,
    );

    DispatchingExecutor::builder()
        .contacts(Arc::new(contacts))
        .organizations(Arc::new(organizations))
        .individuals(Arc::new(individuals))
        .notes(Arc::new(notes))
        .tasks(Arc::new(tasks))
        .accounts(Arc::new(accounts))
        .build()
}
