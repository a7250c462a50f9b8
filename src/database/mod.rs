//! Postgres persistence for the gateway.
//!
//! - `PgProposalStore`: proposals and their status transitions
//! - `PgApprovalPolicy`: per-tenant approval switches
//! - `PgEntityService`: JSONB-backed entity services used by the server binary

use std::time::Duration;

use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::{info, warn};

pub mod approval_policy;
pub mod entity_records;
pub mod proposal_store;

pub use approval_policy::PgApprovalPolicy;
pub use entity_records::PgEntityService;
pub use proposal_store::PgProposalStore;

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// Open a connection pool.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    info!("Connecting to database: {}", mask_database_url(database_url));

    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .idle_timeout(Some(Duration::from_secs(600)))
        .connect(database_url)
        .await
        .map_err(|e| {
            warn!("Failed to connect to database: {}", e);
            e
        })
}

/// Apply the bundled migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    info!("Running database migrations");
    sqlx::migrate!("./migrations").run(pool).await
}

/// Hide the password component of a connection string for logging.
fn mask_database_url(database_url: &str) -> String {
    match url::Url::parse(database_url) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("***"));
            }
            parsed.to_string()
        }
        // Unparseable strings may still carry credentials
        Err(_) => "***".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_database_url() {
        assert_eq!(
            mask_database_url("postgres://gw:s3cret@db:5432/gateway"),
            "postgres://gw:***@db:5432/gateway"
        );
        assert_eq!(
            mask_database_url("postgres://localhost/gateway"),
            "postgres://localhost/gateway"
        );
    }

    #[test]
    fn test_mask_keeps_host_when_query_contains_at_sign() {
        let masked = mask_database_url(
            "postgres://gw:s3cret@db:5432/gateway?application_name=ops@eu",
        );
        assert!(!masked.contains("s3cret"));
        assert!(masked.starts_with("postgres://gw:***@db:5432/gateway?"));
        assert!(masked.contains("application_name=ops"));
    }

    #[test]
    fn test_mask_unparseable_url() {
        assert_eq!(mask_database_url("not a url with s3cret"), "***");
    }
}
