//! PgProposalStore - `ProposalStore` over the `proposals` table.
//!
//! Status transitions are single conditional `UPDATE ... WHERE status = $from`
//! statements; `rows_affected() == 0` means another writer got there first.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use proposal_types::{Page, PageRequest, Proposal, ProposalStatus, ValidationProblem};
use sqlx::PgPool;
use uuid::Uuid;

use crate::proposal::store::{NewProposal, ProposalStore};

const PROPOSAL_COLUMNS: &str = r#"
    id, tenant_id, proposed_by_id, entity_type, entity_id, operation,
    payload, status, validation_errors, reviewed_by_id, reviewed_at,
    executed_at, error_message, created_at, updated_at
"#;

#[derive(Clone)]
pub struct PgProposalStore {
    pool: PgPool,
}

impl PgProposalStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ProposalStore for PgProposalStore {
    async fn create(&self, new: NewProposal) -> Result<Proposal> {
        let validation_errors = new
            .validation_errors
            .as_ref()
            .map(serde_json::to_value)
            .transpose()?;

        let row = sqlx::query_as::<_, ProposalRow>(&format!(
            r#"
            INSERT INTO proposals (
                id, tenant_id, proposed_by_id, entity_type, entity_id,
                operation, payload, status, validation_errors
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending', $8)
            RETURNING {PROPOSAL_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(new.tenant_id)
        .bind(new.proposed_by_id)
        .bind(new.entity_type.as_str())
        .bind(new.entity_id)
        .bind(new.operation.as_str())
        .bind(&new.payload)
        .bind(validation_errors)
        .fetch_one(&self.pool)
        .await
        .context("Failed to insert proposal")?;

        row.into_proposal()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Proposal>> {
        let row = sqlx::query_as::<_, ProposalRow>(&format!(
            "SELECT {PROPOSAL_COLUMNS} FROM proposals WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ProposalRow::into_proposal).transpose()
    }

    async fn find_pending(&self, tenant_id: Uuid, page: PageRequest) -> Result<Page<Proposal>> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM proposals WHERE tenant_id = $1 AND status = 'pending'",
        )
        .bind(tenant_id)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, ProposalRow>(&format!(
            r#"
            SELECT {PROPOSAL_COLUMNS}
            FROM proposals
            WHERE tenant_id = $1 AND status = 'pending'
            ORDER BY created_at ASC, id ASC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(tenant_id)
        .bind(i64::from(page.page_size))
        .bind(i64::try_from(page.offset()).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        let items = rows
            .into_iter()
            .map(ProposalRow::into_proposal)
            .collect::<Result<Vec<_>>>()?;

        Ok(Page {
            items,
            total: u64::try_from(total).unwrap_or_default(),
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

        let result = sqlx::query(
            r#"
            UPDATE proposals
            SET status = $3,
                reviewed_by_id = $4,
                reviewed_at = now(),
                updated_at = now()
            WHERE id = $1 AND status = $2
            "#,
        )
        .bind(id)
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(reviewer_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn mark_executed(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE proposals
            SET status = 'executed', executed_at = now(), updated_at = now()
            WHERE id = $1 AND status = 'approved'
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(anyhow!("Proposal {} is not approved or does not exist", id));
        }
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, message: &str) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE proposals
            SET status = 'failed', error_message = $2, updated_at = now()
            WHERE id = $1 AND status = 'approved'
            "#,
        )
        .bind(id)
        .bind(message)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(anyhow!("Proposal {} is not approved or does not exist", id));
        }
        Ok(())
    }

    async fn update_payload(
        &self,
        id: Uuid,
        payload: &serde_json::Value,
        validation_errors: Option<&[ValidationProblem]>,
    ) -> Result<bool> {
        let validation_errors = validation_errors.map(serde_json::to_value).transpose()?;

        let result = sqlx::query(
            r#"
            UPDATE proposals
            SET payload = $2, validation_errors = $3, updated_at = now()
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(payload)
        .bind(validation_errors)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

// ═══════════════════════════════════════════════════════════════════
//  Internal row type for sqlx::FromRow
// ═══════════════════════════════════════════════════════════════════

#[derive(sqlx::FromRow)]
struct ProposalRow {
    id: Uuid,
    tenant_id: Uuid,
    proposed_by_id: Uuid,
    entity_type: String,
    entity_id: Option<Uuid>,
    operation: String,
    payload: serde_json::Value,
    status: String,
    validation_errors: Option<serde_json::Value>,
    reviewed_by_id: Option<Uuid>,
    reviewed_at: Option<DateTime<Utc>>,
    executed_at: Option<DateTime<Utc>>,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ProposalRow {
    fn into_proposal(self) -> Result<Proposal> {
        let validation_errors = self
            .validation_errors
            .map(serde_json::from_value::<Vec<ValidationProblem>>)
            .transpose()
            .with_context(|| format!("Malformed validation_errors on proposal {}", self.id))?;

        Ok(Proposal {
            id: self.id,
            tenant_id: self.tenant_id,
            proposed_by_id: self.proposed_by_id,
            entity_type: self.entity_type.parse()?,
            entity_id: self.entity_id,
            operation: self.operation.parse()?,
            payload: self.payload,
            status: self.status.parse()?,
            validation_errors,
            reviewed_by_id: self.reviewed_by_id,
            reviewed_at: self.reviewed_at,
            executed_at: self.executed_at,
            error_message: self.error_message,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
