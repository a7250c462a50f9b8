//! PgApprovalPolicy - approval switches stored in `approval_settings`.

use anyhow::Result;
use async_trait::async_trait;
use proposal_types::EntityType;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use crate::proposal::policy::ApprovalPolicy;

/// Reads `(tenant_id, entity_type) -> requires_approval`.
///
/// A missing row means approval is required.
#[derive(Clone)]
pub struct PgApprovalPolicy {
    pool: PgPool,
}

impl PgApprovalPolicy {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert or replace the switch for one tenant/entity type.
    pub async fn set_requires_approval(
        &self,
        tenant_id: Uuid,
        entity_type: EntityType,
        requires_approval: bool,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO approval_settings (tenant_id, entity_type, requires_approval)
            VALUES ($1, $2, $3)
            ON CONFLICT (tenant_id, entity_type)
            DO UPDATE SET requires_approval = EXCLUDED.requires_approval,
                          updated_at = now()
            "#,
        )
        .bind(tenant_id)
        .bind(entity_type.as_str())
        .bind(requires_approval)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ApprovalPolicy for PgApprovalPolicy {
    async fn requires_approval(&self, tenant_id: Uuid, entity_type: EntityType) -> Result<bool> {
        let setting: Option<bool> = sqlx::query_scalar(
            r#"
            SELECT requires_approval
            FROM approval_settings
            WHERE tenant_id = $1 AND entity_type = $2
            "#,
        )
        .bind(tenant_id)
        .bind(entity_type.as_str())
        .fetch_optional(&self.pool)
        .await?;

        if setting.is_none() {
            debug!(
                tenant_id = %tenant_id,
                "No approval setting for {}, requiring approval",
                entity_type
            );
        }
        Ok(setting.unwrap_or(true))
    }
}
