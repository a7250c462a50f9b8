//! PgEntityService - a generic JSONB entity service.
//!
//! One instance per entity kind. Typed inputs are stored as the
//! `attributes` document of an `entity_records` row; updates merge the
//! non-null fields of the update input over the stored document. Deletes
//! are soft (`deleted_at`).

use std::marker::PhantomData;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use proposal_types::EntityType;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use crate::entities::EntityService;

pub struct PgEntityService<C, U> {
    pool: PgPool,
    entity_type: EntityType,
    _inputs: PhantomData<fn() -> (C, U)>,
}

impl<C, U> PgEntityService<C, U> {
    pub fn new(pool: PgPool, entity_type: EntityType) -> Self {
        Self {
            pool,
            entity_type,
            _inputs: PhantomData,
        }
    }

    /// Live attributes of one record, if it exists and is not deleted.
    pub async fn find(&self, tenant_id: Uuid, entity_id: Uuid) -> Result<Option<JsonValue>> {
        let attributes = sqlx::query_scalar(
            r#"
            SELECT attributes
            FROM entity_records
            WHERE id = $1 AND tenant_id = $2 AND entity_type = $3 AND deleted_at IS NULL
            "#,
        )
        .bind(entity_id)
        .bind(tenant_id)
        .bind(self.entity_type.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(attributes)
    }
}

#[async_trait]
impl<C, U> EntityService for PgEntityService<C, U>
where
    C: Serialize + DeserializeOwned + Send + Sync + 'static,
    U: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    type CreateInput = C;
    type UpdateInput = U;

    async fn create(&self, tenant_id: Uuid, actor_id: Uuid, input: C) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let attributes = serde_json::to_value(&input)?;

        sqlx::query(
            r#"
            INSERT INTO entity_records (
                id, tenant_id, entity_type, attributes, created_by, updated_by
            )
            VALUES ($1, $2, $3, $4, $5, $5)
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .bind(self.entity_type.as_str())
        .bind(&attributes)
        .bind(actor_id)
        .execute(&self.pool)
        .await?;

        debug!("Inserted {} record {}", self.entity_type, id);
        Ok(id)
    }

    async fn update(
        &self,
        tenant_id: Uuid,
        actor_id: Uuid,
        entity_id: Uuid,
        input: U,
    ) -> Result<()> {
        let patch = strip_nulls(serde_json::to_value(&input)?);

        let result = sqlx::query(
            r#"
            UPDATE entity_records
            SET attributes = attributes || $4,
                updated_by = $5,
                updated_at = now()
            WHERE id = $1 AND tenant_id = $2 AND entity_type = $3 AND deleted_at IS NULL
            "#,
        )
        .bind(entity_id)
        .bind(tenant_id)
        .bind(self.entity_type.as_str())
        .bind(&patch)
        .bind(actor_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(anyhow!("{} {} not found", self.entity_type, entity_id));
        }
        Ok(())
    }

    async fn delete(&self, tenant_id: Uuid, actor_id: Uuid, entity_id: Uuid) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE entity_records
            SET deleted_at = now(), updated_by = $4, updated_at = now()
            WHERE id = $1 AND tenant_id = $2 AND entity_type = $3 AND deleted_at IS NULL
            "#,
        )
        .bind(entity_id)
        .bind(tenant_id)
        .bind(self.entity_type.as_str())
        .bind(actor_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(anyhow!("{} {} not found", self.entity_type, entity_id));
        }
        Ok(())
    }
}

/// Drop null members so an update only touches the fields it names.
fn strip_nulls(value: JsonValue) -> JsonValue {
    match value {
        JsonValue::Object(map) => {
            JsonValue::Object(map.into_iter().filter(|(_, v)| !v.is_null()).collect())
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::inputs::ContactUpdateInput;
    use serde_json::json;

    #[test]
    fn test_update_patch_omits_unset_fields() {
        let input = ContactUpdateInput {
            email: Some("ada@example.com".into()),
            ..Default::default()
        };
        let patch = strip_nulls(serde_json::to_value(&input).unwrap());
        assert_eq!(patch, json!({"email": "ada@example.com"}));
    }
}
