//! Approval policy lookup.
//!
//! Decides, per tenant and entity type, whether a proposed mutation must
//! wait for a reviewer or may run immediately.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use proposal_types::EntityType;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ConfigError;

/// Per-tenant, per-entity-type approval switch.
#[async_trait]
pub trait ApprovalPolicy: Send + Sync {
    async fn requires_approval(&self, tenant_id: Uuid, entity_type: EntityType) -> Result<bool>;
}

/// On-disk shape of a policy file.
///
/// ```yaml
/// default_requires_approval: true
/// tenants:
///   3f0c1b3e-8d7a-4a57-9a3e-6c1f0b9b2a11:
///     contact: true
///     task: false
/// ```
#[derive(Debug, Clone, Deserialize)]
struct PolicyFile {
    #[serde(default = "default_true")]
    default_requires_approval: bool,
    #[serde(default)]
    tenants: HashMap<Uuid, HashMap<EntityType, bool>>,
}

fn default_true() -> bool {
    true
}

/// In-memory policy with a global default and per-tenant overrides.
#[derive(Debug, Clone)]
pub struct StaticApprovalPolicy {
    default_requires_approval: bool,
    overrides: HashMap<(Uuid, EntityType), bool>,
}

impl StaticApprovalPolicy {
    pub fn new(default_requires_approval: bool) -> Self {
        Self {
            default_requires_approval,
            overrides: HashMap::new(),
        }
    }

    /// Every entity type for every tenant requires approval unless overridden.
    pub fn require_all() -> Self {
        Self::new(true)
    }

    pub fn with_rule(mut self, tenant_id: Uuid, entity_type: EntityType, required: bool) -> Self {
        self.set_rule(tenant_id, entity_type, required);
        self
    }

    pub fn set_rule(&mut self, tenant_id: Uuid, entity_type: EntityType, required: bool) {
        self.overrides.insert((tenant_id, entity_type), required);
    }

    /// Parse a YAML policy document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, serde_yaml::Error> {
        let file: PolicyFile = serde_yaml::from_str(yaml)?;
        let mut policy = Self::new(file.default_requires_approval);
        for (tenant_id, rules) in file.tenants {
            for (entity_type, required) in rules {
                policy.set_rule(tenant_id, entity_type, required);
            }
        }
        Ok(policy)
    }

    /// Load a YAML policy file from disk.
    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::PolicyFileIo {
            path: display.clone(),
            source,
        })?;
        Self::from_yaml_str(&raw).map_err(|source| ConfigError::PolicyFileParse {
            path: display,
            source,
        })
    }

    fn lookup(&self, tenant_id: Uuid, entity_type: EntityType) -> bool {
        self.overrides
            .get(&(tenant_id, entity_type))
            .copied()
            .unwrap_or(self.default_requires_approval)
    }
}

impl Default for StaticApprovalPolicy {
    fn default() -> Self {
        Self::require_all()
    }
}

#[async_trait]
impl ApprovalPolicy for StaticApprovalPolicy {
    async fn requires_approval(&self, tenant_id: Uuid, entity_type: EntityType) -> Result<bool> {
        Ok(self.lookup(tenant_id, entity_type))
    }
}
