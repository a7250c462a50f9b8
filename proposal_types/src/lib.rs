//! Proposal Types - Foundation Types for the Approval Gateway
//!
//! This crate contains the pure data structures shared by the gateway and
//! anything that talks to it: the closed entity-type and operation
//! enumerations, the proposal record and its status machine, validation
//! problems, and the response shapes returned to callers.
//!
//! ## Critical Rules
//!
//! 1. **NO BUSINESS LOGIC** - Only data structures, parsing and predicates
//! 2. **NO WORKSPACE DEPENDENCIES** - Cannot depend on other workspace crates
//! 3. **SERIALIZABLE** - All types must support serde

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// PARSE ERRORS
// ============================================================================

/// Raised when a raw string does not name a member of a closed enumeration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("Unknown entity type '{0}'")]
    UnknownEntityType(String),

    #[error("Unknown operation '{0}'")]
    UnknownOperation(String),

    #[error("Unknown proposal status '{0}'")]
    UnknownStatus(String),
}

// ============================================================================
// ENTITY TYPE
// ============================================================================

/// The closed set of entity kinds a proposal may target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Contact,
    Organization,
    Individual,
    Note,
    Task,
    Account,
}

impl EntityType {
    /// Every supported entity type, in declaration order.
    pub const ALL: [EntityType; 6] = [
        EntityType::Contact,
        EntityType::Organization,
        EntityType::Individual,
        EntityType::Note,
        EntityType::Task,
        EntityType::Account,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Contact => "contact",
            EntityType::Organization => "organization",
            EntityType::Individual => "individual",
            EntityType::Note => "note",
            EntityType::Task => "task",
            EntityType::Account => "account",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ParseError::UnknownEntityType(s.to_string()))
    }
}

// ============================================================================
// OPERATION
// ============================================================================

/// The mutation a proposal asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl Operation {
    pub const ALL: [Operation; 3] = [Operation::Create, Operation::Update, Operation::Delete];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }

    /// Update and delete address an existing entity; create does not.
    pub fn requires_entity_id(&self) -> bool {
        matches!(self, Operation::Update | Operation::Delete)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .iter()
            .copied()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| ParseError::UnknownOperation(s.to_string()))
    }
}

// ============================================================================
// PROPOSAL STATUS
// ============================================================================

/// Lifecycle state of a proposal.
///
/// ```text
/// pending ──► approved ──► executed
///    │            └──────► failed
///    └──────► rejected
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    Pending,
    Approved,
    Rejected,
    Executed,
    Failed,
}

impl ProposalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProposalStatus::Pending => "pending",
            ProposalStatus::Approved => "approved",
            ProposalStatus::Rejected => "rejected",
            ProposalStatus::Executed => "executed",
            ProposalStatus::Failed => "failed",
        }
    }

    /// Rejected, executed and failed proposals never move again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProposalStatus::Rejected | ProposalStatus::Executed | ProposalStatus::Failed
        )
    }

    /// Whether `self -> next` is an edge of the state machine.
    pub fn can_transition_to(&self, next: ProposalStatus) -> bool {
        matches!(
            (self, next),
            (ProposalStatus::Pending, ProposalStatus::Approved)
                | (ProposalStatus::Pending, ProposalStatus::Rejected)
                | (ProposalStatus::Approved, ProposalStatus::Executed)
                | (ProposalStatus::Approved, ProposalStatus::Failed)
        )
    }
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProposalStatus {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ProposalStatus::Pending),
            "approved" => Ok(ProposalStatus::Approved),
            "rejected" => Ok(ProposalStatus::Rejected),
            "executed" => Ok(ProposalStatus::Executed),
            "failed" => Ok(ProposalStatus::Failed),
            other => Err(ParseError::UnknownStatus(other.to_string())),
        }
    }
}

// ============================================================================
// VALIDATION
// ============================================================================

/// A field-level problem found in a proposed payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationProblem {
    /// Payload field the problem refers to (`payload` for the whole body)
    pub field: String,
    /// Human-readable description
    pub message: String,
}

impl ValidationProblem {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

// ============================================================================
// PROPOSAL
// ============================================================================

/// A persisted request for a mutation awaiting, or having received, review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub proposed_by_id: Uuid,
    pub entity_type: EntityType,
    /// Absent for create
    pub entity_id: Option<Uuid>,
    pub operation: Operation,
    /// Entity- and operation-specific body; only the execution handler knows its shape
    pub payload: serde_json::Value,
    pub status: ProposalStatus,
    /// `None` means no known problems
    pub validation_errors: Option<Vec<ValidationProblem>>,
    pub reviewed_by_id: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub executed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Proposal {
    /// True when the stored validation outcome blocks approval.
    pub fn has_validation_errors(&self) -> bool {
        self.validation_errors
            .as_ref()
            .is_some_and(|problems| !problems.is_empty())
    }
}

// ============================================================================
// RESPONSES
// ============================================================================

/// Caller-facing representation of a stored proposal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalResponse {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub proposed_by_id: Uuid,
    pub entity_type: EntityType,
    pub entity_id: Option<Uuid>,
    pub operation: Operation,
    pub payload: serde_json::Value,
    pub status: ProposalStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_errors: Option<Vec<ValidationProblem>>,
    pub reviewed_by_id: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub executed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Proposal> for ProposalResponse {
    fn from(p: Proposal) -> Self {
        // An empty list and an absent list mean the same thing to callers
        let validation_errors = p.validation_errors.filter(|v| !v.is_empty());
        Self {
            id: p.id,
            tenant_id: p.tenant_id,
            proposed_by_id: p.proposed_by_id,
            entity_type: p.entity_type,
            entity_id: p.entity_id,
            operation: p.operation,
            payload: p.payload,
            status: p.status,
            validation_errors,
            reviewed_by_id: p.reviewed_by_id,
            reviewed_at: p.reviewed_at,
            executed_at: p.executed_at,
            error_message: p.error_message,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

/// Returned when policy allowed the operation to run without review.
/// Nothing was persisted, so there is no proposal id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImmediateExecutionResponse {
    pub status: ProposalStatus,
    pub message: String,
}

/// Outcome of proposing an operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProposeResponse {
    /// Approval required: a pending proposal was stored
    Pending(ProposalResponse),
    /// Approval not required: the operation already ran
    Executed(ImmediateExecutionResponse),
}

impl ProposeResponse {
    pub fn status(&self) -> ProposalStatus {
        match self {
            ProposeResponse::Pending(p) => p.status,
            ProposeResponse::Executed(e) => e.status,
        }
    }

    /// The stored proposal id, if one was created.
    pub fn proposal_id(&self) -> Option<Uuid> {
        match self {
            ProposeResponse::Pending(p) => Some(p.id),
            ProposeResponse::Executed(_) => None,
        }
    }
}

// ============================================================================
// PAGINATION
// ============================================================================

/// 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self { page, page_size }
    }

    /// Clamp into `page >= 1` and `1 <= page_size <= max_page_size`.
    pub fn normalized(self, max_page_size: u32) -> Self {
        Self {
            page: self.page.max(1),
            page_size: self.page_size.clamp(1, max_page_size.max(1)),
        }
    }

    /// Number of rows to skip.
    pub fn offset(&self) -> u64 {
        u64::from(self.page.max(1) - 1) * u64::from(self.page_size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 20,
        }
    }
}

/// One page of results plus the total match count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            page_size: self.page_size,
        }
    }
}

// ============================================================================
// BULK OPERATIONS
// ============================================================================

/// Failure of a single id within a bulk request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkItemError {
    pub proposal_id: Uuid,
    pub error: String,
}

/// Partial-success result of a bulk approve/reject.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BulkOutcome {
    pub results: Vec<ProposalResponse>,
    pub errors: Vec<BulkItemError>,
}
