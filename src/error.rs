//! Error handling for the approval gateway
//!
//! `thiserror` enums for the three typed error surfaces: the proposal
//! lifecycle, operation dispatch, and configuration loading. External
//! collaborators (stores, policies, entity services) return
//! `anyhow::Result` and are wrapped at the boundary.

use proposal_types::{EntityType, Operation, ParseError, ProposalStatus};
use thiserror::Error;
use uuid::Uuid;

/// Errors raised by the proposal lifecycle.
#[derive(Error, Debug)]
pub enum ProposalError {
    #[error("Proposal {0} not found")]
    NotFound(Uuid),

    #[error("Proposal {id} is not pending (status: {status})")]
    NotPending { id: Uuid, status: ProposalStatus },

    #[error("Invalid entity type '{0}'")]
    InvalidEntityType(String),

    #[error("Invalid operation '{0}'")]
    InvalidOperation(String),

    #[error("Proposal {id} has {count} unresolved validation error(s)")]
    HasValidationErrors { id: Uuid, count: usize },

    /// Execution during approval failed; the cause is stored on the proposal.
    #[error("Execution of proposal {0} failed")]
    ExecutionFailed(Uuid),

    /// Execution failed on the immediate (no approval) path.
    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error("Proposal store error: {0}")]
    Store(#[source] anyhow::Error),

    #[error("Approval policy lookup failed: {0}")]
    Policy(#[source] anyhow::Error),
}

impl ProposalError {
    /// Short machine-readable kind, used in API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            ProposalError::NotFound(_) => "not_found",
            ProposalError::NotPending { .. } => "not_pending",
            ProposalError::InvalidEntityType(_) => "invalid_entity_type",
            ProposalError::InvalidOperation(_) => "invalid_operation",
            ProposalError::HasValidationErrors { .. } => "has_validation_errors",
            ProposalError::ExecutionFailed(_) => "execution_failed",
            ProposalError::Execution(e) => e.kind(),
            ProposalError::Store(_) => "store_error",
            ProposalError::Policy(_) => "policy_error",
        }
    }

    /// HTTP status code for this error kind.
    pub fn status_code(&self) -> u16 {
        match self {
            ProposalError::NotFound(_) => 404,
            ProposalError::NotPending { .. } => 409,
            ProposalError::InvalidEntityType(_)
            | ProposalError::InvalidOperation(_)
            | ProposalError::HasValidationErrors { .. } => 422,
            ProposalError::ExecutionFailed(_) => 502,
            ProposalError::Execution(e) => match e {
                ExecutionError::Deserialization { .. }
                | ExecutionError::MissingField { .. }
                | ExecutionError::UnsupportedEntityType(_)
                | ExecutionError::UnsupportedOperation { .. } => 422,
                ExecutionError::Service(_) => 502,
            },
            ProposalError::Store(_) | ProposalError::Policy(_) => 500,
        }
    }
}

impl From<ParseError> for ProposalError {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::UnknownEntityType(s) => ProposalError::InvalidEntityType(s),
            ParseError::UnknownOperation(s) => ProposalError::InvalidOperation(s),
            // Statuses are never caller input; a bad one came out of storage
            other @ ParseError::UnknownStatus(_) => ProposalError::Store(other.into()),
        }
    }
}

/// Errors raised while routing an operation to an entity service.
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Operation not supported for entity type '{0}'")]
    UnsupportedEntityType(EntityType),

    #[error("Operation '{operation}' not supported for entity type '{entity_type}'")]
    UnsupportedOperation {
        entity_type: EntityType,
        operation: Operation,
    },

    #[error("Failed to parse {entity_type} {operation} payload: {source}")]
    Deserialization {
        entity_type: EntityType,
        operation: Operation,
        #[source]
        source: serde_json::Error,
    },

    #[error("{field} is required for {entity_type} {operation}")]
    MissingField {
        field: &'static str,
        entity_type: EntityType,
        operation: Operation,
    },

    #[error("{0}")]
    Service(#[from] anyhow::Error),
}

impl ExecutionError {
    pub fn kind(&self) -> &'static str {
        match self {
            ExecutionError::UnsupportedEntityType(_) => "unsupported_entity_type",
            ExecutionError::UnsupportedOperation { .. } => "unsupported_operation",
            ExecutionError::Deserialization { .. } => "deserialization_failed",
            ExecutionError::MissingField { .. } => "missing_required_field",
            ExecutionError::Service(_) => "execution_error",
        }
    }
}

/// Errors raised while loading gateway configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {var}: {reason}")]
    InvalidValue { var: &'static str, reason: String },

    #[error("Failed to read policy file {path}: {source}")]
    PolicyFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse policy file {path}: {source}")]
    PolicyFileParse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}
