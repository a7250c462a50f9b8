//! Approval Gateway - human-in-the-loop control for agent-initiated mutations
//!
//! Agents propose create/update/delete operations on CRM entities. Depending
//! on tenant policy a proposal either runs immediately or is parked as
//! `pending` until a reviewer approves (and it executes) or rejects it.
//!
//! ## Call chain
//! propose -> policy -> validate -> store (pending)
//! approve -> conditional transition -> OperationExecutor -> entity service
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use approval_gateway::execution::DispatchingExecutor;
//! use approval_gateway::proposal::{
//!     InMemoryProposalStore, ProposalService, RuleBasedValidator, StaticApprovalPolicy,
//! };
//!
//! let executor = DispatchingExecutor::builder().build();
//! let service = ProposalService::new(
//!     Arc::new(InMemoryProposalStore::new()),
//!     Arc::new(StaticApprovalPolicy::require_all()),
//!     Arc::new(RuleBasedValidator::new()),
//!     Arc::new(executor),
//! );
//! ```

// Core error handling
pub mod error;

// Environment and policy-file configuration
pub mod config;

// Entity service capabilities the executor dispatches onto
pub mod entities;

// Operation execution (dispatch table + typed inputs)
pub mod execution;

// Proposal lifecycle
pub mod proposal;

// Postgres-backed store, policy and entity records (when enabled)
#[cfg(feature = "database")]
pub mod database;

// REST API (when enabled)
#[cfg(feature = "server")]
pub mod api;

pub use config::GatewayConfig;
pub use error::{ConfigError, ExecutionError, ProposalError};
pub use execution::{DispatchingExecutor, ExecutionRequest, OperationExecutor};
pub use proposal::{
    ApprovalPolicy, InMemoryProposalStore, PayloadValidator, ProposalService, ProposalStore,
    ProposeRequest, RuleBasedValidator, StaticApprovalPolicy,
};
pub use proposal_types::{
    BulkItemError, BulkOutcome, EntityType, Operation, Page, PageRequest, Proposal,
    ProposalResponse, ProposalStatus, ProposeResponse, ValidationProblem,
};

#[cfg(feature = "database")]
pub use database::{PgApprovalPolicy, PgEntityService, PgProposalStore};
