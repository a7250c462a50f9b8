//! Proposal lifecycle: policy, validation, persistence and orchestration.

pub mod policy;
pub mod service;
pub mod store;
pub mod validator;

pub use policy::{ApprovalPolicy, StaticApprovalPolicy};
pub use service::{ProposalService, ProposeRequest, DEFAULT_MAX_PAGE_SIZE};
pub use store::{InMemoryProposalStore, NewProposal, ProposalStore};
pub use validator::{PayloadValidator, RuleBasedValidator};
