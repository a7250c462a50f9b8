//! REST API for the approval gateway.

pub mod proposal_routes;

pub use proposal_routes::{create_proposal_router, ApiError, ProposalState};
