//! Request-fatal error taxonomy.
//!
//! These abort the whole request before any plan node produces a result.
//! Per-node trouble (tool failures, skips, cancellation) is reported inside
//! [`errand_core::TaskResult`]s instead and never surfaces here.

use thiserror::Error;

use errand_core::{CredentialError, PlanError};

use crate::planner::PlannerError;
use crate::pool::PoolError;
use crate::registry::RegistryError;

/// Fatal, request-scoped failures.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The user has no usable delegated credential. Fails fast: no worker
    /// is spawned and no plan is produced.
    #[error(transparent)]
    Credential(#[from] CredentialError),

    /// No combination of available tools can serve the request. The
    /// request has no side effects.
    #[error("Request is unroutable: {0}")]
    Unroutable(String),

    /// The planner produced a structurally invalid plan.
    #[error("Planner produced an invalid plan: {0}")]
    InvalidPlan(#[from] PlanError),

    /// A worker failed to start or to complete its handshake.
    #[error(transparent)]
    WorkerStartup(#[from] PoolError),

    /// Registry construction from the handshake manifests failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl From<PlannerError> for OrchestratorError {
    fn from(e: PlannerError) -> Self {
        match e {
            PlannerError::Unroutable(detail) => OrchestratorError::Unroutable(detail),
            PlannerError::InvalidPlan(e) => OrchestratorError::InvalidPlan(e),
        }
    }
}
