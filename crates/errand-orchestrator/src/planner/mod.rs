//! Intent routing: request text in, validated plan out.
//!
//! The planner is a boundary trait so the routing strategy can be swapped
//! without touching the engine; [`RulePlanner`] is the built-in
//! deterministic implementation. Whatever the implementation returns, the
//! orchestrator re-validates the plan's structural invariants itself.

pub mod extract;
pub mod rules;

use async_trait::async_trait;
use thiserror::Error;

use errand_core::{Plan, PlanError, ToolDescriptor};

pub use rules::RulePlanner;

/// Errors from turning request text into a plan.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlannerError {
    /// No combination of the available tools can serve the request. This
    /// is all-or-nothing: one unservable step rejects the whole request.
    #[error("{0}")]
    Unroutable(String),

    /// The planner assembled a structurally invalid plan.
    #[error(transparent)]
    InvalidPlan(#[from] PlanError),
}

/// Turns one natural-language request into a task plan, binding each step
/// to a tool from the available set.
#[async_trait]
pub trait Planner: Send + Sync {
    async fn plan(
        &self,
        request_text: &str,
        available_tools: &[ToolDescriptor],
    ) -> Result<Plan, PlannerError>;
}
