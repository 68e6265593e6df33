//! Per-node execution outcomes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::NodeId;

/// Why a node failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The bound tool was absent from the registry at dispatch time.
    ToolNotFound,
    /// Arguments failed the local arity/type check; the worker was never
    /// contacted.
    ArgumentMismatch,
    /// The worker reported an error or died mid-invocation.
    Upstream,
    /// A dependency failed, so this node was never invoked.
    SkippedDueToDependency,
    /// The request was cancelled or timed out before this node finished.
    Cancelled,
}

impl FailureKind {
    /// Stable name used in transcripts and responses.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::ToolNotFound => "tool_not_found",
            FailureKind::ArgumentMismatch => "argument_mismatch",
            FailureKind::Upstream => "upstream_failure",
            FailureKind::SkippedDueToDependency => "skipped_due_to_dependency",
            FailureKind::Cancelled => "cancelled",
        }
    }
}

/// Outcome of one plan node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// The tool completed and returned a value.
    Success { value: Value },
    /// The node failed; `kind` classifies the failure.
    Failure { kind: FailureKind, message: String },
}

impl Outcome {
    /// Whether this outcome is a success.
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    /// The success value, if any.
    pub fn value(&self) -> Option<&Value> {
        match self {
            Outcome::Success { value } => Some(value),
            Outcome::Failure { .. } => None,
        }
    }
}

/// The single result record of one plan node.
///
/// Written exactly once per node by the task executor; never mutated after
/// the node completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    /// Node this result belongs to.
    pub node_id: NodeId,

    /// Tool the node was bound to, kept for auditability.
    pub tool_name: String,

    /// What happened.
    pub outcome: Outcome,
}

impl TaskResult {
    /// Record a success.
    pub fn success(node_id: NodeId, tool_name: impl Into<String>, value: Value) -> Self {
        Self {
            node_id,
            tool_name: tool_name.into(),
            outcome: Outcome::Success { value },
        }
    }

    /// Record a failure.
    pub fn failure(
        node_id: NodeId,
        tool_name: impl Into<String>,
        kind: FailureKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            node_id,
            tool_name: tool_name.into(),
            outcome: Outcome::Failure {
                kind,
                message: message.into(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_outcome() {
        let result = TaskResult::success(
            NodeId::new("node-1"),
            "calendar.create_event",
            json!({"link": "https://cal/e/1"}),
        );
        assert!(result.outcome.is_success());
        assert_eq!(result.outcome.value().unwrap()["link"], "https://cal/e/1");
    }

    #[test]
    fn test_failure_outcome() {
        let result = TaskResult::failure(
            NodeId::new("node-2"),
            "mail.send_message",
            FailureKind::SkippedDueToDependency,
            "dependency node-1 failed",
        );
        assert!(!result.outcome.is_success());
        assert!(result.outcome.value().is_none());
    }
}
