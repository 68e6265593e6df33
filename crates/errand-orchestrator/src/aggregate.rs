//! Result aggregation.
//!
//! Folds per-node results into one user-facing response. Lines follow plan
//! order, so the same plan and results always render the same text.

use serde_json::Value;

use errand_core::{Outcome, Plan, TaskResult};

/// The response assembled from every node's result.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedResponse {
    /// Human-readable summary, one line per plan node.
    pub response_text: String,

    /// Per-node results in plan order.
    pub results: Vec<TaskResult>,
}

impl AggregatedResponse {
    /// Whether every node succeeded.
    pub fn fully_succeeded(&self) -> bool {
        self.results.iter().all(|r| r.outcome.is_success())
    }
}

/// Fold results (already in plan order) into a response.
pub fn aggregate(plan: &Plan, results: Vec<TaskResult>) -> AggregatedResponse {
    let mut lines = Vec::with_capacity(results.len());
    for result in &results {
        let line = match &result.outcome {
            Outcome::Success { value } => {
                format!("{}: done ({})", result.tool_name, summarize(value))
            }
            Outcome::Failure { kind, message } => {
                format!("{}: failed [{}] {}", result.tool_name, kind.as_str(), message)
            }
        };
        if plan.len() > 1 {
            lines.push(format!("{}. {line}", lines.len() + 1));
        } else {
            lines.push(line);
        }
    }

    AggregatedResponse {
        response_text: lines.join("\n"),
        results,
    }
}

/// One-line rendering of a tool's result value.
fn summarize(value: &Value) -> String {
    let compact = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    if compact.chars().count() > 120 {
        let truncated: String = compact.chars().take(117).collect();
        format!("{truncated}...")
    } else {
        compact
    }
}
