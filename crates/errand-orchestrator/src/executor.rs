//! Dependency-aware task execution.
//!
//! Runs plan nodes as their dependencies complete, each invoked at most
//! once. Independent nodes run concurrently; a failed dependency skips its
//! dependents without invoking them; cancellation records the remaining
//! nodes as cancelled and aborts in-flight work. Exactly one result is
//! produced per node, returned in plan order.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use async_trait::async_trait;
use errand_core::{Actor, ArgValue, FailureKind, NodeId, Outcome, Plan, PlanNode, TaskResult, Transcript};

use crate::registry::{RegistryError, ToolRegistry};

/// Dispatch seam between the executor and the workers.
///
/// The production implementation is [`ToolRegistry`]; tests substitute
/// stubs.
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    async fn invoke(
        &self,
        tool_name: &str,
        arguments: BTreeMap<String, Value>,
    ) -> Result<Value, RegistryError>;
}

#[async_trait]
impl ToolInvoker for ToolRegistry {
    async fn invoke(
        &self,
        tool_name: &str,
        arguments: BTreeMap<String, Value>,
    ) -> Result<Value, RegistryError> {
        ToolRegistry::invoke(self, tool_name, arguments).await
    }
}

/// Execute a validated plan to completion or cancellation.
pub async fn execute(
    plan: &Plan,
    invoker: Arc<dyn ToolInvoker>,
    invoke_timeout: Duration,
    cancel: &CancellationToken,
    transcript: &mut Transcript,
) -> Vec<TaskResult> {
    let mut results: HashMap<NodeId, TaskResult> = HashMap::new();
    let mut successes: HashMap<NodeId, Value> = HashMap::new();
    let mut started: HashSet<NodeId> = HashSet::new();
    let mut running: JoinSet<TaskResult> = JoinSet::new();

    loop {
        schedule_ready(
            plan,
            &invoker,
            invoke_timeout,
            &mut results,
            &successes,
            &mut started,
            &mut running,
            transcript,
        );

        if results.len() == plan.len() {
            break;
        }

        tokio::select! {
            _ = cancel.cancelled() => {
                running.abort_all();
                for node in &plan.nodes {
                    if !results.contains_key(&node.id) {
                        transcript.record_node(Actor::Executor, node.id.clone(), "cancelled");
                        results.insert(
                            node.id.clone(),
                            TaskResult::failure(
                                node.id.clone(),
                                &node.tool_name,
                                FailureKind::Cancelled,
                                "request cancelled before this node finished",
                            ),
                        );
                    }
                }
                break;
            }
            joined = running.join_next() => {
                match joined {
                    Some(Ok(result)) => {
                        match &result.outcome {
                            Outcome::Success { value } => {
                                transcript.record_node(
                                    Actor::Executor,
                                    result.node_id.clone(),
                                    format!("{} succeeded", result.tool_name),
                                );
                                successes.insert(result.node_id.clone(), value.clone());
                            }
                            Outcome::Failure { kind, message } => {
                                transcript.record_node(
                                    Actor::Executor,
                                    result.node_id.clone(),
                                    format!("{} failed ({}): {message}", result.tool_name, kind.as_str()),
                                );
                            }
                        }
                        results.insert(result.node_id.clone(), result);
                    }
                    Some(Err(e)) => warn!(error = %e, "Node task ended abnormally"),
                    // Nothing is running and nothing new became ready;
                    // collect_in_plan_order backfills whatever is missing.
                    None => break,
                }
            }
        }
    }

    collect_in_plan_order(plan, results)
}

/// Start every node whose dependencies are all resolved. Skips cascade, so
/// this repeats until a pass makes no progress.
#[allow(clippy::too_many_arguments)]
fn schedule_ready(
    plan: &Plan,
    invoker: &Arc<dyn ToolInvoker>,
    invoke_timeout: Duration,
    results: &mut HashMap<NodeId, TaskResult>,
    successes: &HashMap<NodeId, Value>,
    started: &mut HashSet<NodeId>,
    running: &mut JoinSet<TaskResult>,
    transcript: &mut Transcript,
) {
    loop {
        let mut progressed = false;

        for node in &plan.nodes {
            if started.contains(&node.id) || results.contains_key(&node.id) {
                continue;
            }
            if !node.depends_on.iter().all(|d| results.contains_key(d)) {
                continue;
            }

            if let Some(failed) = node
                .depends_on
                .iter()
                .find(|d| results.get(*d).map(|r| !r.outcome.is_success()).unwrap_or(false))
            {
                transcript.record_node(
                    Actor::Executor,
                    node.id.clone(),
                    format!("skipped: dependency {failed} did not succeed"),
                );
                results.insert(
                    node.id.clone(),
                    TaskResult::failure(
                        node.id.clone(),
                        &node.tool_name,
                        FailureKind::SkippedDueToDependency,
                        format!("dependency {failed} did not succeed"),
                    ),
                );
                progressed = true;
                continue;
            }

            match resolve_args(node, successes) {
                Err(detail) => {
                    transcript.record_node(
                        Actor::Executor,
                        node.id.clone(),
                        format!("argument resolution failed: {detail}"),
                    );
                    results.insert(
                        node.id.clone(),
                        TaskResult::failure(
                            node.id.clone(),
                            &node.tool_name,
                            FailureKind::ArgumentMismatch,
                            detail,
                        ),
                    );
                    progressed = true;
                }
                Ok(arguments) => {
                    debug!(node_id = %node.id, tool = %node.tool_name, "Node started");
                    transcript.record_node(
                        Actor::Executor,
                        node.id.clone(),
                        format!("invoking {}", node.tool_name),
                    );
                    started.insert(node.id.clone());
                    let invoker = Arc::clone(invoker);
                    let node_id = node.id.clone();
                    let tool_name = node.tool_name.clone();
                    running.spawn(async move {
                        match timeout(invoke_timeout, invoker.invoke(&tool_name, arguments)).await
                        {
                            Ok(Ok(value)) => TaskResult::success(node_id, tool_name, value),
                            Ok(Err(e)) => {
                                let kind = failure_kind(&e);
                                TaskResult::failure(node_id, tool_name, kind, e.to_string())
                            }
                            Err(_) => TaskResult::failure(
                                node_id,
                                tool_name,
                                FailureKind::Upstream,
                                "invocation timed out",
                            ),
                        }
                    });
                    progressed = true;
                }
            }
        }

        if !progressed {
            return;
        }
    }
}

/// Substitute dependency results into a node's argument values.
pub fn resolve_args(
    node: &PlanNode,
    successes: &HashMap<NodeId, Value>,
) -> Result<BTreeMap<String, Value>, String> {
    let mut arguments = BTreeMap::new();
    for (name, arg) in &node.args {
        let value = match arg {
            ArgValue::Literal { value } => value.clone(),
            ArgValue::NodeOutput { node: source, pointer } => {
                let base = successes
                    .get(source)
                    .ok_or_else(|| format!("result of {source} is unavailable"))?;
                match pointer {
                    Some(pointer) => base.pointer(pointer).cloned().ok_or_else(|| {
                        format!("pointer {pointer} not found in result of {source}")
                    })?,
                    None => base.clone(),
                }
            }
            ArgValue::Template { text } => Value::String(render_template(text, successes)?),
        };
        arguments.insert(name.clone(), value);
    }
    Ok(arguments)
}

fn render_template(text: &str, successes: &HashMap<NodeId, Value>) -> Result<String, String> {
    let mut rendered = String::new();
    let mut rest = text;
    while let Some(start) = rest.find("${") {
        rendered.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let id = NodeId::new(&after[..end]);
                let value = successes
                    .get(&id)
                    .ok_or_else(|| format!("result of {id} is unavailable"))?;
                rendered.push_str(&render_value(value));
                rest = &after[end + 1..];
            }
            None => {
                rendered.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    rendered.push_str(rest);
    Ok(rendered)
}

/// Strings interpolate bare; everything else as compact JSON.
fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn failure_kind(e: &RegistryError) -> FailureKind {
    match e {
        RegistryError::ToolNotFound(_) => FailureKind::ToolNotFound,
        RegistryError::ArgumentMismatch { .. } => FailureKind::ArgumentMismatch,
        RegistryError::Upstream { .. } | RegistryError::DuplicateTool(_) => FailureKind::Upstream,
    }
}

fn collect_in_plan_order(plan: &Plan, mut results: HashMap<NodeId, TaskResult>) -> Vec<TaskResult> {
    plan.nodes
        .iter()
        .map(|node| {
            results.remove(&node.id).unwrap_or_else(|| {
                TaskResult::failure(
                    node.id.clone(),
                    &node.tool_name,
                    FailureKind::Cancelled,
                    "node never produced a result",
                )
            })
        })
        .collect()
}
