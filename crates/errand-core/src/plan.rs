//! Task plans produced by the intent router.
//!
//! A plan is an ordered list of nodes, each bound to exactly one tool.
//! `Plan::validate` enforces the structural invariants independent of the
//! planner implementation: unique ids, acyclic dependencies (every
//! dependency points at an earlier node, so plan order is a topological
//! witness), and every result reference both resolves and is declared in
//! `depends_on`.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::ids::NodeId;

/// An argument value of a plan node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArgValue {
    /// A literal JSON value known at planning time.
    Literal { value: Value },

    /// The result of an earlier node, optionally narrowed by a JSON
    /// pointer into the result value.
    NodeOutput {
        node: NodeId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pointer: Option<String>,
    },

    /// A string with `${node-id}` placeholders interpolated from earlier
    /// node results at execution time.
    Template { text: String },
}

impl ArgValue {
    /// Convenience constructor for a literal string.
    pub fn string(s: impl Into<String>) -> Self {
        ArgValue::Literal {
            value: Value::String(s.into()),
        }
    }

    /// Convenience constructor for any literal JSON value.
    pub fn literal(value: Value) -> Self {
        ArgValue::Literal { value }
    }

    /// Node ids this value references.
    pub fn referenced_nodes(&self) -> Vec<NodeId> {
        match self {
            ArgValue::Literal { .. } => Vec::new(),
            ArgValue::NodeOutput { node, .. } => vec![node.clone()],
            ArgValue::Template { text } => scan_template_refs(text),
        }
    }
}

/// Extract the node ids named by `${...}` placeholders in a template.
pub fn scan_template_refs(text: &str) -> Vec<NodeId> {
    let mut refs = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find("${") {
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let name = &after[..end];
                if !name.is_empty() {
                    refs.push(NodeId::new(name));
                }
                rest = &after[end + 1..];
            }
            None => break,
        }
    }
    refs
}

/// Whether a template contains a `${}` placeholder naming no node.
fn has_empty_placeholder(text: &str) -> bool {
    let mut rest = text;
    while let Some(start) = rest.find("${") {
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(0) => return true,
            Some(end) => rest = &after[end + 1..],
            None => return false,
        }
    }
    false
}

/// One sub-task bound to a tool and its arguments.
///
/// Produced once per request by the intent router; immutable thereafter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanNode {
    /// Id unique within the plan.
    pub id: NodeId,

    /// Name of the tool this node invokes.
    pub tool_name: String,

    /// Arguments keyed by parameter name.
    pub args: BTreeMap<String, ArgValue>,

    /// Nodes whose results this node depends on.
    pub depends_on: BTreeSet<NodeId>,
}

impl PlanNode {
    /// Create a node with no arguments or dependencies.
    pub fn new(id: impl Into<NodeId>, tool_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tool_name: tool_name.into(),
            args: BTreeMap::new(),
            depends_on: BTreeSet::new(),
        }
    }

    /// Builder method to add an argument.
    pub fn with_arg(mut self, name: impl Into<String>, value: ArgValue) -> Self {
        self.args.insert(name.into(), value);
        self
    }

    /// Builder method to declare a dependency.
    pub fn with_dependency(mut self, node: NodeId) -> Self {
        self.depends_on.insert(node);
        self
    }

    /// All node ids referenced by this node's argument values.
    pub fn referenced_nodes(&self) -> BTreeSet<NodeId> {
        self.args
            .values()
            .flat_map(|v| v.referenced_nodes())
            .collect()
    }
}

/// Structural errors in a plan, caught before execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    /// The planner produced no nodes; routing should have rejected the
    /// request as unroutable instead.
    #[error("Plan has no nodes")]
    Empty,

    /// Two nodes share an id.
    #[error("Duplicate node id: {0}")]
    DuplicateNodeId(NodeId),

    /// A dependency names a node that is not earlier in the plan. Because
    /// plan order must be a valid topological order, this also covers
    /// cycles and self-dependencies.
    #[error("Node {node} depends on {dependency}, which does not precede it")]
    UnresolvedDependency { node: NodeId, dependency: NodeId },

    /// An argument references a node result without declaring the
    /// dependency.
    #[error("Node {node} references {referenced} without depending on it")]
    UndeclaredReference { node: NodeId, referenced: NodeId },

    /// A template argument contains a `${}` placeholder naming no node.
    #[error("Node {node} has a template with an empty ${{}} placeholder")]
    EmptyPlaceholder { node: NodeId },
}

/// An ordered, validated sequence of plan nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub nodes: Vec<PlanNode>,
}

impl Plan {
    /// Create a plan from nodes, enforcing the structural invariants.
    pub fn new(nodes: Vec<PlanNode>) -> Result<Self, PlanError> {
        let plan = Self { nodes };
        plan.validate()?;
        Ok(plan)
    }

    /// Check the plan invariants without consuming it.
    pub fn validate(&self) -> Result<(), PlanError> {
        if self.nodes.is_empty() {
            return Err(PlanError::Empty);
        }

        let mut seen: HashSet<&NodeId> = HashSet::new();
        for node in &self.nodes {
            for dependency in &node.depends_on {
                if !seen.contains(dependency) {
                    return Err(PlanError::UnresolvedDependency {
                        node: node.id.clone(),
                        dependency: dependency.clone(),
                    });
                }
            }
            for referenced in node.referenced_nodes() {
                if !node.depends_on.contains(&referenced) {
                    return Err(PlanError::UndeclaredReference {
                        node: node.id.clone(),
                        referenced,
                    });
                }
            }
            for arg in node.args.values() {
                if let ArgValue::Template { text } = arg {
                    if has_empty_placeholder(text) {
                        return Err(PlanError::EmptyPlaceholder {
                            node: node.id.clone(),
                        });
                    }
                }
            }
            if !seen.insert(&node.id) {
                return Err(PlanError::DuplicateNodeId(node.id.clone()));
            }
        }
        Ok(())
    }

    /// Number of nodes in the plan.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the plan has no nodes. A validated plan never is.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Look up a node by id.
    pub fn node(&self, id: &NodeId) -> Option<&PlanNode> {
        self.nodes.iter().find(|n| &n.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, tool: &str) -> PlanNode {
        PlanNode::new(id, tool)
    }

    #[test]
    fn test_scan_template_refs() {
        let refs = scan_template_refs("The event ${node-1} is at ${node-2}.");
        assert_eq!(refs, vec![NodeId::new("node-1"), NodeId::new("node-2")]);
        assert!(scan_template_refs("no refs here").is_empty());
        assert!(scan_template_refs("dangling ${oops").is_empty());
    }

    #[test]
    fn test_valid_dependent_plan() {
        let plan = Plan::new(vec![
            node("node-1", "calendar.create_event"),
            node("node-2", "mail.send_message")
                .with_arg(
                    "body",
                    ArgValue::Template {
                        text: "Scheduled: ${node-1}".to_string(),
                    },
                )
                .with_dependency(NodeId::new("node-1")),
        ]);
        assert!(plan.is_ok());
    }

    #[test]
    fn test_empty_plan_rejected() {
        assert_eq!(Plan::new(vec![]).unwrap_err(), PlanError::Empty);
    }

    #[test]
    fn test_duplicate_node_id_rejected() {
        let err = Plan::new(vec![node("node-1", "a"), node("node-1", "b")]).unwrap_err();
        assert_eq!(err, PlanError::DuplicateNodeId(NodeId::new("node-1")));
    }

    #[test]
    fn test_forward_dependency_rejected() {
        let err = Plan::new(vec![
            node("node-1", "a").with_dependency(NodeId::new("node-2")),
            node("node-2", "b"),
        ])
        .unwrap_err();
        assert!(matches!(err, PlanError::UnresolvedDependency { .. }));
    }

    #[test]
    fn test_self_dependency_rejected() {
        let err =
            Plan::new(vec![node("node-1", "a").with_dependency(NodeId::new("node-1"))])
                .unwrap_err();
        assert!(matches!(err, PlanError::UnresolvedDependency { .. }));
    }

    #[test]
    fn test_empty_template_placeholder_rejected() {
        let err = Plan::new(vec![node("node-1", "a").with_arg(
            "body",
            ArgValue::Template {
                text: "details: ${}".to_string(),
            },
        )])
        .unwrap_err();
        assert_eq!(
            err,
            PlanError::EmptyPlaceholder {
                node: NodeId::new("node-1"),
            }
        );

        // A dangling `${` is inert text, same as at render time.
        assert!(Plan::new(vec![node("node-1", "a").with_arg(
            "body",
            ArgValue::Template {
                text: "dangling ${oops".to_string(),
            },
        )])
        .is_ok());
    }

    #[test]
    fn test_undeclared_reference_rejected() {
        let err = Plan::new(vec![
            node("node-1", "a"),
            node("node-2", "b").with_arg(
                "x",
                ArgValue::NodeOutput {
                    node: NodeId::new("node-1"),
                    pointer: None,
                },
            ),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            PlanError::UndeclaredReference {
                node: NodeId::new("node-2"),
                referenced: NodeId::new("node-1"),
            }
        );
    }
}
