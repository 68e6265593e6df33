//! Per-request tool registry.
//!
//! Maps each tool name to its descriptor and owning worker. Arguments are
//! checked against the descriptor locally, so a malformed invocation is
//! rejected as an argument mismatch without ever contacting the worker.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use errand_core::ToolDescriptor;
use errand_rpc::{RpcError, WireErrorKind};
use serde_json::Value;

use crate::pool::{WorkerHandle, WorkerPool};

/// Errors from registry construction and dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Two workers claimed the same tool name.
    #[error("Duplicate tool in registry: {0}")]
    DuplicateTool(String),

    /// The named tool is not registered.
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Arguments failed the local arity/type check.
    #[error("Argument mismatch for {tool}: {detail}")]
    ArgumentMismatch { tool: String, detail: String },

    /// The worker reported a failure or died mid-invocation.
    #[error("Upstream failure in {tool}: {detail}")]
    Upstream { tool: String, detail: String },
}

/// The request-scoped mapping from tool names to workers.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, (ToolDescriptor, Arc<WorkerHandle>)>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry from every worker in a ready pool.
    pub fn from_pool(pool: &WorkerPool) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        for handle in pool.workers() {
            registry.register(Arc::clone(handle))?;
        }
        Ok(registry)
    }

    /// Register every tool a worker serves.
    pub fn register(&mut self, handle: Arc<WorkerHandle>) -> Result<(), RegistryError> {
        for descriptor in handle.descriptors() {
            if self.tools.contains_key(&descriptor.name) {
                return Err(RegistryError::DuplicateTool(descriptor.name.clone()));
            }
            debug!(tool = %descriptor.name, domain = %handle.domain(), "Tool registered");
            self.tools
                .insert(descriptor.name.clone(), (descriptor.clone(), Arc::clone(&handle)));
        }
        Ok(())
    }

    /// Descriptor of a registered tool.
    pub fn descriptor(&self, tool_name: &str) -> Option<&ToolDescriptor> {
        self.tools.get(tool_name).map(|(descriptor, _)| descriptor)
    }

    /// Names of every registered tool.
    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Validate arguments locally, then dispatch to the owning worker.
    pub async fn invoke(
        &self,
        tool_name: &str,
        arguments: BTreeMap<String, Value>,
    ) -> Result<Value, RegistryError> {
        let (descriptor, handle) = self
            .tools
            .get(tool_name)
            .ok_or_else(|| RegistryError::ToolNotFound(tool_name.to_string()))?;

        if let Err(detail) = validate_args(descriptor, &arguments) {
            return Err(RegistryError::ArgumentMismatch {
                tool: tool_name.to_string(),
                detail,
            });
        }

        handle
            .invoke(tool_name, arguments)
            .await
            .map_err(|e| dispatch_error(tool_name, e))
    }
}

/// Check arguments against the descriptor: required presence, no unknown
/// names, declared types.
pub fn validate_args(
    descriptor: &ToolDescriptor,
    arguments: &BTreeMap<String, Value>,
) -> Result<(), String> {
    for param in &descriptor.params {
        match arguments.get(&param.name) {
            Some(value) => {
                if !param.ty.matches(value) {
                    return Err(format!(
                        "parameter '{}' has the wrong type (expected {:?})",
                        param.name, param.ty
                    ));
                }
            }
            None if param.required => {
                return Err(format!("missing required parameter '{}'", param.name));
            }
            None => {}
        }
    }
    for name in arguments.keys() {
        if descriptor.param(name).is_none() {
            return Err(format!("unknown parameter '{name}'"));
        }
    }
    Ok(())
}

fn dispatch_error(tool_name: &str, e: RpcError) -> RegistryError {
    match e {
        // The worker double-checks arguments; treat its rejection the same
        // as the local check.
        RpcError::Worker {
            kind: WireErrorKind::InvalidArguments,
            detail,
        } => RegistryError::ArgumentMismatch {
            tool: tool_name.to_string(),
            detail,
        },
        other => RegistryError::Upstream {
            tool: tool_name.to_string(),
            detail: other.to_string(),
        },
    }
}
