//! Domain toolsets.
//!
//! Each tool implements the `Tool` trait (descriptor + async call); the
//! `ToolSet` for a domain is built from the same compiled catalog the
//! orchestrator plans against, so the handshake manifest always matches.

pub mod calendar;
pub mod mail;
pub mod storage;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use errand_core::{Domain, ToolDescriptor};
use errand_rpc::WireErrorKind;

use crate::provider::{ProviderClient, ProviderError};

/// Errors from executing one tool call.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The arguments did not decode against the tool's schema.
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// The provider call failed.
    #[error("Tool failed: {0}")]
    Failed(String),
}

impl From<ProviderError> for ToolError {
    fn from(e: ProviderError) -> Self {
        ToolError::Failed(e.to_string())
    }
}

impl ToolError {
    /// Map to the wire error classification.
    pub fn wire_kind(&self) -> WireErrorKind {
        match self {
            ToolError::InvalidArguments(_) => WireErrorKind::InvalidArguments,
            ToolError::Failed(_) => WireErrorKind::ToolFailed,
        }
    }
}

/// One named operation a worker exposes.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The declared descriptor, straight from the compiled catalog.
    fn descriptor(&self) -> &ToolDescriptor;

    /// Execute with JSON arguments keyed by parameter name.
    async fn call(&self, args: BTreeMap<String, Value>) -> Result<Value, ToolError>;
}

/// The fixed toolset of one domain worker.
pub struct ToolSet {
    domain: Domain,
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolSet {
    /// Build the toolset for a domain over an authorized provider client.
    pub fn for_domain(domain: Domain, provider: ProviderClient) -> Self {
        let tools: Vec<Arc<dyn Tool>> = match domain {
            Domain::Mail => mail::tools(provider),
            Domain::Calendar => calendar::tools(provider),
            Domain::Storage => storage::tools(provider),
        };
        Self { domain, tools }
    }

    /// Build a toolset from arbitrary tools, for tests.
    pub fn from_tools(domain: Domain, tools: Vec<Arc<dyn Tool>>) -> Self {
        Self { domain, tools }
    }

    /// The domain this toolset serves.
    pub fn domain(&self) -> Domain {
        self.domain
    }

    /// Descriptors in declaration order, for the handshake manifest.
    pub fn manifest(&self) -> Vec<ToolDescriptor> {
        self.tools.iter().map(|t| t.descriptor().clone()).collect()
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools
            .iter()
            .find(|t| t.descriptor().name == name)
            .cloned()
    }
}

/// Extract a required string argument.
pub(crate) fn require_str<'a>(
    args: &'a BTreeMap<String, Value>,
    name: &str,
) -> Result<&'a str, ToolError> {
    args.get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::InvalidArguments(format!("missing string argument '{name}'")))
}

/// Extract an optional string argument.
pub(crate) fn optional_str<'a>(args: &'a BTreeMap<String, Value>, name: &str) -> Option<&'a str> {
    args.get(name).and_then(Value::as_str)
}

/// Extract an optional integer argument.
pub(crate) fn optional_i64(args: &BTreeMap<String, Value>, name: &str) -> Option<i64> {
    args.get(name).and_then(Value::as_i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use errand_core::catalog;
    use serde_json::json;

    struct StubTool(ToolDescriptor);

    #[async_trait]
    impl Tool for StubTool {
        fn descriptor(&self) -> &ToolDescriptor {
            &self.0
        }

        async fn call(&self, _args: BTreeMap<String, Value>) -> Result<Value, ToolError> {
            Ok(json!("ok"))
        }
    }

    #[test]
    fn test_manifest_matches_catalog_order() {
        let descriptors = catalog::domain_tools(Domain::Storage);
        let tools: Vec<Arc<dyn Tool>> = descriptors
            .iter()
            .cloned()
            .map(|d| Arc::new(StubTool(d)) as Arc<dyn Tool>)
            .collect();
        let set = ToolSet::from_tools(Domain::Storage, tools);
        assert_eq!(set.manifest(), descriptors);
    }

    #[test]
    fn test_require_str() {
        let mut args = BTreeMap::new();
        args.insert("to".to_string(), json!("bob@example.com"));
        assert_eq!(require_str(&args, "to").unwrap(), "bob@example.com");
        assert!(require_str(&args, "subject").is_err());
    }
}
