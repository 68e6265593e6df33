//! Tool descriptors and parameter schemas.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::Domain;

/// Declared type of a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
}

impl ParamType {
    /// Check a JSON value against this declared type.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Integer => value.is_i64() || value.is_u64(),
            ParamType::Number => value.is_number(),
            ParamType::Boolean => value.is_boolean(),
        }
    }
}

/// One declared parameter of a tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamSpec {
    /// Parameter name as it appears in invoke arguments.
    pub name: String,

    /// Declared type, checked locally before dispatch.
    #[serde(rename = "type")]
    pub ty: ParamType,

    /// Whether the parameter must be present.
    pub required: bool,
}

impl ParamSpec {
    /// Create a required parameter.
    pub fn required(name: impl Into<String>, ty: ParamType) -> Self {
        Self {
            name: name.into(),
            ty,
            required: true,
        }
    }

    /// Create an optional parameter.
    pub fn optional(name: impl Into<String>, ty: ParamType) -> Self {
        Self {
            name: name.into(),
            ty,
            required: false,
        }
    }
}

/// A single named operation a worker exposes.
///
/// Immutable once collected from a worker handshake. Parameters are an
/// ordered list so a manifest parsed and re-serialized yields byte-identical
/// schemas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Tool name, unique within one request's registry.
    pub name: String,

    /// Domain whose worker owns this tool.
    pub domain: Domain,

    /// Human-readable description of the tool's purpose.
    pub description: String,

    /// Ordered parameter schema.
    pub params: Vec<ParamSpec>,
}

impl ToolDescriptor {
    /// Create a descriptor with no parameters.
    pub fn new(name: impl Into<String>, domain: Domain, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            domain,
            description: description.into(),
            params: Vec::new(),
        }
    }

    /// Builder method to append a parameter.
    pub fn with_param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }

    /// Look up a parameter spec by name.
    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_param_type_matches() {
        assert!(ParamType::String.matches(&json!("x")));
        assert!(!ParamType::String.matches(&json!(3)));
        assert!(ParamType::Integer.matches(&json!(3)));
        assert!(!ParamType::Integer.matches(&json!(3.5)));
        assert!(ParamType::Number.matches(&json!(3.5)));
        assert!(ParamType::Boolean.matches(&json!(true)));
    }

    #[test]
    fn test_descriptor_round_trip_is_byte_stable() {
        let descriptor = ToolDescriptor::new("mail.send_message", Domain::Mail, "Send an email")
            .with_param(ParamSpec::required("to", ParamType::String))
            .with_param(ParamSpec::required("subject", ParamType::String))
            .with_param(ParamSpec::optional("body", ParamType::String));

        let encoded = serde_json::to_string(&descriptor).unwrap();
        let decoded: ToolDescriptor = serde_json::from_str(&encoded).unwrap();
        let re_encoded = serde_json::to_string(&decoded).unwrap();
        assert_eq!(encoded, re_encoded);
        assert_eq!(decoded, descriptor);
    }
}
