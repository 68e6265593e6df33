//! Wire frames.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use errand_core::{MessageId, ToolDescriptor};

/// Classification of a worker-reported error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireErrorKind {
    /// The invoked tool is not part of this worker's toolset.
    UnknownTool,
    /// The arguments did not decode against the tool's schema.
    InvalidArguments,
    /// The tool ran and failed (provider API error, etc.).
    ToolFailed,
    /// Anything else went wrong inside the worker.
    Internal,
}

impl fmt::Display for WireErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WireErrorKind::UnknownTool => "unknown_tool",
            WireErrorKind::InvalidArguments => "invalid_arguments",
            WireErrorKind::ToolFailed => "tool_failed",
            WireErrorKind::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// Kind-specific payload of a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum Payload {
    /// First frame a worker sends, after its token exchange succeeds.
    Manifest { tools: Vec<ToolDescriptor> },

    /// Orchestrator asks the worker to run a tool.
    Invoke {
        tool_name: String,
        arguments: BTreeMap<String, Value>,
    },

    /// Successful answer to an invoke with the same `message_id`.
    Result { value: Value },

    /// Failed answer to an invoke with the same `message_id`.
    Error { error: WireErrorKind, detail: String },
}

/// One self-delimited message on the channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Matches responses to requests; fresh for manifest frames.
    pub message_id: MessageId,

    /// What this frame carries.
    #[serde(flatten)]
    pub payload: Payload,
}

impl Frame {
    /// Create a manifest frame.
    pub fn manifest(tools: Vec<ToolDescriptor>) -> Self {
        Self {
            message_id: MessageId::generate(),
            payload: Payload::Manifest { tools },
        }
    }

    /// Create an invoke frame.
    pub fn invoke(tool_name: impl Into<String>, arguments: BTreeMap<String, Value>) -> Self {
        Self {
            message_id: MessageId::generate(),
            payload: Payload::Invoke {
                tool_name: tool_name.into(),
                arguments,
            },
        }
    }

    /// Create a result frame answering `request_id`.
    pub fn result(request_id: MessageId, value: Value) -> Self {
        Self {
            message_id: request_id,
            payload: Payload::Result { value },
        }
    }

    /// Create an error frame answering `request_id`.
    pub fn error(request_id: MessageId, error: WireErrorKind, detail: impl Into<String>) -> Self {
        Self {
            message_id: request_id,
            payload: Payload::Error {
                error,
                detail: detail.into(),
            },
        }
    }

    /// Encode as one line (without the trailing newline).
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decode from one line.
    pub fn from_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}
