//! Errand Core Domain Types
//!
//! This crate contains pure domain types with no dependencies on:
//! - Network/HTTP
//! - Process management
//! - Runtime specifics
//!
//! All types here are request-scoped: they are created when a user request
//! arrives and dropped when its response is produced. Nothing is shared or
//! reused across requests.

pub mod catalog;
pub mod credential;
pub mod domain;
pub mod ids;
pub mod plan;
pub mod result;
pub mod tool;
pub mod transcript;

// Re-export commonly used types
pub use credential::{CredentialBundle, CredentialError};
pub use domain::Domain;
pub use ids::{MessageId, NodeId, RequestId};
pub use plan::{ArgValue, Plan, PlanError, PlanNode};
pub use result::{FailureKind, Outcome, TaskResult};
pub use tool::{ParamSpec, ParamType, ToolDescriptor};
pub use transcript::{Actor, Transcript, TranscriptEntry};
