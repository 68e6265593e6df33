//! Errand request-routing and worker-orchestration engine.
//!
//! One user request flows through: credential resolution → intent routing
//! (against the compiled tool catalog) → worker pool spawn for the plan's
//! domains → tool registry from the handshake manifests → dependency-aware
//! execution → result aggregation → best-effort audit → guaranteed worker
//! teardown.
//!
//! Every piece of state is request-scoped; concurrent requests share only
//! the external credential store and audit sink behind their boundary
//! traits.

pub mod aggregate;
pub mod audit;
pub mod config;
pub mod credentials;
pub mod error;
pub mod executor;
pub mod orchestrator;
pub mod planner;
pub mod pool;
pub mod registry;

pub use aggregate::{aggregate, AggregatedResponse};
pub use audit::{AuditError, AuditSink, FsAuditSink, NoopAuditSink};
pub use config::OrchestratorConfig;
pub use credentials::{resolve, CredentialStore, InMemoryCredentialStore, StoredCredential};
pub use error::OrchestratorError;
pub use executor::{execute, ToolInvoker};
pub use orchestrator::{Orchestrator, RequestOutcome};
pub use planner::{Planner, PlannerError, RulePlanner};
pub use pool::{BinaryLauncher, PoolError, WorkerHandle, WorkerLauncher, WorkerPool, WorkerStatus};
pub use registry::{RegistryError, ToolRegistry};
