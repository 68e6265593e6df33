//! The request pipeline facade.
//!
//! Ties the stages together for one request: resolve the credential, route
//! the text into a plan against the compiled catalog, spawn workers for
//! exactly the domains the plan touches, execute, aggregate, archive the
//! transcript, and tear the pool down on every path that spawned it.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use errand_core::{catalog, Actor, Domain, Plan, RequestId, TaskResult, Transcript};

use crate::aggregate::{self, AggregatedResponse};
use crate::audit::{AuditRecord, AuditSink};
use crate::config::OrchestratorConfig;
use crate::credentials::{self, CredentialStore};
use crate::error::OrchestratorError;
use crate::executor;
use crate::planner::Planner;
use crate::pool::{WorkerLauncher, WorkerPool};
use crate::registry::ToolRegistry;

/// What the caller gets back for one request.
#[derive(Debug, Clone)]
pub struct RequestOutcome {
    pub request_id: RequestId,

    /// Human-readable summary, one line per plan node.
    pub response_text: String,

    /// Per-node results in plan order.
    pub results: Vec<TaskResult>,
}

/// The engine. Shared across requests; all per-request state lives on the
/// stack of [`Orchestrator::handle_request`].
pub struct Orchestrator {
    store: Arc<dyn CredentialStore>,
    planner: Arc<dyn Planner>,
    launcher: Arc<dyn WorkerLauncher>,
    audit: Arc<dyn AuditSink>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        planner: Arc<dyn Planner>,
        launcher: Arc<dyn WorkerLauncher>,
        audit: Arc<dyn AuditSink>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            store,
            planner,
            launcher,
            audit,
            config,
        }
    }

    /// Serve one request under the configured overall deadline.
    pub async fn handle_request(
        &self,
        user_id: &str,
        request_text: &str,
    ) -> Result<RequestOutcome, OrchestratorError> {
        let cancel = CancellationToken::new();
        let timer = self.config.request_timeout.map(|deadline| {
            let canceller = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(deadline).await;
                canceller.cancel();
            })
        });
        let outcome = self
            .handle_request_with_cancel(user_id, request_text, &cancel)
            .await;
        if let Some(timer) = timer {
            timer.abort();
        }
        outcome
    }

    /// Serve one request, honoring an externally owned cancellation token.
    pub async fn handle_request_with_cancel(
        &self,
        user_id: &str,
        request_text: &str,
        cancel: &CancellationToken,
    ) -> Result<RequestOutcome, OrchestratorError> {
        let request_id = RequestId::generate();
        let mut transcript = Transcript::new();
        info!(request_id = %request_id, user_id = %user_id, "Request received");

        // Fast fail: no credential, no plan, no worker.
        let bundle = credentials::resolve(self.store.as_ref(), user_id).await?;
        transcript.record(Actor::Router, "credentials resolved");

        // Routing binds against the compiled catalog, so an unroutable
        // request is rejected before any process is spawned.
        let plan = self
            .planner
            .plan(request_text, &catalog::all_tools())
            .await?;
        // The planner is pluggable; re-check the invariants here.
        plan.validate()?;
        let domains = plan_domains(&plan)?;
        transcript.record(
            Actor::Router,
            format!(
                "planned {} nodes across {} domains",
                plan.len(),
                domains.len()
            ),
        );
        info!(
            request_id = %request_id,
            node_count = plan.len(),
            domain_count = domains.len(),
            "Plan ready"
        );

        let pool = WorkerPool::spawn(
            self.launcher.as_ref(),
            &domains,
            &bundle,
            self.config.handshake_timeout,
            self.config.shutdown_grace,
        )
        .await?;
        for handle in pool.workers() {
            transcript.record(
                Actor::Worker {
                    domain: handle.domain(),
                },
                "spawned, manifest verified",
            );
        }

        // From here the pool exists: tear it down on success and failure
        // alike before surfacing the outcome.
        let outcome = self.run_plan(&plan, &pool, cancel, &mut transcript).await;
        pool.teardown().await;
        transcript.record(Actor::Executor, "worker pool torn down");
        let response = outcome?;

        transcript.record(
            Actor::Aggregator,
            format!("aggregated {} results", response.results.len()),
        );

        self.archive(&request_id, user_id, transcript).await;

        info!(
            request_id = %request_id,
            fully_succeeded = response.fully_succeeded(),
            "Request complete"
        );
        Ok(RequestOutcome {
            request_id,
            response_text: response.response_text,
            results: response.results,
        })
    }

    async fn run_plan(
        &self,
        plan: &Plan,
        pool: &WorkerPool,
        cancel: &CancellationToken,
        transcript: &mut Transcript,
    ) -> Result<AggregatedResponse, OrchestratorError> {
        let registry = Arc::new(ToolRegistry::from_pool(pool)?);
        let results = executor::execute(
            plan,
            registry,
            self.config.invoke_timeout,
            cancel,
            transcript,
        )
        .await;
        Ok(aggregate::aggregate(plan, results))
    }

    /// Archive the transcript; a sink failure is logged, never surfaced.
    async fn archive(&self, request_id: &RequestId, user_id: &str, transcript: Transcript) {
        let record = AuditRecord {
            request_id: request_id.clone(),
            user_id: user_id.to_string(),
            completed_at: Utc::now(),
            transcript,
        };
        if let Err(e) = self.audit.append(&record).await {
            warn!(request_id = %request_id, error = %e, "Transcript archive failed");
        }
    }
}

/// The set of domains the plan's tools belong to. A tool the catalog does
/// not know makes the request unroutable.
fn plan_domains(plan: &Plan) -> Result<BTreeSet<Domain>, OrchestratorError> {
    let owners: HashMap<String, Domain> = catalog::all_tools()
        .into_iter()
        .map(|tool| (tool.name, tool.domain))
        .collect();

    let mut domains = BTreeSet::new();
    for node in &plan.nodes {
        match owners.get(&node.tool_name) {
            Some(domain) => {
                domains.insert(*domain);
            }
            None => {
                return Err(OrchestratorError::Unroutable(format!(
                    "no such tool: {}",
                    node.tool_name
                )));
            }
        }
    }
    Ok(domains)
}

#[cfg(test)]
mod tests {
    use super::*;
    use errand_core::PlanNode;

    #[test]
    fn test_plan_domains_deduplicates() {
        let plan = Plan::new(vec![
            PlanNode::new("node-1", "mail.create_draft"),
            PlanNode::new("node-2", "mail.send_message"),
            PlanNode::new("node-3", "calendar.create_event"),
        ])
        .unwrap();
        let domains = plan_domains(&plan).unwrap();
        assert_eq!(
            domains.into_iter().collect::<Vec<_>>(),
            vec![Domain::Mail, Domain::Calendar]
        );
    }

    #[test]
    fn test_unknown_tool_is_unroutable() {
        let plan = Plan::new(vec![PlanNode::new("node-1", "storage.download_file")]).unwrap();
        let err = plan_domains(&plan).unwrap_err();
        assert!(matches!(err, OrchestratorError::Unroutable(_)));
    }
}
