//! Per-request worker pool.
//!
//! One worker process per domain named by the plan, spawned concurrently
//! and handed the user's delegated credential on its command line. A
//! single deadline covers the whole pool handshake; a worker whose
//! manifest does not arrive in time, or does not match the compiled
//! catalog, fails the request before anything executes. Teardown closes
//! every worker's stdin, waits out a grace period, and kills stragglers.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, info, warn};

use errand_core::{catalog, CredentialBundle, Domain, ToolDescriptor};
use errand_rpc::{RpcError, RpcPeer};

/// Errors that prevent the pool from reaching a ready state.
#[derive(Debug, Error)]
pub enum PoolError {
    /// Spawning failed, the handshake timed out, or the manifest did not
    /// match the compiled catalog for the domain.
    #[error("Worker for domain {domain} failed to start: {cause}")]
    WorkerStartupFailed { domain: Domain, cause: String },

    /// The user's delegation does not cover the domain, so its worker is
    /// never started.
    #[error("Delegation for domain {domain} is missing scopes: {missing:?}")]
    MissingScopes {
        domain: Domain,
        missing: Vec<&'static str>,
    },
}

/// Lifecycle of one worker process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerStatus {
    /// Spawned, manifest not yet received.
    Starting,
    /// Handshake complete, idle.
    Ready,
    /// An invocation is in flight.
    Busy,
    /// Teardown has closed its stdin.
    Closing,
    /// The process has exited.
    Terminated,
}

/// How worker processes are launched. The production launcher runs the
/// worker binary; tests substitute scripted processes.
pub trait WorkerLauncher: Send + Sync {
    /// Build the command for one domain's worker, credentials included.
    fn command(&self, domain: Domain, bundle: &CredentialBundle) -> Command;
}

/// Launches the real worker binary with credential arguments.
pub struct BinaryLauncher {
    program: PathBuf,
    api_base: Option<String>,
}

impl BinaryLauncher {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            api_base: None,
        }
    }

    /// Builder method to point workers at a non-default provider API.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = Some(api_base.into());
        self
    }
}

impl WorkerLauncher for BinaryLauncher {
    fn command(&self, domain: Domain, bundle: &CredentialBundle) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("--domain")
            .arg(domain.as_str())
            .arg("--refresh-token")
            .arg(&bundle.refresh_token)
            .arg("--client-id")
            .arg(&bundle.client_id)
            .arg("--client-secret")
            .arg(&bundle.client_secret)
            .arg("--token-endpoint")
            .arg(&bundle.token_endpoint);
        if let Some(api_base) = &self.api_base {
            cmd.arg("--api-base").arg(api_base);
        }
        cmd
    }
}

/// One live worker process and its channel.
pub struct WorkerHandle {
    domain: Domain,
    pid: Option<u32>,
    peer: RpcPeer,
    child: Mutex<Child>,
    status: StdMutex<WorkerStatus>,
    /// Serializes invocations so one worker handles one tool call at a
    /// time; concurrency across the plan comes from having one worker per
    /// domain.
    invoke_gate: Mutex<()>,
    descriptors: Vec<ToolDescriptor>,
}

impl WorkerHandle {
    /// Domain this worker serves.
    pub fn domain(&self) -> Domain {
        self.domain
    }

    /// OS process id, if the runtime reported one.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Current lifecycle status.
    pub fn status(&self) -> WorkerStatus {
        *self.status.lock().expect("status lock")
    }

    /// Catalog descriptors of the tools this worker serves.
    pub fn descriptors(&self) -> &[ToolDescriptor] {
        &self.descriptors
    }

    /// Invoke a tool on this worker, serialized with other invocations.
    pub async fn invoke(
        &self,
        tool_name: &str,
        arguments: BTreeMap<String, Value>,
    ) -> Result<Value, RpcError> {
        let _gate = self.invoke_gate.lock().await;
        self.transition(WorkerStatus::Ready, WorkerStatus::Busy);
        let outcome = self.peer.invoke(tool_name, arguments).await;
        self.transition(WorkerStatus::Busy, WorkerStatus::Ready);
        outcome
    }

    fn set_status(&self, next: WorkerStatus) {
        *self.status.lock().expect("status lock") = next;
    }

    /// Move to `next` only if currently `from`; teardown states win.
    fn transition(&self, from: WorkerStatus, next: WorkerStatus) {
        let mut status = self.status.lock().expect("status lock");
        if *status == from {
            *status = next;
        }
    }
}

/// The request-scoped set of worker processes.
pub struct WorkerPool {
    workers: Vec<Arc<WorkerHandle>>,
    shutdown_grace: Duration,
    torn_down: AtomicBool,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field(
                "domains",
                &self.workers.iter().map(|w| w.domain).collect::<Vec<_>>(),
            )
            .field("shutdown_grace", &self.shutdown_grace)
            .field("torn_down", &self.torn_down)
            .finish()
    }
}

impl WorkerPool {
    /// Spawn one worker per domain and complete the pool handshake.
    ///
    /// Scope coverage is checked before any process starts. On any
    /// failure the partially started pool is torn down before returning.
    pub async fn spawn(
        launcher: &dyn WorkerLauncher,
        domains: &BTreeSet<Domain>,
        bundle: &CredentialBundle,
        handshake_timeout: Duration,
        shutdown_grace: Duration,
    ) -> Result<Self, PoolError> {
        for domain in domains {
            let missing = bundle.missing_scopes(*domain);
            if !missing.is_empty() {
                return Err(PoolError::MissingScopes {
                    domain: *domain,
                    missing,
                });
            }
        }

        let mut workers: Vec<Arc<WorkerHandle>> = Vec::with_capacity(domains.len());
        for domain in domains {
            match start_worker(launcher, *domain, bundle) {
                Ok(handle) => workers.push(Arc::new(handle)),
                Err(e) => {
                    teardown_workers(&workers, shutdown_grace).await;
                    return Err(e);
                }
            }
        }

        // One deadline bounds the whole handshake; the read loops collect
        // manifests concurrently while we await them in order.
        let deadline = Instant::now() + handshake_timeout;
        for handle in &workers {
            if let Err(e) = await_manifest(handle, deadline).await {
                teardown_workers(&workers, shutdown_grace).await;
                return Err(e);
            }
        }

        info!(worker_count = workers.len(), "Worker pool ready");
        Ok(Self {
            workers,
            shutdown_grace,
            torn_down: AtomicBool::new(false),
        })
    }

    /// Handles of every worker in the pool.
    pub fn workers(&self) -> &[Arc<WorkerHandle>] {
        &self.workers
    }

    /// Close every worker's stdin and wait for the processes to exit,
    /// killing any that outlive the grace period. Idempotent; later calls
    /// return immediately.
    pub async fn teardown(&self) {
        if self.torn_down.swap(true, Ordering::SeqCst) {
            return;
        }
        teardown_workers(&self.workers, self.shutdown_grace).await;
    }
}

fn start_worker(
    launcher: &dyn WorkerLauncher,
    domain: Domain,
    bundle: &CredentialBundle,
) -> Result<WorkerHandle, PoolError> {
    let startup_error = |cause: String| PoolError::WorkerStartupFailed { domain, cause };

    let mut command = launcher.command(domain, bundle);
    command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command.spawn().map_err(|e| startup_error(e.to_string()))?;
    let pid = child.id();

    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| startup_error("stdin not captured".to_string()))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| startup_error("stdout not captured".to_string()))?;
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(domain = %domain, "worker: {line}");
            }
        });
    }

    debug!(domain = %domain, pid = ?pid, "Worker process spawned");
    Ok(WorkerHandle {
        domain,
        pid,
        peer: RpcPeer::spawn(stdout, stdin),
        child: Mutex::new(child),
        status: StdMutex::new(WorkerStatus::Starting),
        invoke_gate: Mutex::new(()),
        descriptors: catalog::domain_tools(domain),
    })
}

/// Await one worker's manifest under the pool deadline and verify it
/// against the compiled catalog.
async fn await_manifest(handle: &WorkerHandle, deadline: Instant) -> Result<(), PoolError> {
    let startup_error = |cause: String| PoolError::WorkerStartupFailed {
        domain: handle.domain,
        cause,
    };

    let tools = match timeout_at(deadline, handle.peer.manifest()).await {
        Ok(Ok(tools)) => tools,
        Ok(Err(e)) => return Err(startup_error(format!("handshake failed: {e}"))),
        Err(_) => return Err(startup_error("handshake timed out".to_string())),
    };

    if tools != handle.descriptors {
        return Err(startup_error(format!(
            "manifest does not match the compiled catalog ({} tools received)",
            tools.len()
        )));
    }

    handle.set_status(WorkerStatus::Ready);
    debug!(domain = %handle.domain, "Worker handshake complete");
    Ok(())
}

async fn teardown_workers(workers: &[Arc<WorkerHandle>], grace: Duration) {
    for handle in workers {
        handle.set_status(WorkerStatus::Closing);
        if let Err(e) = handle.peer.close().await {
            debug!(domain = %handle.domain, error = %e, "Worker channel already closed");
        }
    }

    for handle in workers {
        let mut child = handle.child.lock().await;
        match timeout(grace, child.wait()).await {
            Ok(Ok(status)) => {
                debug!(domain = %handle.domain, exit = ?status.code(), "Worker exited")
            }
            Ok(Err(e)) => warn!(domain = %handle.domain, error = %e, "Worker wait failed"),
            Err(_) => {
                warn!(domain = %handle.domain, "Worker outlived grace period, killing");
                if let Err(e) = child.start_kill() {
                    warn!(domain = %handle.domain, error = %e, "Worker kill failed");
                }
                let _ = child.wait().await;
            }
        }
        handle.set_status(WorkerStatus::Terminated);
    }
}
