//! Orchestrator tuning knobs.

use std::time::Duration;

/// Timeouts and limits applied to every request.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Deadline for the whole pool handshake: every spawned worker must
    /// deliver its manifest within this window or the request fails.
    pub handshake_timeout: Duration,

    /// Per-invocation deadline; an overrun counts as an upstream failure
    /// for that node only.
    pub invoke_timeout: Duration,

    /// Overall request deadline. On expiry the remaining nodes are
    /// recorded as cancelled and the pool is torn down.
    pub request_timeout: Option<Duration>,

    /// How long teardown waits for a worker to exit after its stdin is
    /// closed before killing it.
    pub shutdown_grace: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(10),
            invoke_timeout: Duration::from_secs(60),
            request_timeout: Some(Duration::from_secs(300)),
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

impl OrchestratorConfig {
    /// Builder method to set the handshake deadline.
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Builder method to set the per-invocation deadline.
    pub fn with_invoke_timeout(mut self, timeout: Duration) -> Self {
        self.invoke_timeout = timeout;
        self
    }

    /// Builder method to set (or clear) the overall request deadline.
    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Builder method to set the teardown grace period.
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }
}
