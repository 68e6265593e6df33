//! End-to-end request flows through the orchestrator facade, using
//! scripted worker processes.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::process::Command;

use errand_core::{catalog, CredentialBundle, Domain, FailureKind, Outcome};
use errand_orchestrator::{
    CredentialStore, FsAuditSink, InMemoryCredentialStore, Orchestrator, OrchestratorConfig,
    OrchestratorError, RulePlanner, StoredCredential, WorkerLauncher,
};
use errand_rpc::Frame;

/// Launches `sh -c <script>` regardless of domain, counting launches.
struct ScriptLauncher {
    script: String,
    launches: AtomicUsize,
}

impl ScriptLauncher {
    fn new(script: impl Into<String>) -> Self {
        Self {
            script: script.into(),
            launches: AtomicUsize::new(0),
        }
    }

    fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }
}

impl WorkerLauncher for ScriptLauncher {
    fn command(&self, _domain: Domain, _bundle: &CredentialBundle) -> Command {
        self.launches.fetch_add(1, Ordering::SeqCst);
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(&self.script);
        cmd
    }
}

fn mail_manifest_script(dir: &Path, idle_after: bool) -> String {
    let line = Frame::manifest(catalog::domain_tools(Domain::Mail))
        .to_line()
        .unwrap();
    let path = dir.join("mail.manifest");
    std::fs::write(&path, format!("{line}\n")).unwrap();
    if idle_after {
        format!("cat '{}'; cat >/dev/null", path.display())
    } else {
        // Crash right after the handshake.
        format!("cat '{}'", path.display())
    }
}

fn store_with_alice() -> Arc<InMemoryCredentialStore> {
    let store = Arc::new(InMemoryCredentialStore::new());
    store.insert(
        "alice@example.com",
        StoredCredential {
            refresh_token: "rt-1".to_string(),
            client_id: "cid".to_string(),
            client_secret: "secret".to_string(),
            token_endpoint: "https://oauth2.googleapis.com/token".to_string(),
            scopes: Domain::ALL
                .iter()
                .flat_map(|d| d.required_scopes())
                .map(|s| s.to_string())
                .collect(),
            revoked: false,
        },
    );
    store
}

fn orchestrator(
    store: Arc<dyn CredentialStore>,
    launcher: Arc<ScriptLauncher>,
    audit_dir: &Path,
) -> Orchestrator {
    Orchestrator::new(
        store,
        Arc::new(RulePlanner::new()),
        launcher,
        Arc::new(FsAuditSink::new(audit_dir)),
        OrchestratorConfig::default()
            .with_handshake_timeout(Duration::from_secs(5))
            .with_invoke_timeout(Duration::from_millis(300))
            .with_shutdown_grace(Duration::from_millis(500)),
    )
}

#[tokio::test]
async fn test_unknown_user_fails_before_any_spawn() {
    let dir = tempfile::tempdir().unwrap();
    let launcher = Arc::new(ScriptLauncher::new("sleep 30"));
    let engine = orchestrator(store_with_alice(), Arc::clone(&launcher), dir.path());

    let err = engine
        .handle_request("mallory@example.com", "Email bob@example.com a 'Hi' note")
        .await
        .unwrap_err();

    assert!(matches!(err, OrchestratorError::Credential(_)));
    assert_eq!(launcher.launches(), 0);
}

#[tokio::test]
async fn test_unroutable_request_spawns_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let launcher = Arc::new(ScriptLauncher::new("sleep 30"));
    let engine = orchestrator(store_with_alice(), Arc::clone(&launcher), dir.path());

    let err = engine
        .handle_request(
            "alice@example.com",
            "Download the 'taxes' file from my drive",
        )
        .await
        .unwrap_err();

    assert!(matches!(err, OrchestratorError::Unroutable(_)));
    assert_eq!(launcher.launches(), 0);
}

#[tokio::test]
async fn test_unresponsive_tool_becomes_a_node_failure() {
    let dir = tempfile::tempdir().unwrap();
    // Worker that completes the handshake but never answers invokes.
    let launcher = Arc::new(ScriptLauncher::new(mail_manifest_script(dir.path(), true)));
    let engine = orchestrator(store_with_alice(), Arc::clone(&launcher), dir.path());

    let outcome = engine
        .handle_request("alice@example.com", "Email bob@example.com a 'Hi' note")
        .await
        .unwrap();

    assert_eq!(launcher.launches(), 1);
    assert_eq!(outcome.results.len(), 1);
    match &outcome.results[0].outcome {
        Outcome::Failure { kind, message } => {
            assert_eq!(*kind, FailureKind::Upstream);
            assert!(message.contains("timed out"), "message: {message}");
        }
        other => panic!("expected a node failure: {:?}", other),
    }
    assert!(outcome.response_text.contains("mail.send_message: failed"));

    // The transcript was archived despite the failure.
    let audit = std::fs::read_to_string(dir.path().join("alice@example.com.jsonl")).unwrap();
    assert!(audit.contains("worker pool torn down"));
}

#[tokio::test]
async fn test_worker_crash_is_contained_to_its_node() {
    let dir = tempfile::tempdir().unwrap();
    // Worker exits immediately after the manifest; the invoke finds the
    // channel closed.
    let launcher = Arc::new(ScriptLauncher::new(mail_manifest_script(dir.path(), false)));
    let engine = orchestrator(store_with_alice(), Arc::clone(&launcher), dir.path());

    let outcome = engine
        .handle_request("alice@example.com", "Email bob@example.com a 'Hi' note")
        .await
        .unwrap();

    assert_eq!(outcome.results.len(), 1);
    match &outcome.results[0].outcome {
        Outcome::Failure { kind, .. } => assert_eq!(*kind, FailureKind::Upstream),
        other => panic!("expected a node failure: {:?}", other),
    }
}

#[tokio::test]
async fn test_revoked_credential_fails_fast() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_with_alice();
    store.revoke("alice@example.com");
    let launcher = Arc::new(ScriptLauncher::new("sleep 30"));
    let engine = orchestrator(store, Arc::clone(&launcher), dir.path());

    let err = engine
        .handle_request("alice@example.com", "Email bob@example.com a 'Hi' note")
        .await
        .unwrap_err();

    assert!(matches!(err, OrchestratorError::Credential(_)));
    assert_eq!(launcher.launches(), 0);
}
