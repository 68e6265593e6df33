//! Worker pool lifecycle against real scripted processes.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use tokio::process::Command;

use errand_core::{catalog, CredentialBundle, Domain};
use errand_orchestrator::pool::{PoolError, WorkerLauncher, WorkerPool, WorkerStatus};
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

/// Write the domain's manifest frame to a file and return a script that
/// emits it, then idles until stdin closes.
fn well_behaved_script(dir: &Path, domain: Domain) -> String {
    let line = Frame::manifest(catalog::domain_tools(domain))
        .to_line()
        .unwrap();
    let path = dir.join(format!("{domain}.manifest"));
    std::fs::write(&path, format!("{line}\n")).unwrap();
    format!("cat '{}'; cat >/dev/null", path.display())
}

fn bundle_for(domains: &[Domain]) -> CredentialBundle {
    CredentialBundle {
        user_id: "alice@example.com".to_string(),
        refresh_token: "rt-1".to_string(),
        client_id: "cid".to_string(),
        client_secret: "secret".to_string(),
        token_endpoint: "https://oauth2.googleapis.com/token".to_string(),
        scopes: domains
            .iter()
            .flat_map(|d| d.required_scopes())
            .map(|s| s.to_string())
            .collect(),
    }
}

#[tokio::test]
async fn test_spawn_handshake_and_teardown() {
    let dir = tempfile::tempdir().unwrap();
    let launcher = ScriptLauncher::new(well_behaved_script(dir.path(), Domain::Mail));
    let domains = BTreeSet::from([Domain::Mail]);

    let pool = WorkerPool::spawn(
        &launcher,
        &domains,
        &bundle_for(&[Domain::Mail]),
        Duration::from_secs(5),
        Duration::from_secs(2),
    )
    .await
    .unwrap();

    assert_eq!(pool.workers().len(), 1);
    let worker = &pool.workers()[0];
    assert_eq!(worker.domain(), Domain::Mail);
    assert_eq!(worker.status(), WorkerStatus::Ready);
    assert_eq!(worker.descriptors(), catalog::domain_tools(Domain::Mail));

    pool.teardown().await;
    assert_eq!(worker.status(), WorkerStatus::Terminated);

    // Teardown is idempotent.
    pool.teardown().await;
    assert_eq!(worker.status(), WorkerStatus::Terminated);
    assert_eq!(launcher.launches(), 1);
}

#[tokio::test]
async fn test_teardown_delivers_eof_within_the_grace_period() {
    let dir = tempfile::tempdir().unwrap();
    let launcher = ScriptLauncher::new(well_behaved_script(dir.path(), Domain::Mail));
    let domains = BTreeSet::from([Domain::Mail]);

    // A generous grace period: a cooperative worker exits on stdin EOF, so
    // teardown must finish long before the grace runs out.
    let grace = Duration::from_secs(8);
    let pool = WorkerPool::spawn(
        &launcher,
        &domains,
        &bundle_for(&[Domain::Mail]),
        Duration::from_secs(5),
        grace,
    )
    .await
    .unwrap();

    let began = Instant::now();
    pool.teardown().await;
    let elapsed = began.elapsed();
    assert!(
        elapsed < Duration::from_secs(4),
        "teardown took {elapsed:?}: the worker never saw stdin close"
    );
    assert_eq!(pool.workers()[0].status(), WorkerStatus::Terminated);
}

#[tokio::test]
async fn test_silent_worker_fails_the_handshake() {
    let launcher = ScriptLauncher::new("sleep 30");
    let domains = BTreeSet::from([Domain::Calendar]);

    let began = Instant::now();
    let err = WorkerPool::spawn(
        &launcher,
        &domains,
        &bundle_for(&[Domain::Calendar]),
        Duration::from_millis(300),
        Duration::from_millis(200),
    )
    .await
    .unwrap_err();

    match err {
        PoolError::WorkerStartupFailed { domain, cause } => {
            assert_eq!(domain, Domain::Calendar);
            assert!(cause.contains("timed out"), "cause: {cause}");
        }
        other => panic!("unexpected error: {other}"),
    }
    // The pool killed the straggler instead of waiting for it to finish.
    assert!(began.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_wrong_manifest_fails_the_handshake() {
    let dir = tempfile::tempdir().unwrap();
    // A mail worker announcing the calendar toolset.
    let line = Frame::manifest(catalog::domain_tools(Domain::Calendar))
        .to_line()
        .unwrap();
    let path = dir.path().join("wrong.manifest");
    std::fs::write(&path, format!("{line}\n")).unwrap();
    let launcher = ScriptLauncher::new(format!("cat '{}'; cat >/dev/null", path.display()));

    let err = WorkerPool::spawn(
        &launcher,
        &BTreeSet::from([Domain::Mail]),
        &bundle_for(&[Domain::Mail]),
        Duration::from_secs(5),
        Duration::from_millis(200),
    )
    .await
    .unwrap_err();

    match err {
        PoolError::WorkerStartupFailed { domain, cause } => {
            assert_eq!(domain, Domain::Mail);
            assert!(cause.contains("manifest"), "cause: {cause}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_missing_scopes_block_the_spawn() {
    let launcher = ScriptLauncher::new("sleep 30");
    let err = WorkerPool::spawn(
        &launcher,
        &BTreeSet::from([Domain::Storage]),
        &bundle_for(&[Domain::Mail]),
        Duration::from_secs(1),
        Duration::from_millis(200),
    )
    .await
    .unwrap_err();

    match err {
        PoolError::MissingScopes { domain, missing } => {
            assert_eq!(domain, Domain::Storage);
            assert!(!missing.is_empty());
        }
        other => panic!("unexpected error: {other}"),
    }
    // Checked before any process started.
    assert_eq!(launcher.launches(), 0);
}

#[tokio::test]
async fn test_one_worker_per_requested_domain() {
    let dir = tempfile::tempdir().unwrap();
    // Every domain's manifest, concatenated per process via its own file.
    let mail = well_behaved_script(dir.path(), Domain::Mail);
    let calendar = well_behaved_script(dir.path(), Domain::Calendar);

    struct PerDomainLauncher {
        mail: String,
        calendar: String,
    }
    impl WorkerLauncher for PerDomainLauncher {
        fn command(&self, domain: Domain, _bundle: &CredentialBundle) -> Command {
            let script = match domain {
                Domain::Mail => &self.mail,
                Domain::Calendar => &self.calendar,
                Domain::Storage => unreachable!("storage not requested"),
            };
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(script);
            cmd
        }
    }

    let launcher = PerDomainLauncher { mail, calendar };
    let pool = WorkerPool::spawn(
        &launcher,
        &BTreeSet::from([Domain::Mail, Domain::Calendar]),
        &bundle_for(&[Domain::Mail, Domain::Calendar]),
        Duration::from_secs(5),
        Duration::from_secs(2),
    )
    .await
    .unwrap();

    let domains: Vec<Domain> = pool.workers().iter().map(|w| w.domain()).collect();
    assert_eq!(domains, vec![Domain::Mail, Domain::Calendar]);
    assert!(pool
        .workers()
        .iter()
        .all(|w| w.status() == WorkerStatus::Ready));

    pool.teardown().await;
}
