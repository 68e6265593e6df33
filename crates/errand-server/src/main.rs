//! Errand HTTP server.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

mod args;
mod http;
mod store;

use args::ServerArgs;
use errand_orchestrator::{
    AuditSink, BinaryLauncher, FsAuditSink, NoopAuditSink, Orchestrator, OrchestratorConfig,
    RulePlanner,
};
use http::AppState;
use store::FileCredentialStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = ServerArgs::parse();

    let audit: Arc<dyn AuditSink> = match &args.audit_dir {
        Some(dir) => Arc::new(FsAuditSink::new(dir)),
        None => Arc::new(NoopAuditSink),
    };

    let mut launcher = BinaryLauncher::new(&args.worker_program);
    if let Some(api_base) = &args.api_base {
        launcher = launcher.with_api_base(api_base);
    }

    let config = OrchestratorConfig::default()
        .with_request_timeout(Some(Duration::from_secs(args.request_timeout_secs)));

    let orchestrator = Orchestrator::new(
        Arc::new(FileCredentialStore::new(&args.credentials)),
        Arc::new(RulePlanner::new()),
        Arc::new(launcher),
        audit,
        config,
    );

    let router = http::create_router(Arc::new(AppState { orchestrator }));
    let listener = TcpListener::bind(args.bind).await?;
    info!(
        addr = %args.bind,
        credentials = %args.credentials.display(),
        "Errand server listening"
    );
    axum::serve(listener, router).await?;

    Ok(())
}
