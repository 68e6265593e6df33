//! Errand Worker Daemon
//!
//! One process per capability domain per request. The parent passes the
//! delegated credential fields on the command line; the worker exchanges
//! the refresh token for a live access token, emits its tool manifest on
//! stdout, then serves invoke frames until stdin closes.
//!
//! stdout carries the RPC channel exclusively; all logs go to stderr.

use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

mod args;
mod auth;
mod provider;
mod serve;
mod tools;

use args::WorkerArgs;
use provider::ProviderClient;
use tools::ToolSet;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing on stderr; stdout belongs to the RPC channel.
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = WorkerArgs::parse();

    info!(domain = %args.domain, "Starting errand worker");

    // Exchange the refresh token before accepting any tool call.
    let http = reqwest::Client::new();
    let token = auth::exchange_refresh_token(&http, &args).await?;

    info!(
        domain = %args.domain,
        expires_in_secs = token.expires_in_secs,
        "Access token obtained"
    );

    let provider = ProviderClient::new(http, args.api_base.clone(), token.access_token);
    let toolset = ToolSet::for_domain(args.domain, provider);

    serve::serve(tokio::io::stdin(), tokio::io::stdout(), toolset).await?;

    info!(domain = %args.domain, "Channel closed, worker exiting");
    Ok(())
}
