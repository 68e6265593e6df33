//! Command-line arguments.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

/// HTTP front end for the errand assistant engine.
#[derive(Debug, Parser)]
#[command(name = "errand-server", version, about)]
pub struct ServerArgs {
    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1:8080")]
    pub bind: SocketAddr,

    /// Path to the JSON credential store (user id to stored delegation).
    #[arg(long)]
    pub credentials: PathBuf,

    /// Directory for audit transcripts. Archiving is disabled when unset.
    #[arg(long)]
    pub audit_dir: Option<PathBuf>,

    /// Path to the worker binary spawned per domain.
    #[arg(long, default_value = "errand-worker")]
    pub worker_program: PathBuf,

    /// Override the provider API base URL workers talk to.
    #[arg(long)]
    pub api_base: Option<String>,

    /// Overall per-request deadline in seconds.
    #[arg(long, default_value_t = 300)]
    pub request_timeout_secs: u64,
}
