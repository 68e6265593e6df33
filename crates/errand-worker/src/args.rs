//! Worker command-line contract.

use clap::Parser;

use errand_core::Domain;

/// Startup arguments of a domain worker.
///
/// The credential fields arrive on the command line per the worker startup
/// contract; they never travel over the RPC channel.
#[derive(Debug, Parser)]
#[command(name = "errand-worker")]
pub struct WorkerArgs {
    /// Capability domain this worker serves (mail, calendar, storage).
    #[arg(long)]
    pub domain: Domain,

    /// Delegated OAuth refresh token for the acting user.
    #[arg(long)]
    pub refresh_token: String,

    /// OAuth client id of the application.
    #[arg(long)]
    pub client_id: String,

    /// OAuth client secret of the application.
    #[arg(long)]
    pub client_secret: String,

    /// Token endpoint for the refresh-token exchange.
    #[arg(long, default_value = "https://oauth2.googleapis.com/token")]
    pub token_endpoint: String,

    /// Base URL of the provider REST API.
    #[arg(long, default_value = "https://www.googleapis.com")]
    pub api_base: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_args() {
        let args = WorkerArgs::parse_from([
            "errand-worker",
            "--domain",
            "calendar",
            "--refresh-token",
            "rt-1",
            "--client-id",
            "cid",
            "--client-secret",
            "secret",
        ]);
        assert_eq!(args.domain, Domain::Calendar);
        assert_eq!(args.token_endpoint, "https://oauth2.googleapis.com/token");
        assert_eq!(args.api_base, "https://www.googleapis.com");
    }

    #[test]
    fn test_unknown_domain_rejected() {
        let result = WorkerArgs::try_parse_from([
            "errand-worker",
            "--domain",
            "telephony",
            "--refresh-token",
            "rt",
            "--client-id",
            "c",
            "--client-secret",
            "s",
        ]);
        assert!(result.is_err());
    }
}
