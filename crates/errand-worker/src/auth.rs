//! Refresh-token exchange.

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::args::WorkerArgs;

/// Errors from the token exchange.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The token endpoint was unreachable.
    #[error("Token endpoint request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The token endpoint rejected the exchange.
    #[error("Token exchange rejected (HTTP {status}): {detail}")]
    Rejected { status: u16, detail: String },
}

/// A live access token obtained from the refresh grant.
#[derive(Debug, Clone, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    #[serde(rename = "expires_in", default)]
    pub expires_in_secs: u64,
}

/// Exchange the delegated refresh token for a live access token.
///
/// Runs once at startup, before the worker emits its manifest; a worker
/// never accepts a tool call it could not act on.
pub async fn exchange_refresh_token(
    http: &reqwest::Client,
    args: &WorkerArgs,
) -> Result<AccessToken, AuthError> {
    let scopes = args.domain.required_scopes().join(" ");
    let params = [
        ("grant_type", "refresh_token"),
        ("refresh_token", args.refresh_token.as_str()),
        ("client_id", args.client_id.as_str()),
        ("client_secret", args.client_secret.as_str()),
        ("scope", scopes.as_str()),
    ];

    debug!(endpoint = %args.token_endpoint, "Exchanging refresh token");

    let response = http
        .post(&args.token_endpoint)
        .form(&params)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let detail = response.text().await.unwrap_or_default();
        return Err(AuthError::Rejected {
            status: status.as_u16(),
            detail,
        });
    }

    Ok(response.json::<AccessToken>().await?)
}
