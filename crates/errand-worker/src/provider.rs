//! Thin authorized client for the provider REST API.

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Errors from provider API calls.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Transport-level failure.
    #[error("Provider request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered with a non-success status.
    #[error("Provider returned HTTP {status}: {detail}")]
    Api { status: u16, detail: String },
}

/// Authorized client bound to one access token and one API base.
///
/// Constructed per worker process, never shared across requests or users.
#[derive(Debug, Clone)]
pub struct ProviderClient {
    http: reqwest::Client,
    api_base: String,
    access_token: String,
}

impl ProviderClient {
    /// Create a client for the given base URL and bearer token.
    pub fn new(http: reqwest::Client, api_base: String, access_token: String) -> Self {
        Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            access_token,
        }
    }

    /// GET a JSON document from `path` with query parameters.
    pub async fn get_json(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Value, ProviderError> {
        let url = format!("{}{}", self.api_base, path);
        debug!(url = %url, "Provider GET");
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(query)
            .send()
            .await?;
        Self::into_json(response).await
    }

    /// POST a JSON body to `path`.
    pub async fn post_json(&self, path: &str, body: &Value) -> Result<Value, ProviderError> {
        let url = format!("{}{}", self.api_base, path);
        debug!(url = %url, "Provider POST");
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(body)
            .send()
            .await?;
        Self::into_json(response).await
    }

    async fn into_json(response: reqwest::Response) -> Result<Value, ProviderError> {
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                detail,
            });
        }
        Ok(response.json::<Value>().await?)
    }
}
