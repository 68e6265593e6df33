//! Credential store boundary.
//!
//! The orchestrator never persists credentials itself; it reads stored
//! delegations through [`CredentialStore`] and hands a request-scoped
//! [`CredentialBundle`] to the worker pool.

use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use errand_core::{CredentialBundle, CredentialError};

/// One stored delegation record, keyed externally by user id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCredential {
    /// Durable OAuth refresh token obtained at login.
    pub refresh_token: String,

    /// OAuth client id of the application.
    pub client_id: String,

    /// OAuth client secret of the application.
    pub client_secret: String,

    /// Token endpoint the refresh token is exchanged at.
    pub token_endpoint: String,

    /// Scopes the delegation covers.
    pub scopes: BTreeSet<String>,

    /// Set when the login flow or the provider invalidated the token.
    #[serde(default)]
    pub revoked: bool,
}

/// Read access to the durable credential store.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Fetch the stored delegation for a user, if any.
    async fn get(&self, user_id: &str) -> Option<StoredCredential>;
}

/// Resolve a user's delegation into a request-scoped bundle.
///
/// Fails fast with [`CredentialError`] before any worker is spawned.
pub async fn resolve(
    store: &dyn CredentialStore,
    user_id: &str,
) -> Result<CredentialBundle, CredentialError> {
    let record = store
        .get(user_id)
        .await
        .ok_or_else(|| CredentialError::NotFound(user_id.to_string()))?;
    if record.revoked {
        return Err(CredentialError::Revoked(user_id.to_string()));
    }
    Ok(CredentialBundle {
        user_id: user_id.to_string(),
        refresh_token: record.refresh_token,
        client_id: record.client_id,
        client_secret: record.client_secret,
        token_endpoint: record.token_endpoint,
        scopes: record.scopes,
    })
}

/// In-memory store for tests and demos.
#[derive(Default)]
pub struct InMemoryCredentialStore {
    records: RwLock<HashMap<String, StoredCredential>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a user's record.
    pub fn insert(&self, user_id: impl Into<String>, record: StoredCredential) {
        self.records
            .write()
            .expect("records lock")
            .insert(user_id.into(), record);
    }

    /// Mark a user's record as revoked, if present.
    pub fn revoke(&self, user_id: &str) {
        if let Some(record) = self.records.write().expect("records lock").get_mut(user_id) {
            record.revoked = true;
        }
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn get(&self, user_id: &str) -> Option<StoredCredential> {
        self.records
            .read()
            .expect("records lock")
            .get(user_id)
            .cloned()
    }
}
