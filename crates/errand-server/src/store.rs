//! File-backed credential store.
//!
//! A JSON object mapping user ids to stored delegations. Read on every
//! lookup so edits (new logins, revocations) take effect without a
//! restart.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use tracing::warn;

use errand_orchestrator::{CredentialStore, StoredCredential};

pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn get(&self, user_id: &str) -> Option<StoredCredential> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Credential store unreadable");
                return None;
            }
        };
        let records: HashMap<String, StoredCredential> = match serde_json::from_slice(&bytes) {
            Ok(records) => records,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Credential store malformed");
                return None;
            }
        };
        records.get(user_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lookup_by_user_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        std::fs::write(
            &path,
            r#"{
                "alice@example.com": {
                    "refresh_token": "rt-1",
                    "client_id": "cid",
                    "client_secret": "secret",
                    "token_endpoint": "https://oauth2.googleapis.com/token",
                    "scopes": ["https://www.googleapis.com/auth/gmail.compose"],
                    "revoked": false
                }
            }"#,
        )
        .unwrap();

        let store = FileCredentialStore::new(&path);
        let record = store.get("alice@example.com").await.unwrap();
        assert_eq!(record.refresh_token, "rt-1");
        assert!(!record.revoked);
        assert!(store.get("bob@example.com").await.is_none());
    }

    #[tokio::test]
    async fn test_missing_file_yields_no_record() {
        let store = FileCredentialStore::new("/nonexistent/credentials.json");
        assert!(store.get("alice@example.com").await.is_none());
    }

    #[tokio::test]
    async fn test_revoked_flag_defaults_to_false() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        std::fs::write(
            &path,
            r#"{
                "alice@example.com": {
                    "refresh_token": "rt-1",
                    "client_id": "cid",
                    "client_secret": "secret",
                    "token_endpoint": "https://oauth2.googleapis.com/token",
                    "scopes": []
                }
            }"#,
        )
        .unwrap();

        let store = FileCredentialStore::new(&path);
        assert!(!store.get("alice@example.com").await.unwrap().revoked);
    }
}
