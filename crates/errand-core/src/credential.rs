//! Delegated credential bundle.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::Domain;

/// The minimal delegated-authority data a worker needs to act as a
/// specific user.
///
/// Owned by the worker pool manager for the lifetime of one request and
/// never persisted by the core; the durable store behind the
/// `CredentialStore` boundary is an external collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialBundle {
    /// Identity of the user this bundle acts for.
    pub user_id: String,

    /// Durable OAuth refresh token obtained at login.
    pub refresh_token: String,

    /// OAuth client id of the application.
    pub client_id: String,

    /// OAuth client secret of the application.
    pub client_secret: String,

    /// Token endpoint the worker exchanges the refresh token at.
    pub token_endpoint: String,

    /// Scopes the stored delegation covers.
    pub scopes: BTreeSet<String>,
}

impl CredentialBundle {
    /// Check that this bundle covers every scope `domain` requires.
    ///
    /// The pool manager calls this before spawning a worker for the
    /// domain; a worker is never started with insufficient delegation.
    pub fn covers_domain(&self, domain: Domain) -> bool {
        domain
            .required_scopes()
            .iter()
            .all(|scope| self.scopes.contains(*scope))
    }

    /// Scopes required by `domain` that this bundle is missing.
    pub fn missing_scopes(&self, domain: Domain) -> Vec<&'static str> {
        domain
            .required_scopes()
            .iter()
            .filter(|scope| !self.scopes.contains(**scope))
            .copied()
            .collect()
    }
}

/// Errors from resolving a user's delegated credential.
///
/// Both variants are fatal to the request and surface before any worker
/// process is spawned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    /// No stored delegated credential for this user.
    #[error("No stored credential for user: {0}")]
    NotFound(String),

    /// The stored credential is known invalid (marked revoked by the
    /// login flow or the provider).
    #[error("Stored credential for user {0} has been revoked")]
    Revoked(String),
}
