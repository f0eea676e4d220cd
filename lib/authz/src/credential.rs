//! Cached password digests for offline verification.
//!
//! The digest is a single unsalted SHA-256 pass. It exists so the server can
//! check a password locally when the upstream authenticator is unavailable;
//! it is not a password store and must not be the primary control.

use chrono::Utc;
use radius_access_core::{AuthorizationRecord, ServerContext};
use radius_access_store::AuthorizationStore;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Hashes a password to 64 lowercase hex characters.
#[must_use]
pub fn hash_password(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

/// Returns true if the password hashes to `digest`.
///
/// The hex comparison ignores case.
#[must_use]
pub fn verify_password(password: &str, digest: &str) -> bool {
    hash_password(password).eq_ignore_ascii_case(digest)
}

/// Reads and writes password digests on existing grants.
#[derive(Clone)]
pub struct CredentialStore {
    context: ServerContext,
    store: Arc<dyn AuthorizationStore>,
}

impl CredentialStore {
    /// Creates a credential store scoped to one server context.
    #[must_use]
    pub fn new(context: ServerContext, store: Arc<dyn AuthorizationStore>) -> Self {
        Self { context, store }
    }

    /// Caches the digest of `password` on the user's grant.
    ///
    /// Returns false, and writes nothing, if the user has no grant or the
    /// store failed.
    #[instrument(skip(self, password), fields(server_context = %self.context))]
    pub async fn update_password(&self, username: &str, password: &str) -> bool {
        let digest = hash_password(password);
        match self
            .store
            .set_password_hash(&self.context, username, &digest, Utc::now())
            .await
        {
            Ok(true) => {
                info!("password digest updated");
                true
            }
            Ok(false) => {
                warn!("no grant to attach password digest to");
                false
            }
            Err(e) => {
                error!(error = %e, "failed to update password digest");
                false
            }
        }
    }

    /// Fetches the user's grant, including any cached digest.
    #[instrument(skip(self), fields(server_context = %self.context))]
    pub async fn credential(&self, username: &str) -> Option<AuthorizationRecord> {
        match self.store.find(&self.context, username).await {
            Ok(record) => record,
            Err(e) => {
                error!(error = %e, "failed to read credential");
                None
            }
        }
    }

    /// Checks a password against the user's cached digest.
    ///
    /// False when there is no grant, no digest, or the digest does not match.
    pub async fn verify_cached(&self, username: &str, password: &str) -> bool {
        let Some(record) = self.credential(username).await else {
            return false;
        };
        let Some(digest) = record.password_hash.as_deref() else {
            debug!(username, "no cached password digest");
            return false;
        };
        verify_password(password, digest)
    }
}
