//! Tiered authorization resolver.

use radius_access_core::{AuthorizationRecord, NewAuthorization, ServerContext};
use radius_access_directory::Directory;
use radius_access_store::{AuthorizationStore, DatabaseError, InsertOutcome};
use rootcause::prelude::Report;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Decides whether a user may authenticate against this server.
///
/// Grants already in the local store are authoritative and never re-checked
/// against the directory. A miss falls back to the directory, and a hit
/// there is written back so the next check stays local. Removing a user from
/// the directory does not revoke a cached grant; only
/// [`remove_allowed_user`](Self::remove_allowed_user) does. Usernames match
/// grants without regard to case, as they do in the directory.
///
/// There is no lock around the read-then-write-back sequence. Concurrent
/// first-time checks for the same user all race to insert, and the store's
/// uniqueness guarantee keeps exactly one row.
#[derive(Clone)]
pub struct AccessResolver {
    context: ServerContext,
    store: Arc<dyn AuthorizationStore>,
    directory: Arc<dyn Directory>,
}

impl AccessResolver {
    /// Creates a resolver scoped to one server context.
    #[must_use]
    pub fn new(
        context: ServerContext,
        store: Arc<dyn AuthorizationStore>,
        directory: Arc<dyn Directory>,
    ) -> Self {
        Self {
            context,
            store,
            directory,
        }
    }

    /// Returns the server context every operation is scoped to.
    #[must_use]
    pub fn context(&self) -> &ServerContext {
        &self.context
    }

    /// Returns true if the user may authenticate.
    ///
    /// Never fails: a store error or an unreachable directory is a denial.
    #[instrument(skip(self), fields(server_context = %self.context))]
    pub async fn is_allowed(&self, username: &str) -> bool {
        match self.store.find(&self.context, username).await {
            Ok(Some(_)) => {
                debug!("user found in local store");
                return true;
            }
            Ok(None) => {
                debug!("user not in local store, checking directory");
            }
            Err(e) => {
                error!(error = %e, "local store lookup failed, denying");
                return false;
            }
        }

        let Some(identity) = self.directory.lookup(username).await else {
            info!("user not found in local store or directory, denying");
            return false;
        };

        self.write_back(NewAuthorization::from(identity)).await;
        true
    }

    /// Caches a directory hit. The outcome is only logged; it never changes
    /// the decision already made.
    async fn write_back(&self, grant: NewAuthorization) {
        match self.store.insert(&self.context, &grant).await {
            Ok(InsertOutcome::Inserted) => {
                info!(
                    user_principal_name = %grant.user_principal_name,
                    "cached directory grant in local store"
                );
            }
            Ok(InsertOutcome::AlreadyPresent) => {
                debug!(
                    user_principal_name = %grant.user_principal_name,
                    "grant already cached by a concurrent check"
                );
            }
            Err(e) => {
                warn!(
                    user_principal_name = %grant.user_principal_name,
                    error = %e,
                    "could not cache directory grant"
                );
            }
        }
    }

    /// Grants access directly, without consulting the directory.
    ///
    /// Returns false if the user already has a grant or the store failed.
    #[instrument(skip(self, grant), fields(server_context = %self.context, username = %grant.user_principal_name))]
    pub async fn add_allowed_user(&self, grant: NewAuthorization) -> bool {
        match self.store.insert(&self.context, &grant).await {
            Ok(InsertOutcome::Inserted) => {
                info!("user added to local store");
                true
            }
            Ok(InsertOutcome::AlreadyPresent) => {
                warn!("user already has a grant");
                false
            }
            Err(e) => {
                error!(error = %e, "failed to add user");
                false
            }
        }
    }

    /// Revokes a user's grant.
    ///
    /// Returns true once the delete has run, whether or not a grant existed;
    /// false only if the store failed.
    #[instrument(skip(self), fields(server_context = %self.context))]
    pub async fn remove_allowed_user(&self, username: &str) -> bool {
        match self.store.delete(&self.context, username).await {
            Ok(removed) => {
                info!(removed, "user removed from local store");
                true
            }
            Err(e) => {
                error!(error = %e, "failed to remove user");
                false
            }
        }
    }

    /// Replaces the display name on an existing grant.
    ///
    /// Returns false if no grant matched or the store failed.
    #[instrument(skip(self), fields(server_context = %self.context))]
    pub async fn update_display_name(&self, username: &str, display_name: Option<String>) -> bool {
        match self
            .store
            .update_display_name(&self.context, username, display_name.as_deref())
            .await
        {
            Ok(true) => {
                info!("display name updated");
                true
            }
            Ok(false) => {
                warn!("no grant to update");
                false
            }
            Err(e) => {
                error!(error = %e, "failed to update display name");
                false
            }
        }
    }

    /// Lists every grant for this server, ordered by principal name.
    ///
    /// # Errors
    ///
    /// Returns the store failure.
    pub async fn allowed_users(&self) -> Result<Vec<AuthorizationRecord>, Report<DatabaseError>> {
        self.store.list(&self.context).await
    }
}
