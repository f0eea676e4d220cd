//! Test doubles for the store and directory.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use radius_access_core::{AuthorizationRecord, IdentityRecord, NewAuthorization, ServerContext};
use radius_access_directory::Directory;
use radius_access_store::{
    AuthorizationStore, DatabaseError, InMemoryAuthorizationStore, InsertOutcome,
};
use rootcause::prelude::Report;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Directory with a fixed set of users that counts lookups.
///
/// Like Graph, it resolves principal names without regard to case and
/// answers with the spelling it was given in `with_user`.
#[derive(Default)]
pub struct FakeDirectory {
    users: HashMap<String, IdentityRecord>,
    lookups: AtomicUsize,
}

impl FakeDirectory {
    pub fn with_user(mut self, principal_name: &str, display_name: &str) -> Self {
        self.users.insert(
            principal_name.to_lowercase(),
            IdentityRecord::new(principal_name, Some(display_name.to_string())),
        );
        self
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Directory for FakeDirectory {
    async fn lookup(&self, principal_name: &str) -> Option<IdentityRecord> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        // Give concurrent callers a chance to interleave between the
        // store miss and the write-back.
        tokio::task::yield_now().await;
        self.users.get(&principal_name.to_lowercase()).cloned()
    }
}

/// In-memory store whose operations can be made to fail.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: InMemoryAuthorizationStore,
    pub fail_reads: bool,
    pub fail_writes: bool,
}

impl FlakyStore {
    pub fn failing_reads() -> Self {
        Self {
            fail_reads: true,
            ..Self::default()
        }
    }

    pub fn failing_writes() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    fn check(&self, fail: bool) -> Result<(), Report<DatabaseError>> {
        if fail {
            return Err(DatabaseError::Connection {
                details: "connection reset by peer".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

#[async_trait]
impl AuthorizationStore for FlakyStore {
    async fn find(
        &self,
        context: &ServerContext,
        user_principal_name: &str,
    ) -> Result<Option<AuthorizationRecord>, Report<DatabaseError>> {
        self.check(self.fail_reads)?;
        self.inner.find(context, user_principal_name).await
    }

    async fn insert(
        &self,
        context: &ServerContext,
        grant: &NewAuthorization,
    ) -> Result<InsertOutcome, Report<DatabaseError>> {
        self.check(self.fail_writes)?;
        self.inner.insert(context, grant).await
    }

    async fn delete(
        &self,
        context: &ServerContext,
        user_principal_name: &str,
    ) -> Result<bool, Report<DatabaseError>> {
        self.check(self.fail_writes)?;
        self.inner.delete(context, user_principal_name).await
    }

    async fn update_display_name(
        &self,
        context: &ServerContext,
        user_principal_name: &str,
        display_name: Option<&str>,
    ) -> Result<bool, Report<DatabaseError>> {
        self.check(self.fail_writes)?;
        self.inner
            .update_display_name(context, user_principal_name, display_name)
            .await
    }

    async fn set_password_hash(
        &self,
        context: &ServerContext,
        user_principal_name: &str,
        password_hash: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, Report<DatabaseError>> {
        self.check(self.fail_writes)?;
        self.inner
            .set_password_hash(context, user_principal_name, password_hash, updated_at)
            .await
    }

    async fn list(
        &self,
        context: &ServerContext,
    ) -> Result<Vec<AuthorizationRecord>, Report<DatabaseError>> {
        self.check(self.fail_reads)?;
        self.inner.list(context).await
    }
}

pub fn site(name: &str) -> ServerContext {
    ServerContext::new(name).expect("valid context")
}
