//! In-memory grant store.
//!
//! Useful for tests and for running without a database. Entry-level
//! arbitration in the map plays the role of the unique constraint: only one
//! concurrent writer can claim a vacant key. Keys fold the principal name to
//! lowercase, so every spelling of a user shares one grant.

use crate::error::DatabaseError;
use crate::repository::{AuthorizationStore, InsertOutcome};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use radius_access_core::{AuthorizationRecord, NewAuthorization, ServerContext};
use rootcause::prelude::Report;
use std::sync::atomic::{AtomicI64, Ordering};

type GrantKey = (ServerContext, String);

/// Grant store backed by a concurrent hash map.
#[derive(Debug)]
pub struct InMemoryAuthorizationStore {
    records: DashMap<GrantKey, AuthorizationRecord>,
    next_id: AtomicI64,
}

impl InMemoryAuthorizationStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            next_id: AtomicI64::new(1),
        }
    }

    /// Returns the number of grants across all contexts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if no grants are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn key(context: &ServerContext, user_principal_name: &str) -> GrantKey {
        (context.clone(), user_principal_name.to_lowercase())
    }
}

impl Default for InMemoryAuthorizationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthorizationStore for InMemoryAuthorizationStore {
    async fn find(
        &self,
        context: &ServerContext,
        user_principal_name: &str,
    ) -> Result<Option<AuthorizationRecord>, Report<DatabaseError>> {
        Ok(self
            .records
            .get(&Self::key(context, user_principal_name))
            .map(|entry| entry.value().clone()))
    }

    async fn insert(
        &self,
        context: &ServerContext,
        grant: &NewAuthorization,
    ) -> Result<InsertOutcome, Report<DatabaseError>> {
        match self
            .records
            .entry(Self::key(context, &grant.user_principal_name))
        {
            Entry::Occupied(_) => Ok(InsertOutcome::AlreadyPresent),
            Entry::Vacant(vacant) => {
                vacant.insert(AuthorizationRecord {
                    id: self.next_id.fetch_add(1, Ordering::Relaxed),
                    user_principal_name: grant.user_principal_name.clone(),
                    display_name: grant.display_name.clone(),
                    server_context: context.clone(),
                    password_hash: None,
                    last_password_update: None,
                    created_at: Utc::now(),
                });
                Ok(InsertOutcome::Inserted)
            }
        }
    }

    async fn delete(
        &self,
        context: &ServerContext,
        user_principal_name: &str,
    ) -> Result<bool, Report<DatabaseError>> {
        Ok(self
            .records
            .remove(&Self::key(context, user_principal_name))
            .is_some())
    }

    async fn update_display_name(
        &self,
        context: &ServerContext,
        user_principal_name: &str,
        display_name: Option<&str>,
    ) -> Result<bool, Report<DatabaseError>> {
        match self
            .records
            .get_mut(&Self::key(context, user_principal_name))
        {
            Some(mut record) => {
                record.display_name = display_name.map(str::to_string);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn set_password_hash(
        &self,
        context: &ServerContext,
        user_principal_name: &str,
        password_hash: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, Report<DatabaseError>> {
        match self
            .records
            .get_mut(&Self::key(context, user_principal_name))
        {
            Some(mut record) => {
                record.password_hash = Some(password_hash.to_string());
                record.last_password_update = Some(updated_at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list(
        &self,
        context: &ServerContext,
    ) -> Result<Vec<AuthorizationRecord>, Report<DatabaseError>> {
        let mut records: Vec<AuthorizationRecord> = self
            .records
            .iter()
            .filter(|entry| &entry.key().0 == context)
            .map(|entry| entry.value().clone())
            .collect();
        records.sort_by(|a, b| a.user_principal_name.cmp(&b.user_principal_name));
        Ok(records)
    }
}
