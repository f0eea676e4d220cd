//! Authorization grant storage.

use crate::database::{Database, Execute, Param};
use crate::error::DatabaseError;
use crate::schema::GRANT_UNIQUE_CONSTRAINTS;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use radius_access_core::{AuthorizationRecord, NewAuthorization, ServerContext};
use rootcause::prelude::Report;
use sqlx::FromRow;
use sqlx::postgres::PgRow;

/// Result of inserting a grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// A new row was created.
    Inserted,
    /// A grant for the same user and context already existed; nothing changed.
    AlreadyPresent,
}

/// Storage for authorization grants, partitioned by server context.
///
/// Implementations must guarantee at most one grant per
/// (user principal name, server context) without serializing unrelated keys.
/// Principal names match without regard to case; the stored spelling is the
/// one first inserted.
#[async_trait]
pub trait AuthorizationStore: Send + Sync {
    /// Finds the grant for a user.
    async fn find(
        &self,
        context: &ServerContext,
        user_principal_name: &str,
    ) -> Result<Option<AuthorizationRecord>, Report<DatabaseError>>;

    /// Inserts a grant, reporting whether one already existed.
    async fn insert(
        &self,
        context: &ServerContext,
        grant: &NewAuthorization,
    ) -> Result<InsertOutcome, Report<DatabaseError>>;

    /// Deletes a grant. Returns true if a row was removed.
    async fn delete(
        &self,
        context: &ServerContext,
        user_principal_name: &str,
    ) -> Result<bool, Report<DatabaseError>>;

    /// Replaces a grant's display name. Returns true if a row matched.
    async fn update_display_name(
        &self,
        context: &ServerContext,
        user_principal_name: &str,
        display_name: Option<&str>,
    ) -> Result<bool, Report<DatabaseError>>;

    /// Stores a password digest and its update time. Returns true if a row matched.
    async fn set_password_hash(
        &self,
        context: &ServerContext,
        user_principal_name: &str,
        password_hash: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, Report<DatabaseError>>;

    /// Lists every grant in the context, ordered by principal name.
    async fn list(
        &self,
        context: &ServerContext,
    ) -> Result<Vec<AuthorizationRecord>, Report<DatabaseError>>;
}

/// Row type for grant queries.
#[derive(FromRow)]
struct AuthorizationRow {
    id: i64,
    user_principal_name: String,
    display_name: Option<String>,
    server_context: String,
    password_hash: Option<String>,
    last_password_update: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl AuthorizationRow {
    fn decode(row: &PgRow) -> Result<AuthorizationRecord, Report<DatabaseError>> {
        let row = Self::from_row(row).map_err(|e| DatabaseError::from_sqlx(&e))?;
        row.try_into_record()
    }

    fn try_into_record(self) -> Result<AuthorizationRecord, Report<DatabaseError>> {
        let server_context =
            ServerContext::new(self.server_context).map_err(|e| DatabaseError::Decode {
                details: format!("grant {}: {e}", self.id),
            })?;
        Ok(AuthorizationRecord {
            id: self.id,
            user_principal_name: self.user_principal_name,
            display_name: self.display_name,
            server_context,
            password_hash: self.password_hash,
            last_password_update: self.last_password_update,
            created_at: self.created_at,
        })
    }
}

/// PostgreSQL grant store.
///
/// The `user_server_ci_unique` index is what keeps concurrent first-time
/// grants, in any spelling of the principal name, to a single row.
#[derive(Debug, Clone)]
pub struct PgAuthorizationStore {
    db: Database,
}

impl PgAuthorizationStore {
    /// Creates a new store over the given database client.
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Returns the underlying database client.
    #[must_use]
    pub fn database(&self) -> &Database {
        &self.db
    }
}

/// Only the grant uniqueness guards mean "already granted". Any other
/// constraint, such as a primary key collision, is a real failure.
fn is_duplicate_grant(err: &DatabaseError) -> bool {
    err.violates_any(GRANT_UNIQUE_CONSTRAINTS)
}

#[async_trait]
impl AuthorizationStore for PgAuthorizationStore {
    async fn find(
        &self,
        context: &ServerContext,
        user_principal_name: &str,
    ) -> Result<Option<AuthorizationRecord>, Report<DatabaseError>> {
        let rows = self
            .db
            .execute(
                r#"
                SELECT id, user_principal_name, display_name, server_context,
                       password_hash, last_password_update, created_at
                FROM user_radius_access
                WHERE lower(user_principal_name) = lower($1) AND server_context = $2
                "#,
                &[user_principal_name.into(), context.as_str().into()],
            )
            .await?;

        rows.first().map(AuthorizationRow::decode).transpose()
    }

    async fn insert(
        &self,
        context: &ServerContext,
        grant: &NewAuthorization,
    ) -> Result<InsertOutcome, Report<DatabaseError>> {
        let result = self
            .db
            .execute(
                r#"
                INSERT INTO user_radius_access (user_principal_name, display_name, server_context)
                VALUES ($1, $2, $3)
                "#,
                &[
                    grant.user_principal_name.as_str().into(),
                    grant.display_name.as_deref().into(),
                    context.as_str().into(),
                ],
            )
            .await;

        match result {
            Ok(_) => Ok(InsertOutcome::Inserted),
            Err(report) if is_duplicate_grant(report.current_context()) => {
                Ok(InsertOutcome::AlreadyPresent)
            }
            Err(report) => Err(report),
        }
    }

    async fn delete(
        &self,
        context: &ServerContext,
        user_principal_name: &str,
    ) -> Result<bool, Report<DatabaseError>> {
        let rows = self
            .db
            .execute(
                r#"
                DELETE FROM user_radius_access
                WHERE lower(user_principal_name) = lower($1) AND server_context = $2
                RETURNING id
                "#,
                &[user_principal_name.into(), context.as_str().into()],
            )
            .await?;

        Ok(!rows.is_empty())
    }

    async fn update_display_name(
        &self,
        context: &ServerContext,
        user_principal_name: &str,
        display_name: Option<&str>,
    ) -> Result<bool, Report<DatabaseError>> {
        let rows = self
            .db
            .execute(
                r#"
                UPDATE user_radius_access
                SET display_name = $1
                WHERE lower(user_principal_name) = lower($2) AND server_context = $3
                RETURNING id
                "#,
                &[
                    display_name.into(),
                    user_principal_name.into(),
                    context.as_str().into(),
                ],
            )
            .await?;

        Ok(!rows.is_empty())
    }

    async fn set_password_hash(
        &self,
        context: &ServerContext,
        user_principal_name: &str,
        password_hash: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, Report<DatabaseError>> {
        let rows = self
            .db
            .execute(
                r#"
                UPDATE user_radius_access
                SET password_hash = $1, last_password_update = $2
                WHERE lower(user_principal_name) = lower($3) AND server_context = $4
                RETURNING id
                "#,
                &[
                    password_hash.into(),
                    Param::Timestamp(updated_at),
                    user_principal_name.into(),
                    context.as_str().into(),
                ],
            )
            .await?;

        Ok(!rows.is_empty())
    }

    async fn list(
        &self,
        context: &ServerContext,
    ) -> Result<Vec<AuthorizationRecord>, Report<DatabaseError>> {
        let rows = self
            .db
            .execute(
                r#"
                SELECT id, user_principal_name, display_name, server_context,
                       password_hash, last_password_update, created_at
                FROM user_radius_access
                WHERE server_context = $1
                ORDER BY user_principal_name
                "#,
                &[context.as_str().into()],
            )
            .await?;

        rows.iter().map(AuthorizationRow::decode).collect()
    }
}


/// Tests against a live PostgreSQL server.
///
/// Run with `DATABASE_URL=postgres://... cargo test -- --ignored`.
#[cfg(test)]
mod postgres_tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::schema::{TABLE_NAME, ensure_schema, table_exists};
    use sqlx::Row;

    async fn connect() -> Database {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        Database::connect_lazy(&DatabaseConfig::new(url)).expect("valid url")
    }

    fn unique_context(label: &str) -> ServerContext {
        let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        ServerContext::new(format!("test-{label}-{nanos}")).expect("valid context")
    }

    async fn column_definitions(db: &Database) -> Vec<(String, String, String)> {
        let rows = db
            .execute(
                r#"
                SELECT column_name::TEXT, data_type::TEXT, is_nullable::TEXT
                FROM information_schema.columns
                WHERE table_schema = current_schema() AND table_name = $1
                ORDER BY ordinal_position
                "#,
                &[TABLE_NAME.into()],
            )
            .await
            .expect("catalog query");
        rows.iter()
            .map(|r| {
                (
                    r.get::<String, _>(0),
                    r.get::<String, _>(1),
                    r.get::<String, _>(2),
                )
            })
            .collect()
    }

    #[tokio::test]
    #[ignore = "requires PostgreSQL via DATABASE_URL"]
    async fn ensure_schema_twice_is_idempotent() {
        let db = connect().await;

        ensure_schema(&db).await.expect("first run");
        let before = column_definitions(&db).await;
        ensure_schema(&db).await.expect("second run");
        let after = column_definitions(&db).await;

        assert!(table_exists(&db, TABLE_NAME).await.expect("catalog query"));
        assert_eq!(before, after);
        assert_eq!(before.len(), 7);
    }

    #[tokio::test]
    #[ignore = "requires PostgreSQL via DATABASE_URL"]
    async fn concurrent_ensure_schema_succeeds() {
        let db = connect().await;

        let results = futures::future::join_all((0..4).map(|_| ensure_schema(&db))).await;

        assert!(results.iter().all(Result::is_ok));
    }

    #[tokio::test]
    #[ignore = "requires PostgreSQL via DATABASE_URL"]
    async fn duplicate_insert_is_already_present() {
        let db = connect().await;
        ensure_schema(&db).await.expect("schema");
        let store = PgAuthorizationStore::new(db);
        let context = unique_context("dup");
        let grant = NewAuthorization::new("alice@example.com").with_display_name("Alice");

        let first = store.insert(&context, &grant).await.expect("insert");
        let second = store.insert(&context, &grant).await.expect("insert");

        assert_eq!(first, InsertOutcome::Inserted);
        assert_eq!(second, InsertOutcome::AlreadyPresent);
        assert_eq!(store.list(&context).await.expect("list").len(), 1);
    }

    #[tokio::test]
    #[ignore = "requires PostgreSQL via DATABASE_URL"]
    async fn principal_names_match_without_case() {
        let db = connect().await;
        ensure_schema(&db).await.expect("schema");
        let store = PgAuthorizationStore::new(db);
        let context = unique_context("case");

        let first = store
            .insert(&context, &NewAuthorization::new("alice@example.com"))
            .await
            .expect("insert");
        let second = store
            .insert(&context, &NewAuthorization::new("ALICE@example.com"))
            .await
            .expect("insert");

        assert_eq!(first, InsertOutcome::Inserted);
        assert_eq!(second, InsertOutcome::AlreadyPresent);
        let record = store
            .find(&context, "Alice@Example.com")
            .await
            .expect("find")
            .expect("record");
        assert_eq!(record.user_principal_name, "alice@example.com");

        assert!(store.delete(&context, "ALICE@EXAMPLE.COM").await.expect("delete"));
        assert!(store.list(&context).await.expect("list").is_empty());
    }

    #[tokio::test]
    #[ignore = "requires PostgreSQL via DATABASE_URL"]
    async fn grants_are_scoped_by_context() {
        let db = connect().await;
        ensure_schema(&db).await.expect("schema");
        let store = PgAuthorizationStore::new(db);
        let site_a = unique_context("a");
        let site_b = unique_context("b");

        store
            .insert(&site_a, &NewAuthorization::new("bob@example.com"))
            .await
            .expect("insert");

        assert!(store.find(&site_a, "bob@example.com").await.expect("find").is_some());
        assert!(store.find(&site_b, "bob@example.com").await.expect("find").is_none());
    }

    #[tokio::test]
    #[ignore = "requires PostgreSQL via DATABASE_URL"]
    async fn password_hash_update_requires_existing_row() {
        let db = connect().await;
        ensure_schema(&db).await.expect("schema");
        let store = PgAuthorizationStore::new(db);
        let context = unique_context("pw");
        let now = Utc::now();

        let missing = store
            .set_password_hash(&context, "carol@example.com", "ab", now)
            .await
            .expect("update");
        assert!(!missing);
        assert!(store.find(&context, "carol@example.com").await.expect("find").is_none());

        store
            .insert(&context, &NewAuthorization::new("carol@example.com"))
            .await
            .expect("insert");
        let updated = store
            .set_password_hash(&context, "carol@example.com", "ab", now)
            .await
            .expect("update");
        assert!(updated);

        let record = store
            .find(&context, "carol@example.com")
            .await
            .expect("find")
            .expect("record");
        assert_eq!(record.password_hash.as_deref(), Some("ab"));
        assert!(record.last_password_update.is_some());

        assert!(store.delete(&context, "carol@example.com").await.expect("delete"));
    }
}
