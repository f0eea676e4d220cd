//! Idempotent creation and migration of the authorization table.
//!
//! Every step is safe to run on each process start, including concurrently
//! from several instances sharing one database.

use crate::database::{Execute, Param};
use crate::error::{DatabaseError, StartupError};
use rootcause::prelude::Report;
use sqlx::Row;
use tracing::{debug, info};

/// Name of the table holding authorization grants.
pub const TABLE_NAME: &str = "user_radius_access";

/// Constraints whose violation means the grant is already stored.
pub const GRANT_UNIQUE_CONSTRAINTS: &[&str] = &["user_server_unique", "user_server_ci_unique"];

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS user_radius_access (
        id BIGINT GENERATED BY DEFAULT AS IDENTITY PRIMARY KEY,
        user_principal_name VARCHAR(255) NOT NULL,
        display_name VARCHAR(255),
        server_context VARCHAR(100) NOT NULL,
        password_hash VARCHAR(255),
        last_password_update TIMESTAMPTZ,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        CONSTRAINT user_server_unique UNIQUE (user_principal_name, server_context)
    )
"#;

const CREATE_USER_SERVER_INDEX: &str = r#"
    CREATE INDEX IF NOT EXISTS idx_user_server
    ON user_radius_access (user_principal_name, server_context)
"#;

// Principal names compare without regard to case, so this index, not the
// table constraint, is what keeps one grant per user and context.
const CREATE_CASE_INSENSITIVE_UNIQUE_INDEX: &str = r#"
    CREATE UNIQUE INDEX IF NOT EXISTS user_server_ci_unique
    ON user_radius_access (lower(user_principal_name), server_context)
"#;

const CREATE_SERVER_CONTEXT_INDEX: &str = r#"
    CREATE INDEX IF NOT EXISTS idx_server_context
    ON user_radius_access (server_context)
"#;

// Tables created before credential caching existed lack these columns.
const ADD_CREDENTIAL_COLUMNS: &str = r#"
    ALTER TABLE user_radius_access
    ADD COLUMN IF NOT EXISTS password_hash VARCHAR(255),
    ADD COLUMN IF NOT EXISTS last_password_update TIMESTAMPTZ
"#;

/// Schema steps in the order they are applied.
const SCHEMA_STEPS: &[(&str, &str)] = &[
    ("create table", CREATE_TABLE),
    ("create user/server index", CREATE_USER_SERVER_INDEX),
    (
        "create case-insensitive unique index",
        CREATE_CASE_INSENSITIVE_UNIQUE_INDEX,
    ),
    ("create server index", CREATE_SERVER_CONTEXT_INDEX),
    ("add credential columns", ADD_CREDENTIAL_COLUMNS),
];

/// Creates the authorization table and its indexes if absent, then adds any
/// missing credential columns.
///
/// An "already exists" failure from any step is treated as success.
///
/// # Errors
///
/// Returns [`StartupError::SchemaFailed`] for any other failure. Callers
/// must treat this as fatal.
pub async fn ensure_schema<E>(db: &E) -> Result<(), Report<StartupError>>
where
    E: Execute + ?Sized,
{
    info!(table = TABLE_NAME, "checking and initializing database tables");

    for (step, statement) in SCHEMA_STEPS {
        match db.execute(statement, &[]).await {
            Ok(_) => debug!(step, "schema step applied"),
            Err(report) if report.current_context().is_already_exists() => {
                debug!(step, error = %report, "schema object already exists");
            }
            Err(report) => {
                return Err(StartupError::SchemaFailed {
                    step: (*step).to_string(),
                    details: report.to_string(),
                }
                .into());
            }
        }
    }

    info!(table = TABLE_NAME, "database tables verified");
    Ok(())
}

/// Checks whether a table exists in the connection's current schema.
///
/// # Errors
///
/// Returns the database failure if the catalog query fails.
pub async fn table_exists<E>(db: &E, table_name: &str) -> Result<bool, Report<DatabaseError>>
where
    E: Execute + ?Sized,
{
    let rows = db
        .execute(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM information_schema.tables
                WHERE table_schema = current_schema() AND table_name = $1
            ) AS present
            "#,
            &[Param::from(table_name)],
        )
        .await?;

    match rows.first() {
        Some(row) => row
            .try_get::<bool, _>("present")
            .map_err(|e| DatabaseError::from_sqlx(&e).into()),
        None => Ok(false),
    }
}
