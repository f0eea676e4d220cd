//! Parameterized statement execution over a bounded PostgreSQL pool.

use crate::config::DatabaseConfig;
use crate::error::DatabaseError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rootcause::prelude::Report;
use sqlx::postgres::{PgArguments, PgConnectOptions, PgPool, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::Postgres;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// A positional statement parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Param {
    /// A non-null text value.
    Text(String),
    /// A text value that may be SQL `NULL`.
    NullableText(Option<String>),
    /// A UTC timestamp.
    Timestamp(DateTime<Utc>),
}

impl Param {
    fn bind_to<'q>(
        &self,
        query: Query<'q, Postgres, PgArguments>,
    ) -> Query<'q, Postgres, PgArguments> {
        match self {
            Self::Text(value) => query.bind(value.clone()),
            Self::NullableText(value) => query.bind(value.clone()),
            Self::Timestamp(value) => query.bind(*value),
        }
    }
}

impl From<&str> for Param {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Param {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Option<&str>> for Param {
    fn from(value: Option<&str>) -> Self {
        Self::NullableText(value.map(str::to_string))
    }
}

impl From<DateTime<Utc>> for Param {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Timestamp(value)
    }
}

/// Executes parameterized statements.
///
/// Implemented by [`Database`]; the schema initializer is written against
/// this trait so it can run against a scripted executor in tests.
#[async_trait]
pub trait Execute: Send + Sync {
    /// Executes one statement and returns every row it produced.
    ///
    /// # Errors
    ///
    /// Returns the classified database failure. No retries are attempted.
    async fn execute(
        &self,
        statement: &str,
        params: &[Param],
    ) -> Result<Vec<PgRow>, Report<DatabaseError>>;
}

/// Database client over a bounded connection pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: PgPool,
    target: String,
}

impl Database {
    /// Creates a client without opening any connection.
    ///
    /// Connections are established on first use, which lets the
    /// connectivity guard observe a database that is still starting.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection URL cannot be parsed.
    pub fn connect_lazy(config: &DatabaseConfig) -> Result<Self, Report<DatabaseError>> {
        let options = PgConnectOptions::from_str(&config.url).map_err(|e| {
            DatabaseError::Connection {
                details: format!("invalid database url: {e}"),
            }
        })?;
        let target = describe_target(&options);

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_seconds))
            .connect_lazy_with(options);

        Ok(Self { pool, target })
    }

    /// Wraps an existing pool.
    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        let target = describe_target(&pool.connect_options());
        Self { pool, target }
    }

    /// Returns a password-free description of the database, for logs.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Runs a trivial query to confirm the database is reachable.
    ///
    /// # Errors
    ///
    /// Returns the classified failure if the query cannot be executed.
    pub async fn ping(&self) -> Result<(), Report<DatabaseError>> {
        self.execute("SELECT 1", &[]).await.map(|_| ())
    }

    /// Closes the pool, waiting for checked-out connections to be returned.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl Execute for Database {
    async fn execute(
        &self,
        statement: &str,
        params: &[Param],
    ) -> Result<Vec<PgRow>, Report<DatabaseError>> {
        let mut query = sqlx::query(statement);
        for param in params {
            query = param.bind_to(query);
        }

        query.fetch_all(&self.pool).await.map_err(|e| {
            let err = DatabaseError::from_sqlx(&e);
            debug!(error = %err, "database query error");
            err.into()
        })
    }
}

fn describe_target(options: &PgConnectOptions) -> String {
    format!(
        "{}@{}:{}/{}",
        options.get_username(),
        options.get_host(),
        options.get_port(),
        options.get_database().unwrap_or_default()
    )
}
