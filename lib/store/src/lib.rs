//! Persistent authorization store for radius-access.
//!
//! This crate provides:
//! - A database client executing parameterized statements over a bounded pool
//! - The connectivity guard run before anything else at startup
//! - The idempotent schema initializer for the `user_radius_access` table
//! - The `AuthorizationStore` trait with PostgreSQL and in-memory implementations
//!
//! # Startup
//!
//! ```no_run
//! # async fn start() {
//! use radius_access_store::{Database, DatabaseConfig, ensure_schema, wait_for_ready};
//! use std::time::Duration;
//!
//! let db = Database::connect_lazy(&DatabaseConfig::new("postgres://radius@db/radius"))
//!     .expect("valid database url");
//! wait_for_ready(&db, Duration::from_secs(60), Duration::from_millis(1500))
//!     .await
//!     .expect("database reachable");
//! ensure_schema(&db).await.expect("schema applied");
//! # }
//! ```

pub mod config;
pub mod database;
pub mod error;
pub mod guard;
pub mod memory;
pub mod repository;
pub mod schema;

pub use config::DatabaseConfig;
pub use database::{Database, Execute, Param};
pub use error::{DatabaseError, StartupError};
pub use guard::{Probe, backoff_delay, wait_for_ready};
pub use memory::InMemoryAuthorizationStore;
pub use repository::{AuthorizationStore, InsertOutcome, PgAuthorizationStore};
pub use schema::{GRANT_UNIQUE_CONSTRAINTS, TABLE_NAME, ensure_schema, table_exists};
