//! Startup sequence and service wiring.
//!
//! The connectivity guard runs first, then the schema initializer, and only
//! then are the services built. Failure at either stage is fatal: serving
//! decisions against an unreachable or unmigrated store would deny or
//! corrupt every one of them.

use crate::config::{ServerConfig, StartupConfig};
use crate::error::ServerError;
use radius_access_authz::{AccessResolver, CredentialStore};
use radius_access_core::ServerContext;
use radius_access_directory::{Directory, GraphDirectory};
use radius_access_store::{
    AuthorizationStore, Database, Execute, PgAuthorizationStore, Probe, ensure_schema,
    wait_for_ready,
};
use rootcause::prelude::Report;
use std::sync::Arc;
use tracing::info;

/// The operations the protocol layer calls.
#[derive(Clone)]
pub struct AccessServices {
    /// Answers `is_allowed` and the administrative grant operations.
    pub resolver: AccessResolver,
    /// Caches and checks password digests.
    pub credentials: CredentialStore,
}

impl AccessServices {
    /// Wires the resolver and credential store over one shared store.
    #[must_use]
    pub fn new(
        context: ServerContext,
        store: Arc<dyn AuthorizationStore>,
        directory: Arc<dyn Directory>,
    ) -> Self {
        Self {
            resolver: AccessResolver::new(context.clone(), store.clone(), directory),
            credentials: CredentialStore::new(context, store),
        }
    }
}

/// Waits for the database, then brings its schema up to date.
///
/// # Errors
///
/// Returns [`ServerError::Startup`] if the database never answers or the
/// schema cannot be applied. The schema is not touched in the first case.
pub async fn prepare_database<D>(db: &D, startup: &StartupConfig) -> Result<(), Report<ServerError>>
where
    D: Probe + Execute,
{
    wait_for_ready(db, startup.timeout(), startup.interval())
        .await
        .map_err(|e| ServerError::Startup {
            details: e.to_string(),
        })?;

    ensure_schema(db).await.map_err(|e| ServerError::Startup {
        details: e.to_string(),
    })?;

    Ok(())
}

/// Runs the startup sequence and builds the services.
///
/// Returns the database client alongside the services so the caller can
/// close the pool on shutdown.
///
/// # Errors
///
/// Returns an error if the database URL is invalid or either startup stage
/// fails. A directory that cannot authenticate is not an error; the server
/// runs local-only.
pub async fn bootstrap(
    config: &ServerConfig,
) -> Result<(AccessServices, Database), Report<ServerError>> {
    let database = Database::connect_lazy(&config.database).map_err(|e| ServerError::Database {
        details: e.to_string(),
    })?;

    prepare_database(&database, &config.startup).await?;

    let directory = GraphDirectory::connect(&config.directory).await;
    info!(
        server_id = %config.server_id,
        directory_enabled = directory.is_enabled(),
        "authorization services configured"
    );

    let store = Arc::new(PgAuthorizationStore::new(database.clone()));
    let services = AccessServices::new(config.server_id.clone(), store, Arc::new(directory));

    Ok((services, database))
}
