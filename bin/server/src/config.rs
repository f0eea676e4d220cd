//! Centralized server configuration.
//!
//! Loaded once at startup via the `config` crate from environment variables
//! and immutable afterwards. Nested keys use `__` as the separator, so
//! `DATABASE__URL` sets `database.url`.

use radius_access_core::ServerContext;
use radius_access_directory::DirectoryConfig;
use radius_access_store::DatabaseConfig;
use serde::Deserialize;
use std::time::Duration;

/// Server configuration composed from library configs.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Identifies this RADIUS server instance. Every grant is scoped to it.
    pub server_id: ServerContext,

    /// PostgreSQL connection settings.
    pub database: DatabaseConfig,

    /// How long to wait for the database at startup.
    #[serde(default)]
    pub startup: StartupConfig,

    /// Identity directory credentials. Optional; without them the server
    /// only honours grants already in the database.
    #[serde(default)]
    pub directory: DirectoryConfig,
}

/// Connectivity guard settings.
#[derive(Debug, Clone, Deserialize)]
pub struct StartupConfig {
    /// Give up on the database after this many milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Base delay between probes, in milliseconds.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

fn default_timeout_ms() -> u64 {
    60_000
}

fn default_interval_ms() -> u64 {
    1_500
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            interval_ms: default_interval_ms(),
        }
    }
}

impl StartupConfig {
    /// Returns the overall startup timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Returns the base probe interval.
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Self::from_environment(config::Environment::default())
    }

    fn from_environment(environment: config::Environment) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(environment.separator("__").try_parsing(true))
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<ServerConfig, config::ConfigError> {
        let map = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ServerConfig::from_environment(config::Environment::default().source(Some(map)))
    }

    #[test]
    fn startup_config_has_correct_defaults() {
        let config = StartupConfig::default();
        assert_eq!(config.timeout(), Duration::from_secs(60));
        assert_eq!(config.interval(), Duration::from_millis(1500));
    }

    #[test]
    fn minimal_environment_uses_defaults() {
        let config = load(&[
            ("SERVER_ID", "site-A"),
            ("DATABASE__URL", "postgres://radius@db/radius"),
        ])
        .expect("valid configuration");

        assert_eq!(config.server_id.as_str(), "site-A");
        assert_eq!(config.database.url, "postgres://radius@db/radius");
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.startup.timeout_ms, 60_000);
        assert!(!config.directory.is_configured());
    }

    #[test]
    fn nested_values_override_defaults() {
        let config = load(&[
            ("SERVER_ID", "site-B"),
            ("DATABASE__URL", "postgres://radius@db/radius"),
            ("DATABASE__MAX_CONNECTIONS", "4"),
            ("STARTUP__TIMEOUT_MS", "2000"),
            ("STARTUP__INTERVAL_MS", "500"),
            ("DIRECTORY__TENANT_ID", "contoso"),
            ("DIRECTORY__CLIENT_ID", "app"),
            ("DIRECTORY__CLIENT_SECRET", "s3cret"),
            ("DIRECTORY__CONNECT_TIMEOUT_MS", "2500"),
        ])
        .expect("valid configuration");

        assert_eq!(config.database.max_connections, 4);
        assert_eq!(config.startup.timeout(), Duration::from_secs(2));
        assert_eq!(config.startup.interval(), Duration::from_millis(500));
        assert!(config.directory.is_configured());
        assert_eq!(config.directory.graph_url, "https://graph.microsoft.com");
        assert_eq!(config.directory.connect_timeout(), Duration::from_millis(2500));
    }

    #[test]
    fn missing_server_id_is_rejected() {
        let result = load(&[("DATABASE__URL", "postgres://radius@db/radius")]);
        assert!(result.is_err());
    }

    #[test]
    fn blank_server_id_is_rejected() {
        let result = load(&[
            ("SERVER_ID", "   "),
            ("DATABASE__URL", "postgres://radius@db/radius"),
        ]);
        assert!(result.is_err());
    }
}
