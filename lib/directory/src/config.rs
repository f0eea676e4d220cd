//! Directory service credentials.

use serde::Deserialize;
use std::time::Duration;

/// Configuration for the Microsoft Graph directory.
///
/// All three credentials must be present for the directory to be used.
/// Leaving any of them out runs the server in local-only mode.
#[derive(Debug, Clone, Deserialize)]
pub struct DirectoryConfig {
    /// Entra ID tenant identifier.
    #[serde(default)]
    pub tenant_id: Option<String>,

    /// Application (client) identifier.
    #[serde(default)]
    pub client_id: Option<String>,

    /// Application client secret.
    #[serde(default)]
    pub client_secret: Option<String>,

    /// Base URL of the token authority.
    #[serde(default = "default_authority_url")]
    pub authority_url: String,

    /// Base URL of the Graph API.
    #[serde(default = "default_graph_url")]
    pub graph_url: String,

    /// Give up on the startup token exchange after this many milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_authority_url() -> String {
    "https://login.microsoftonline.com".to_string()
}

fn default_graph_url() -> String {
    "https://graph.microsoft.com".to_string()
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            tenant_id: None,
            client_id: None,
            client_secret: None,
            authority_url: default_authority_url(),
            graph_url: default_graph_url(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

/// Service credentials, present only when all three values are non-blank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Credentials<'a> {
    pub tenant_id: &'a str,
    pub client_id: &'a str,
    pub client_secret: &'a str,
}

impl DirectoryConfig {
    /// Creates a configuration for the given tenant and application.
    #[must_use]
    pub fn new(
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: Some(tenant_id.into()),
            client_id: Some(client_id.into()),
            client_secret: Some(client_secret.into()),
            ..Self::default()
        }
    }

    /// Points both the authority and Graph at another base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        self.authority_url = base_url.clone();
        self.graph_url = base_url;
        self
    }

    /// Returns how long the startup token exchange may take.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Returns true if all service credentials are present.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.credentials().is_some()
    }

    pub(crate) fn credentials(&self) -> Option<Credentials<'_>> {
        fn present(value: &Option<String>) -> Option<&str> {
            value.as_deref().map(str::trim).filter(|v| !v.is_empty())
        }

        Some(Credentials {
            tenant_id: present(&self.tenant_id)?,
            client_id: present(&self.client_id)?,
            client_secret: present(&self.client_secret)?,
        })
    }

    /// Token endpoint for the configured tenant.
    pub(crate) fn token_url(&self, tenant_id: &str) -> String {
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.authority_url.trim_end_matches('/'),
            tenant_id
        )
    }

    /// The `.default` scope of the Graph resource.
    pub(crate) fn scope(&self) -> String {
        format!("{}/.default", self.graph_url.trim_end_matches('/'))
    }
}
