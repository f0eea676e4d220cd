//! Microsoft Graph directory client.

use crate::config::DirectoryConfig;
use crate::error::DirectoryError;
use async_trait::async_trait;
use oauth2::basic::BasicClient;
use oauth2::{AuthType, ClientId, ClientSecret, Scope, TokenResponse, TokenUrl};
use radius_access_core::IdentityRecord;
use reqwest::{Response, StatusCode, Url};
use rootcause::prelude::Report;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

/// Tokens are re-exchanged this long before they expire.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Lifetime assumed when the token response carries no `expires_in`.
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

/// Looks up identities in the external directory.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Returns the user's identity, or `None` if the directory does not know
    /// the user or could not be asked.
    async fn lookup(&self, principal_name: &str) -> Option<IdentityRecord>;
}

/// Directory client backed by Microsoft Graph.
///
/// Built once at startup and shared for the life of the process. A client
/// that could not authenticate stays disabled; it never retries.
#[derive(Clone)]
pub struct GraphDirectory {
    inner: Option<Arc<GraphClient>>,
}

struct GraphClient {
    http: reqwest::Client,
    client_id: ClientId,
    client_secret: ClientSecret,
    token_url: TokenUrl,
    scope: String,
    graph_url: Url,
    token: Mutex<Option<BearerToken>>,
}

struct BearerToken {
    secret: String,
    refresh_at: Instant,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphUser {
    user_principal_name: String,
    #[serde(default)]
    display_name: Option<String>,
}

impl From<GraphUser> for IdentityRecord {
    fn from(user: GraphUser) -> Self {
        IdentityRecord::new(user.user_principal_name, user.display_name)
    }
}

#[derive(Deserialize)]
struct GraphUserPage {
    #[serde(default)]
    value: Vec<GraphUser>,
    #[serde(rename = "@odata.nextLink", default)]
    next_link: Option<String>,
}

impl GraphDirectory {
    /// Authenticates to the directory with the configured service credentials.
    ///
    /// Never fails: missing credentials or a rejected token exchange produce
    /// a disabled client and a log line, and the server runs local-only. An
    /// exchange that outlasts `connect_timeout_ms` counts as rejected.
    pub async fn connect(config: &DirectoryConfig) -> Self {
        let client = match GraphClient::new(config) {
            Ok(client) => client,
            Err(e) => {
                warn!(error = %e, "directory credentials unavailable, running in local-only mode");
                return Self::disabled();
            }
        };

        let timeout = config.connect_timeout();
        match tokio::time::timeout(timeout, client.bearer_token()).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                error!(error = %e, "directory authentication failed, running in local-only mode");
                return Self::disabled();
            }
            Err(_) => {
                error!(
                    timeout_ms = timeout.as_millis(),
                    "directory authentication timed out, running in local-only mode"
                );
                return Self::disabled();
            }
        }

        info!(graph_url = %client.graph_url, "directory client initialized");
        Self {
            inner: Some(Arc::new(client)),
        }
    }

    /// Creates a client that answers every lookup with `None`.
    #[must_use]
    pub fn disabled() -> Self {
        Self { inner: None }
    }

    /// Returns true if the client authenticated at startup.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    /// Fetches one user by principal name.
    ///
    /// Unlike [`Directory::lookup`], this keeps "not found" (`Ok(None)`)
    /// apart from failures.
    ///
    /// # Errors
    ///
    /// Returns an error if the client is disabled, the request fails, or the
    /// directory answers with anything other than success or 404.
    pub async fn fetch_user(
        &self,
        principal_name: &str,
    ) -> Result<Option<IdentityRecord>, Report<DirectoryError>> {
        let client = self.client()?;
        let url = client.user_url(principal_name)?;
        let response = client.get(url).await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let user: GraphUser =
                    response.json().await.map_err(|e| DirectoryError::Decode {
                        details: e.to_string(),
                    })?;
                Ok(Some(user.into()))
            }
            _ => Err(status_error(response).await.into()),
        }
    }

    /// Lists every user in the directory, following pagination links.
    ///
    /// Returns an empty list if the client is disabled, any page fails, or a
    /// pagination link repeats.
    #[instrument(skip(self))]
    pub async fn list_users(&self) -> Vec<IdentityRecord> {
        if !self.is_enabled() {
            warn!("directory client disabled, cannot list users");
            return Vec::new();
        }

        match self.try_list_users().await {
            Ok(users) => {
                info!(count = users.len(), "fetched users from directory");
                users
            }
            Err(e) => {
                error!(error = %e, "failed to list directory users");
                Vec::new()
            }
        }
    }

    async fn try_list_users(&self) -> Result<Vec<IdentityRecord>, Report<DirectoryError>> {
        let client = self.client()?;
        let mut next = Some(client.users_url()?);
        let mut visited = HashSet::new();
        let mut users = Vec::new();

        while let Some(url) = next.take() {
            if !visited.insert(url.clone()) {
                return Err(DirectoryError::InvalidUrl {
                    details: format!("pagination loops back to {}", url),
                }
                .into());
            }

            let response = client.get(url).await?;
            if !response.status().is_success() {
                return Err(status_error(response).await.into());
            }

            let page: GraphUserPage = response.json().await.map_err(|e| DirectoryError::Decode {
                details: e.to_string(),
            })?;
            users.extend(page.value.into_iter().map(IdentityRecord::from));

            if let Some(link) = page.next_link {
                next = Some(client.next_page_url(&link)?);
            }
        }

        Ok(users)
    }

    fn client(&self) -> Result<&GraphClient, Report<DirectoryError>> {
        self.inner
            .as_deref()
            .ok_or_else(|| DirectoryError::NotConfigured.into())
    }
}

#[async_trait]
impl Directory for GraphDirectory {
    #[instrument(skip(self))]
    async fn lookup(&self, principal_name: &str) -> Option<IdentityRecord> {
        if !self.is_enabled() {
            debug!("directory client disabled, treating user as not found");
            return None;
        }

        match self.fetch_user(principal_name).await {
            Ok(Some(identity)) => {
                debug!(display_name = ?identity.display_name, "user found in directory");
                Some(identity)
            }
            Ok(None) => {
                warn!("user not found in directory");
                None
            }
            Err(e) => {
                error!(error = %e, "directory lookup failed");
                None
            }
        }
    }
}

impl GraphClient {
    fn new(config: &DirectoryConfig) -> Result<Self, Report<DirectoryError>> {
        let credentials = config.credentials().ok_or(DirectoryError::NotConfigured)?;

        let token_url = TokenUrl::new(config.token_url(credentials.tenant_id)).map_err(|e| {
            DirectoryError::InvalidUrl {
                details: e.to_string(),
            }
        })?;
        let graph_url = Url::parse(&config.graph_url).map_err(|e| DirectoryError::InvalidUrl {
            details: format!("{}: {}", config.graph_url, e),
        })?;

        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| DirectoryError::Transport {
                details: format!("HTTP client error: {}", e),
            })?;

        Ok(Self {
            http,
            client_id: ClientId::new(credentials.client_id.to_string()),
            client_secret: ClientSecret::new(credentials.client_secret.to_string()),
            token_url,
            scope: config.scope(),
            graph_url,
            token: Mutex::new(None),
        })
    }

    /// Returns a bearer token, exchanging credentials for a new one when the
    /// cached token is missing or close to expiry.
    async fn bearer_token(&self) -> Result<String, Report<DirectoryError>> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| Instant::now() < t.refresh_at) {
            return Ok(token.secret.clone());
        }

        let token = self.exchange_token().await?;
        let secret = token.secret.clone();
        *cached = Some(token);
        Ok(secret)
    }

    async fn exchange_token(&self) -> Result<BearerToken, Report<DirectoryError>> {
        let client = BasicClient::new(self.client_id.clone())
            .set_client_secret(self.client_secret.clone())
            .set_auth_type(AuthType::RequestBody)
            .set_token_uri(self.token_url.clone());

        let response = client
            .exchange_client_credentials()
            .add_scope(Scope::new(self.scope.clone()))
            .request_async(&self.http)
            .await
            .map_err(|e| DirectoryError::TokenExchange {
                details: e.to_string(),
            })?;

        let lifetime = response.expires_in().unwrap_or(DEFAULT_TOKEN_LIFETIME);
        debug!(expires_in_seconds = lifetime.as_secs(), "directory token acquired");

        Ok(BearerToken {
            secret: response.access_token().secret().clone(),
            refresh_at: Instant::now() + lifetime.saturating_sub(REFRESH_MARGIN),
        })
    }

    async fn get(&self, url: Url) -> Result<Response, Report<DirectoryError>> {
        let token = self.bearer_token().await?;
        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| DirectoryError::Transport {
                details: e.to_string(),
            })?;

        // A revoked token is dropped so the next request exchanges a new one.
        if response.status() == StatusCode::UNAUTHORIZED {
            *self.token.lock().await = None;
        }

        Ok(response)
    }

    fn users_url(&self) -> Result<Url, Report<DirectoryError>> {
        self.graph_path(&["v1.0", "users"])
    }

    fn user_url(&self, principal_name: &str) -> Result<Url, Report<DirectoryError>> {
        self.graph_path(&["v1.0", "users", principal_name])
    }

    fn graph_path(&self, segments: &[&str]) -> Result<Url, Report<DirectoryError>> {
        let mut url = self.graph_url.clone();
        url.path_segments_mut()
            .map_err(|()| DirectoryError::InvalidUrl {
                details: format!("{} cannot be a base url", self.graph_url),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Parses a pagination link, refusing to send the token to another origin.
    fn next_page_url(&self, link: &str) -> Result<Url, Report<DirectoryError>> {
        let url = Url::parse(link).map_err(|e| DirectoryError::InvalidUrl {
            details: format!("{}: {}", link, e),
        })?;
        if url.origin() != self.graph_url.origin() {
            return Err(DirectoryError::InvalidUrl {
                details: format!("pagination link leaves the directory: {}", link),
            }
            .into());
        }
        Ok(url)
    }
}

async fn status_error(response: Response) -> DirectoryError {
    let status = response.status().as_u16();
    let details = response.text().await.unwrap_or_default();
    DirectoryError::Status { status, details }
}
