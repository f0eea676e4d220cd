//! Authorization grants and directory identities.

use crate::context::ServerContext;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persisted grant of access for one user under one server context.
///
/// The pair (`user_principal_name`, `server_context`) is unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationRecord {
    /// Generated key.
    pub id: i64,
    /// The user's principal name, opaque to this system.
    pub user_principal_name: String,
    /// Human-readable label, informational only.
    pub display_name: Option<String>,
    /// The server instance this grant applies to.
    pub server_context: ServerContext,
    /// Cached SHA-256 digest of the user's password, hex encoded.
    pub password_hash: Option<String>,
    /// When `password_hash` was last written.
    pub last_password_update: Option<DateTime<Utc>>,
    /// When the grant was created.
    pub created_at: DateTime<Utc>,
}

impl AuthorizationRecord {
    /// Returns true if a password digest has been cached for this user.
    #[must_use]
    pub fn has_password_hash(&self) -> bool {
        self.password_hash.is_some()
    }
}

/// The data needed to create a new grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAuthorization {
    /// The user's principal name.
    pub user_principal_name: String,
    /// Optional display name.
    pub display_name: Option<String>,
}

impl NewAuthorization {
    /// Creates a grant payload without a display name.
    #[must_use]
    pub fn new(user_principal_name: impl Into<String>) -> Self {
        Self {
            user_principal_name: user_principal_name.into(),
            display_name: None,
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }
}

impl From<IdentityRecord> for NewAuthorization {
    fn from(identity: IdentityRecord) -> Self {
        Self {
            user_principal_name: identity.principal_name,
            display_name: identity.display_name,
        }
    }
}

/// A read-only projection of a user returned by the identity directory.
///
/// Never persisted directly; only copied into a [`NewAuthorization`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRecord {
    /// The directory's principal name for the user.
    pub principal_name: String,
    /// The directory's display name for the user.
    pub display_name: Option<String>,
}

impl IdentityRecord {
    /// Creates an identity record.
    #[must_use]
    pub fn new(principal_name: impl Into<String>, display_name: Option<String>) -> Self {
        Self {
            principal_name: principal_name.into(),
            display_name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_converts_to_new_authorization() {
        let identity = IdentityRecord::new("alice@example.com", Some("Alice".to_string()));
        let grant = NewAuthorization::from(identity);

        assert_eq!(grant.user_principal_name, "alice@example.com");
        assert_eq!(grant.display_name.as_deref(), Some("Alice"));
    }

    #[test]
    fn new_authorization_builder() {
        let grant = NewAuthorization::new("bob@example.com").with_display_name("Bob");
        assert_eq!(grant.user_principal_name, "bob@example.com");
        assert_eq!(grant.display_name.as_deref(), Some("Bob"));
    }

    #[test]
    fn record_reports_password_hash_presence() {
        let mut record = AuthorizationRecord {
            id: 1,
            user_principal_name: "alice@example.com".to_string(),
            display_name: None,
            server_context: ServerContext::new("site-A").expect("valid"),
            password_hash: None,
            last_password_update: None,
            created_at: Utc::now(),
        };
        assert!(!record.has_password_hash());

        record.password_hash = Some("00".repeat(32));
        assert!(record.has_password_hash());
    }
}
