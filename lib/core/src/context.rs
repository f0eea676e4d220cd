//! The server context that partitions authorization grants.
//!
//! Several RADIUS server instances may share one database. Each instance is
//! configured with its own context, and every store query is scoped to it so
//! grants never leak between instances.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifies which protocol-server instance a grant applies to.
///
/// Fixed for the lifetime of the process. Always non-empty and trimmed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ServerContext(String);

impl ServerContext {
    /// Creates a server context, rejecting empty or whitespace-only values.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidServerContext`] if the value is blank.
    pub fn new(value: impl Into<String>) -> Result<Self, CoreError> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(CoreError::InvalidServerContext {
                reason: "server context must not be empty".to_string(),
            });
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Returns the context as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ServerContext {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ServerContext {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ServerContext> for String {
    fn from(context: ServerContext) -> Self {
        context.0
    }
}

impl AsRef<str> for ServerContext {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
