//! Directory error types.

use std::fmt;

/// Directory errors.
///
/// None of these reach the resolver: [`lookup`](crate::Directory::lookup)
/// collapses every failure to "not found".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    /// Service credentials are missing, or were rejected at startup.
    NotConfigured,
    /// The client-credentials token exchange failed.
    TokenExchange {
        /// Error details.
        details: String,
    },
    /// The request never produced a response.
    Transport {
        /// Error details.
        details: String,
    },
    /// The directory answered with an unexpected status.
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, if any.
        details: String,
    },
    /// The response body could not be decoded.
    Decode {
        /// Error details.
        details: String,
    },
    /// A configured URL is malformed.
    InvalidUrl {
        /// Error details.
        details: String,
    },
}

impl fmt::Display for DirectoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConfigured => write!(f, "directory client is not configured"),
            Self::TokenExchange { details } => {
                write!(f, "directory token exchange failed: {}", details)
            }
            Self::Transport { details } => {
                write!(f, "directory request failed: {}", details)
            }
            Self::Status { status, details } => {
                write!(f, "directory returned status {}: {}", status, details)
            }
            Self::Decode { details } => {
                write!(f, "invalid directory response: {}", details)
            }
            Self::InvalidUrl { details } => {
                write!(f, "invalid directory url: {}", details)
            }
        }
    }
}

impl std::error::Error for DirectoryError {}
