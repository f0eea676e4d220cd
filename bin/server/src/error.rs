//! Domain error types for server startup.

use std::fmt;

/// Errors that stop the server from starting.
#[derive(Debug)]
pub enum ServerError {
    /// The database client could not be created.
    Database { details: String },
    /// The connectivity guard or schema initializer failed.
    Startup { details: String },
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Database { details } => {
                write!(f, "database client error: {}", details)
            }
            Self::Startup { details } => {
                write!(f, "startup failed: {}", details)
            }
        }
    }
}

impl std::error::Error for ServerError {}
