//! Error handling foundation for radius-access.
//!
//! This module provides the `Result` type alias using rootcause. Each crate
//! defines its own domain-specific error types in its own error module.

use rootcause::Report;
use std::fmt;

/// A Result type alias using rootcause's Report for error handling.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;

/// Errors from constructing core domain values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// The server context value was rejected.
    InvalidServerContext { reason: String },
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidServerContext { reason } => {
                write!(f, "invalid server context: {reason}")
            }
        }
    }
}

impl std::error::Error for CoreError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_type_works() {
        let ok: Result<i32> = Ok(42);
        assert_eq!(ok.expect("should be ok"), 42);
    }

    #[test]
    fn invalid_server_context_display() {
        let err = CoreError::InvalidServerContext {
            reason: "empty".to_string(),
        };
        assert!(err.to_string().contains("invalid server context"));
        assert!(err.to_string().contains("empty"));
    }
}
