//! Core domain types and utilities for radius-access.
//!
//! This crate provides the types shared by the store, directory and
//! authorization crates: the server context partition key, authorization
//! records, directory identities and the rootcause `Result` alias.

pub mod context;
pub mod error;
pub mod record;

pub use context::ServerContext;
pub use error::{CoreError, Result};
pub use record::{AuthorizationRecord, IdentityRecord, NewAuthorization};
