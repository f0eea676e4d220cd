//! Identity directory client for radius-access.
//!
//! The directory is the source of truth for first-time grants. This crate
//! wraps Microsoft Graph `users` lookups behind the [`Directory`] trait so the
//! resolver can be handed a fake in tests.
//!
//! A client whose service credentials are missing or rejected is disabled for
//! the rest of the process and answers every lookup with `None`.

mod client;
mod config;
mod error;

pub use client::{Directory, GraphDirectory};
pub use config::DirectoryConfig;
pub use error::DirectoryError;
