//! Authorization decisions for radius-access.
//!
//! The [`AccessResolver`] answers "may this user authenticate against this
//! server?" from the local store first and the identity directory second,
//! writing directory hits back to the store. The [`CredentialStore`] caches a
//! password digest on the same grant for offline verification.
//!
//! Read paths never fail: any error is logged and becomes a denial.
//! Administrative paths report success as a `bool`.

mod credential;
mod resolver;

#[cfg(test)]
mod testing;

pub use credential::{CredentialStore, hash_password, verify_password};
pub use resolver::AccessResolver;
