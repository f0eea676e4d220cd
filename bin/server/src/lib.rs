//! Process wiring for the radius-access authorization core.
//!
//! Loads configuration, runs the startup sequence, and exposes the
//! [`AccessServices`](startup::AccessServices) the RADIUS protocol layer
//! calls into.

pub mod config;
pub mod error;
pub mod startup;
