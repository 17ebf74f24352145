//! Persistence backends for Kennel.
//!
//! The notification core treats storage as an opaque async collaborator.
//! This crate provides the two backends the server ships with:
//!
//! - `memory` — process-local, used for tests and ephemeral deployments
//! - `sqlite` — single-file database (feature `sqlite`, on by default)

pub mod memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::{InMemoryNotificationStore, InMemoryPrincipalDirectory};

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;
