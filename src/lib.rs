//! # Waymark
//!
//! Storage-agnostic schema migration engine.
//!
//! Waymark tracks which versioned, reversible migration steps have been
//! applied to a target store, plans the ordered steps needed to reach a
//! requested version, runs them under a lock, and detects and repairs drift
//! between applied records and their source definitions. The store and the
//! migration catalog are plugged in through the
//! [`DatabaseEngine`](migration::DatabaseEngine) and
//! [`SourceEngine`](migration::SourceEngine) traits.

pub mod config;
pub mod migration;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use config::MigratorConfig;
pub use migration::{MigrationError, Migrator};
