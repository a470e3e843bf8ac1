//! Migration engine
//!
//! This module provides:
//! - collaborator contracts for the database and source engines
//! - history reconciliation and current-version resolution
//! - migration planning between versions, including out-of-order backfills
//! - validation of applied records and repair planning
//! - the [`Migrator`] that drives all of the above under a lock
//!
//! # Example
//!
//! ```rust,no_run
//! use waymark::config::MigratorConfig;
//! use waymark::migration::Migrator;
//! # use waymark::migration::{DatabaseEngine, SourceEngine};
//! # fn engines() -> (Box<dyn DatabaseEngine>, Box<dyn SourceEngine>) { unimplemented!() }
//!
//! # fn main() -> waymark::migration::Result<()> {
//! let (database, source) = engines();
//! let mut migrator = Migrator::new(MigratorConfig::default(), database, source);
//!
//! migrator.open()?;
//! migrator.migrate("20240120")?;
//! println!("now at {}", migrator.current()?.version());
//! migrator.close()?;
//! # Ok(())
//! # }
//! ```

pub mod checksum;
pub mod engine;
pub mod error;
pub mod events;
pub mod filename;
pub mod history;
mod lock;
pub mod lock_id;
#[allow(clippy::module_inception)]
pub mod migration;
pub mod migrator;
pub mod plan;
pub mod record;
pub mod startup;
pub mod status;
pub mod validate;
pub mod version;

pub use checksum::{get_hash, sanitize_content};
pub use engine::{
    get_migration, DatabaseEngine, DatabaseEngineFactory, DatabaseHelpers, LockIdGenerator, SourceEngine,
    SourceEngineFactory, SourceHelpers,
};
pub use error::{ErrorKind, MigrationError, RecordRef, Result};
pub use events::{FailurePolicy, MigratorEvent, MigratorObserver};
pub use filename::{MigrationInfoNotation, MigrationInfoParser};
pub use history::{applied_versions, current_record, reconcile_history};
pub use lock::LockState;
pub use lock_id::{advisory_lock_id, crc32, AdvisoryLockId};
pub use migration::{MigrationInfo, MigrationSource, MigrationType};
pub use migrator::Migrator;
pub use plan::{plan_migrations, MissingSourcePolicy, PlanRequest};
pub use record::{MigrationRecord, MigrationRecordInfo, RecordCorrection, RecordState};
pub use startup::startup_migrations;
pub use status::{FailedMigration, MigrateReport, MigrationStatus, ValidationReport};
pub use validate::{records_to_repair, records_to_validate, validate_migration};
pub use version::{compare_versions, SortDirection};
