//! Collaborator contracts: the database engine and the source engine
//!
//! The migrator owns one of each and drives them through these traits. Calls
//! may block on I/O; timeouts and retries belong to the implementations.

use crate::migration::{
    AdvisoryLockId, MigrationInfo, MigrationInfoParser, MigrationRecord, MigrationSource,
    MigrationType, RecordCorrection, Result,
};

/// Target store where migrations run and records are persisted
pub trait DatabaseEngine: Send {
    /// Open the connection
    fn open(&mut self) -> Result<()>;

    /// Close the connection
    fn close(&mut self) -> Result<()>;

    /// Acquire the cross-process lock; may block until it is granted
    fn lock(&mut self) -> Result<()>;

    /// Release the cross-process lock
    fn unlock(&mut self) -> Result<()>;

    /// Drop everything in the database
    fn drop_all(&mut self) -> Result<()>;

    /// Records with `id >= start_id`, ascending by id
    fn records(&self, start_id: i64) -> Result<Vec<MigrationRecord>>;

    /// Execute the migration body and insert its record
    ///
    /// If execution fails the record must still be inserted with
    /// `dirty = true` before the error is returned.
    fn run(&mut self, migration: &MigrationSource) -> Result<()>;

    /// Delete dirty records, then rewrite the hash of each listed record
    fn repair(&mut self, corrections: &[RecordCorrection]) -> Result<()>;
}

/// Catalog of migration definitions, sorted by version
///
/// `first`/`last`/`next`/`prev` are relative to the engine's own catalog and
/// know nothing about the base version.
pub trait SourceEngine: Send {
    fn open(&mut self) -> Result<()>;

    fn close(&mut self) -> Result<()>;

    fn first(&self) -> Result<Option<String>>;

    fn last(&self) -> Result<Option<String>>;

    fn next(&self, version: &str) -> Result<Option<String>>;

    fn prev(&self, version: &str) -> Result<Option<String>>;

    fn get(&self, version: &str, migration_type: MigrationType) -> Result<Option<MigrationInfo>>;

    /// Read the migration body
    fn read(&self, info: &MigrationInfo) -> Result<String>;
}

/// Fetch and read a migration, `None` when the source has no such definition
pub fn get_migration(
    source: &dyn SourceEngine,
    version: &str,
    migration_type: MigrationType,
) -> Result<Option<MigrationSource>> {
    let Some(info) = source.get(version, migration_type)? else {
        return Ok(None);
    };

    let body = source.read(&info)?;

    Ok(Some(MigrationSource::new(&info, body)))
}

/// Deterministic lock id generator handed to database engines
pub type LockIdGenerator = fn(&str, &[&str]) -> AdvisoryLockId;

/// Helpers passed to a database engine factory
#[derive(Debug, Clone)]
pub struct DatabaseHelpers {
    pub base_version: String,
    pub lock_id: LockIdGenerator,
}

/// Helpers passed to a source engine factory
#[derive(Debug, Clone)]
pub struct SourceHelpers {
    pub parser: MigrationInfoParser,
}

/// Builds a database engine from a connection URI
pub type DatabaseEngineFactory = fn(&str, &DatabaseHelpers) -> Result<Box<dyn DatabaseEngine>>;

/// Builds a source engine from a source URI
pub type SourceEngineFactory = fn(&str, &SourceHelpers) -> Result<Box<dyn SourceEngine>>;
