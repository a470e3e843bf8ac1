//! Validation of applied records against their sources, and repair planning

use crate::migration::engine::get_migration;
use crate::migration::{
    MigrationError, MigrationRecord, MigrationRecordInfo, MigrationSource, RecordCorrection, Result,
    SourceEngine,
};

/// Check a single applied record against its source
///
/// # Errors
///
/// - `Dirty` if the record is marked dirty
/// - `HashMismatch` if the stored hash differs from the source hash
pub fn validate_migration(record: &MigrationRecord, migration: &MigrationSource) -> Result<()> {
    if record.dirty {
        return Err(MigrationError::Dirty(record.into()));
    }

    if record.hash != migration.hash() {
        return Err(MigrationError::HashMismatch {
            record: record.into(),
            stored: record.hash.clone(),
            current: migration.hash().to_string(),
        });
    }

    Ok(())
}

/// Applied records subject to validation, excluding the base version
pub fn records_to_validate<'a>(
    base_version: &'a str,
    history: &'a [MigrationRecordInfo],
) -> impl Iterator<Item = &'a MigrationRecordInfo> + 'a {
    history
        .iter()
        .filter(move |info| info.is_applied() && info.record.version != base_version)
}

/// Compute hash corrections for applied, non-dirty records whose source changed
///
/// Dirty records are left out: they need operator attention and are deleted by
/// the database engine's repair rather than rehashed.
///
/// # Errors
///
/// Returns `NotFound` if a record's source definition no longer exists.
pub fn records_to_repair(
    source: &dyn SourceEngine,
    base_version: &str,
    history: &[MigrationRecordInfo],
) -> Result<Vec<RecordCorrection>> {
    let mut corrections = Vec::new();

    for info in records_to_validate(base_version, history).filter(|info| !info.record.dirty) {
        let record = &info.record;

        let migration = get_migration(source, &record.version, record.migration_type)?
            .ok_or_else(|| MigrationError::not_found(&record.version, record.migration_type))?;

        if migration.hash() != record.hash {
            corrections.push(RecordCorrection {
                id: record.id,
                hash: migration.hash().to_string(),
            });
        }
    }

    Ok(corrections)
}
