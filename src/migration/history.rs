//! History reconciliation and current-version resolution

use crate::migration::{MigrationRecord, MigrationRecordInfo, MigrationType, RecordState};
use std::collections::{HashMap, HashSet};

/// Annotate records (ascending by id) with their applied/reverted state
///
/// The latest record for a version, of either type, closes the previous record
/// for that version: an `undo` reverts the `do` before it and a later `do`
/// reverts that `undo`. Records at the base version are never closed.
#[must_use]
pub fn reconcile_history(base_version: &str, records: Vec<MigrationRecord>) -> Vec<MigrationRecordInfo> {
    let mut history: Vec<MigrationRecordInfo> = records
        .into_iter()
        .map(|record| MigrationRecordInfo {
            record,
            state: RecordState::Applied,
            reverted_by: None,
        })
        .collect();

    let mut last_index_by_version: HashMap<String, usize> = HashMap::new();

    for index in 0..history.len() {
        let (id, version) = {
            let current = &history[index].record;
            (current.id, current.version.clone())
        };

        if version == base_version {
            continue;
        }

        if let Some(prev_index) = last_index_by_version.insert(version, index) {
            let prev = &mut history[prev_index];
            prev.state = RecordState::Reverted;
            prev.reverted_by = Some(id);
        }
    }

    history
}

/// Select the most recently applied forward record
///
/// Chosen by highest id, not by version: after out-of-order runs a later id
/// may carry a lower version.
#[must_use]
pub fn current_record(history: &[MigrationRecordInfo]) -> Option<&MigrationRecordInfo> {
    history
        .iter()
        .filter(|info| info.is_applied() && info.record.migration_type == MigrationType::Do)
        .max_by_key(|info| info.record.id)
}

/// Versions whose forward record is currently in effect
#[must_use]
pub fn applied_versions(history: &[MigrationRecordInfo]) -> HashSet<String> {
    history
        .iter()
        .filter(|info| info.is_applied() && info.record.migration_type == MigrationType::Do)
        .map(|info| info.record.version.clone())
        .collect()
}
