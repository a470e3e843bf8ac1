//! `MigrationRecord` - entries persisted by a database engine for every executed step

use crate::migration::MigrationType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A migration step that has run against the database
///
/// Records are append-only: the database engine inserts one per executed step
/// and only `repair` ever rewrites a hash or removes a dirty record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationRecord {
    /// Store-assigned monotonic id; the only authoritative apply order
    pub id: i64,

    pub version: String,

    #[serde(rename = "type")]
    pub migration_type: MigrationType,

    pub title: String,

    /// Hash of the migration body that was run
    pub hash: String,

    /// When the step was applied (informational only)
    pub applied_at: DateTime<Utc>,

    pub applied_by: String,

    /// Execution time in milliseconds
    pub execution_time_ms: i64,

    /// Execution failed or was interrupted after partial side effects
    pub dirty: bool,
}

impl MigrationRecord {
    /// Create a new `MigrationRecord`
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: i64,
        version: impl Into<String>,
        migration_type: MigrationType,
        title: impl Into<String>,
        hash: impl Into<String>,
        applied_at: DateTime<Utc>,
        applied_by: impl Into<String>,
        execution_time_ms: i64,
        dirty: bool,
    ) -> Self {
        Self {
            id,
            version: version.into(),
            migration_type,
            title: title.into(),
            hash: hash.into(),
            applied_at,
            applied_by: applied_by.into(),
            execution_time_ms,
            dirty,
        }
    }
}

/// Reconciled state of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordState {
    /// Currently in effect on the database
    Applied,
    /// Closed by a later record for the same version
    Reverted,
}

/// A record annotated with its reconciled state; derived, never persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationRecordInfo {
    #[serde(flatten)]
    pub record: MigrationRecord,
    pub state: RecordState,
    /// Id of the record that closed this one
    pub reverted_by: Option<i64>,
}

impl MigrationRecordInfo {
    #[must_use]
    pub fn is_applied(&self) -> bool {
        self.state == RecordState::Applied
    }

    #[must_use]
    pub fn version(&self) -> &str {
        &self.record.version
    }
}

/// Hash correction produced by repair planning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordCorrection {
    pub id: i64,
    pub hash: String,
}
