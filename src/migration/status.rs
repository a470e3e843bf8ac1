//! Outcomes returned by migrator operations

use crate::migration::{MigrationError, MigrationRecordInfo, MigrationSource};

/// Migration status information
#[derive(Debug, Clone)]
pub struct MigrationStatus {
    /// Most recently applied forward record
    pub current: MigrationRecordInfo,

    /// Reconciled history
    pub history: Vec<MigrationRecordInfo>,

    /// Migrations that would run to reach the latest source version
    pub pending: Vec<MigrationSource>,
}

impl MigrationStatus {
    /// Check if all migrations are applied
    #[must_use]
    pub fn is_up_to_date(&self) -> bool {
        self.pending.is_empty()
    }

    #[must_use]
    pub fn current_version(&self) -> &str {
        self.current.version()
    }

    /// Get the next pending migration version
    #[must_use]
    pub fn next_pending_version(&self) -> Option<&str> {
        self.pending.first().map(|m| m.version.as_str())
    }
}

/// Result of a validation pass
#[derive(Debug, Default)]
pub struct ValidationReport {
    /// Number of records checked against their source
    pub checked: usize,

    /// `Dirty` and `HashMismatch` errors, one per offending record
    pub violations: Vec<MigrationError>,
}

impl ValidationReport {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    /// Turn violations into an error
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::ValidationFailed` if any violation was found.
    pub fn into_result(self) -> Result<usize, MigrationError> {
        if self.violations.is_empty() {
            Ok(self.checked)
        } else {
            Err(MigrationError::ValidationFailed(self.violations))
        }
    }
}

/// A planned step that failed while the migrator kept going
#[derive(Debug)]
pub struct FailedMigration {
    pub migration: MigrationSource,
    pub error: MigrationError,
}

/// Result of a migrate run
#[derive(Debug, Default)]
pub struct MigrateReport {
    /// Steps that ran successfully, in execution order
    pub applied: Vec<MigrationSource>,

    /// Steps that failed; only populated under `FailurePolicy::Continue`
    pub failed: Vec<FailedMigration>,
}

impl MigrateReport {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    #[must_use]
    pub fn applied_count(&self) -> usize {
        self.applied.len()
    }
}
