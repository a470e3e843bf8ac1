//! Migration-specific error types

use crate::migration::{MigrationRecord, MigrationType};
use std::fmt;
use thiserror::Error;

/// Convenience alias used throughout the migration engine
pub type Result<T, E = MigrationError> = std::result::Result<T, E>;

/// Identifies a single migration record inside error payloads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordRef {
    pub id: i64,
    pub version: String,
    pub migration_type: MigrationType,
}

impl From<&MigrationRecord> for RecordRef {
    fn from(record: &MigrationRecord) -> Self {
        Self {
            id: record.id,
            version: record.version.clone(),
            migration_type: record.migration_type,
        }
    }
}

impl fmt::Display for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} ({}.{})", self.id, self.version, self.migration_type)
    }
}

/// Migration-specific errors
#[derive(Debug, Error)]
pub enum MigrationError {
    /// Referenced version/type has no definition at the source
    #[error("Missing migration source: version {version} ({migration_type})")]
    NotFound {
        version: String,
        migration_type: MigrationType,
    },

    /// Record was left dirty by a failed or interrupted run
    #[error(
        "Migration record {0} is dirty.\n\
         Its execution failed or was interrupted; run repair after fixing the database by hand."
    )]
    Dirty(RecordRef),

    /// Stored hash differs from the hash of the current source body
    #[error(
        "Migration record {record} has been modified after being applied.\n\
         Stored hash: {stored}\n\
         Current hash: {current}"
    )]
    HashMismatch {
        record: RecordRef,
        stored: String,
        current: String,
    },

    /// History or requested versions violate an ordering invariant
    #[error("Invalid migration state: {0}")]
    InvalidState(String),

    /// A guarded operation was started while the migrator already held its lock
    #[error("Migrator is already locked")]
    AlreadyLocked,

    /// `unlock` was called without a prior successful `lock`
    #[error("Migrator is not locked")]
    NotLocked,

    /// Migration filename does not match the configured notation
    #[error("Invalid migration filename: {filename}")]
    InvalidFilename { filename: String },

    /// Validation found one or more violations
    #[error("Validation failed with {} violation(s)", .0.len())]
    ValidationFailed(Vec<MigrationError>),

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Opaque failure raised by a database or source engine
    #[error("Exception: {message}")]
    Exception {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

/// Error kind without payload, for exit-code mapping and matching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Dirty,
    HashMismatch,
    InvalidState,
    AlreadyLocked,
    NotLocked,
    InvalidFilename,
    ValidationFailed,
    Config,
    Exception,
}

impl MigrationError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            MigrationError::NotFound { .. } => ErrorKind::NotFound,
            MigrationError::Dirty(_) => ErrorKind::Dirty,
            MigrationError::HashMismatch { .. } => ErrorKind::HashMismatch,
            MigrationError::InvalidState(_) => ErrorKind::InvalidState,
            MigrationError::AlreadyLocked => ErrorKind::AlreadyLocked,
            MigrationError::NotLocked => ErrorKind::NotLocked,
            MigrationError::InvalidFilename { .. } => ErrorKind::InvalidFilename,
            MigrationError::ValidationFailed(_) => ErrorKind::ValidationFailed,
            MigrationError::Config(_) => ErrorKind::Config,
            MigrationError::Exception { .. } => ErrorKind::Exception,
        }
    }

    pub(crate) fn not_found(version: impl Into<String>, migration_type: MigrationType) -> Self {
        MigrationError::NotFound {
            version: version.into(),
            migration_type,
        }
    }

    /// Wrap a collaborator failure
    pub fn exception<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        MigrationError::Exception {
            message: error.to_string(),
            source: Some(Box::new(error)),
        }
    }

    /// Collaborator failure described only by a message
    pub fn message(message: impl Into<String>) -> Self {
        MigrationError::Exception {
            message: message.into(),
            source: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_matches_variant() {
        let err = MigrationError::not_found("02", MigrationType::Undo);
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.to_string(), "Missing migration source: version 02 (undo)");

        assert_eq!(MigrationError::AlreadyLocked.kind(), ErrorKind::AlreadyLocked);
        assert_eq!(MigrationError::NotLocked.kind(), ErrorKind::NotLocked);
    }

    #[test]
    fn test_exception_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "connection reset");
        let err = MigrationError::exception(io);

        assert_eq!(err.kind(), ErrorKind::Exception);
        assert_eq!(err.to_string(), "Exception: connection reset");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_validation_failed_counts_violations() {
        let record = RecordRef {
            id: 4,
            version: "03".to_string(),
            migration_type: MigrationType::Do,
        };
        let err = MigrationError::ValidationFailed(vec![
            MigrationError::Dirty(record.clone()),
            MigrationError::HashMismatch {
                record,
                stored: "a".to_string(),
                current: "b".to_string(),
            },
        ]);

        assert_eq!(err.kind(), ErrorKind::ValidationFailed);
        assert_eq!(err.to_string(), "Validation failed with 2 violation(s)");
    }
}
