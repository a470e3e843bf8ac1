//! Lifecycle events emitted by the migrator

use crate::migration::{MigrationError, MigrationRecordInfo, MigrationSource};
use serde::Deserialize;

/// Whether a per-item failure stops the remaining batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Return the first failure
    Abort,
    /// Report the failure as an event and move on to the next item
    Continue,
}

/// Event emitted while the migrator works
///
/// Events are informational: observers cannot change the outcome of an
/// operation.
#[derive(Debug, Clone, Copy)]
pub enum MigratorEvent<'a> {
    LockStart,
    LockEnd,
    UnlockStart,
    UnlockEnd,
    OpenStart,
    OpenEnd,
    CloseStart,
    CloseEnd,
    DropStart,
    DropEnd,
    Current(&'a MigrationRecordInfo),
    History(&'a [MigrationRecordInfo]),
    Pending(&'a [MigrationSource]),
    ValidateStart,
    ValidateRunStart(&'a MigrationRecordInfo),
    ValidateError(&'a MigrationRecordInfo, &'a MigrationError),
    ValidateRunEnd(&'a MigrationRecordInfo),
    ValidateEnd,
    MigrateStart,
    MigrateRunStart(&'a MigrationSource),
    MigrateError(&'a MigrationSource, &'a MigrationError),
    MigrateRunEnd(&'a MigrationSource),
    MigrateEnd,
    RepairStart,
    RepairEnd,
    Error(&'a MigrationError),
}

impl MigratorEvent<'_> {
    /// Stable event name, e.g. `migrate:run:start`
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            MigratorEvent::LockStart => "lock:start",
            MigratorEvent::LockEnd => "lock:end",
            MigratorEvent::UnlockStart => "unlock:start",
            MigratorEvent::UnlockEnd => "unlock:end",
            MigratorEvent::OpenStart => "open:start",
            MigratorEvent::OpenEnd => "open:end",
            MigratorEvent::CloseStart => "close:start",
            MigratorEvent::CloseEnd => "close:end",
            MigratorEvent::DropStart => "drop:start",
            MigratorEvent::DropEnd => "drop:end",
            MigratorEvent::Current(_) => "current",
            MigratorEvent::History(_) => "history",
            MigratorEvent::Pending(_) => "pending",
            MigratorEvent::ValidateStart => "validate:start",
            MigratorEvent::ValidateRunStart(_) => "validate:run:start",
            MigratorEvent::ValidateError(..) => "validate:error",
            MigratorEvent::ValidateRunEnd(_) => "validate:run:end",
            MigratorEvent::ValidateEnd => "validate:end",
            MigratorEvent::MigrateStart => "migrate:start",
            MigratorEvent::MigrateRunStart(_) => "migrate:run:start",
            MigratorEvent::MigrateError(..) => "migrate:error",
            MigratorEvent::MigrateRunEnd(_) => "migrate:run:end",
            MigratorEvent::MigrateEnd => "migrate:end",
            MigratorEvent::RepairStart => "repair:start",
            MigratorEvent::RepairEnd => "repair:end",
            MigratorEvent::Error(_) => "error",
        }
    }
}

/// Receives migrator events
pub trait MigratorObserver: Send {
    fn on_event(&mut self, event: &MigratorEvent<'_>);
}

impl<F> MigratorObserver for F
where
    F: FnMut(&MigratorEvent<'_>) + Send,
{
    fn on_event(&mut self, event: &MigratorEvent<'_>) {
        self(event);
    }
}

/// Write an event to the log stream
pub(crate) fn log_event(event: &MigratorEvent<'_>) {
    match event {
        MigratorEvent::MigrateRunEnd(migration) => {
            log::info!(
                "Applied migration {}.{} ({})",
                migration.version,
                migration.migration_type,
                migration.title
            );
        }
        MigratorEvent::MigrateError(migration, error) => {
            log::error!(
                "Migration {}.{} failed: {}",
                migration.version,
                migration.migration_type,
                error
            );
        }
        MigratorEvent::ValidateError(info, error) => {
            log::warn!("Validation failed for record #{}: {}", info.record.id, error);
        }
        MigratorEvent::Error(error) => log::error!("{error}"),
        other => log::debug!("{}", other.name()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names() {
        assert_eq!(MigratorEvent::LockStart.name(), "lock:start");
        assert_eq!(MigratorEvent::RepairEnd.name(), "repair:end");
        let err = MigrationError::NotLocked;
        assert_eq!(MigratorEvent::Error(&err).name(), "error");
    }

    #[test]
    fn test_closure_observer() {
        let mut seen = Vec::new();
        {
            let mut observer = |event: &MigratorEvent<'_>| seen.push(event.name());
            observer.on_event(&MigratorEvent::OpenStart);
            observer.on_event(&MigratorEvent::OpenEnd);
        }
        assert_eq!(seen, vec!["open:start", "open:end"]);
    }
}
