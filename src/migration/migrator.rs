//! Migrator - core migration orchestration engine

use crate::config::MigratorConfig;
use crate::migration::engine::get_migration;
use crate::migration::events::log_event;
use crate::migration::history::{applied_versions, current_record, reconcile_history};
use crate::migration::lock::{LockState, MigratorLock};
use crate::migration::plan::{plan_migrations, PlanRequest};
use crate::migration::validate::{records_to_repair, records_to_validate, validate_migration};
use crate::migration::version::{compare_versions, SortDirection};
use crate::migration::{
    advisory_lock_id, DatabaseEngine, DatabaseEngineFactory, DatabaseHelpers, FailedMigration,
    FailurePolicy, MigrateReport, MigrationError, MigrationInfoParser, MigrationRecordInfo,
    MigrationSource, MigrationStatus, MigratorEvent, MigratorObserver, RecordCorrection, Result,
    SourceEngine, SourceEngineFactory, SourceHelpers, ValidationReport,
};
use std::cmp::Ordering;

/// Core migration orchestration engine
///
/// The `Migrator` owns one database engine and one source engine and drives
/// them: it reconciles history, plans and runs migrations, validates applied
/// records and repairs them.
///
/// Every operation except `open`/`close` is guarded by the migrator lock,
/// which also takes the database engine's cross-process lock. A second guarded
/// call while the lock is held fails fast with `AlreadyLocked`; the migrator
/// must not be shared between concurrent sessions.
pub struct Migrator {
    config: MigratorConfig,
    database: Box<dyn DatabaseEngine>,
    source: Box<dyn SourceEngine>,
    lock_state: LockState,
    observers: Vec<Box<dyn MigratorObserver>>,
}

impl Migrator {
    /// Create a migrator over the given engines
    pub fn new(
        config: MigratorConfig,
        database: Box<dyn DatabaseEngine>,
        source: Box<dyn SourceEngine>,
    ) -> Self {
        Self {
            config,
            database,
            source,
            lock_state: LockState::Unlocked,
            observers: Vec::new(),
        }
    }

    /// Build both engines from their factories using the configured URIs
    ///
    /// # Errors
    ///
    /// Returns an error if the filename notation is invalid or either factory fails.
    pub fn from_factories(
        config: MigratorConfig,
        database_factory: DatabaseEngineFactory,
        source_factory: SourceEngineFactory,
    ) -> Result<Self> {
        let database_helpers = DatabaseHelpers {
            base_version: config.base_version.clone(),
            lock_id: advisory_lock_id,
        };
        let source_helpers = SourceHelpers {
            parser: MigrationInfoParser::new(config.notation.clone())?,
        };

        let database = database_factory(&config.database_uri, &database_helpers)?;
        let source = source_factory(&config.source_uri, &source_helpers)?;

        Ok(Self::new(config, database, source))
    }

    /// Register an observer for lifecycle events
    pub fn observe(&mut self, observer: impl MigratorObserver + 'static) -> &mut Self {
        self.observers.push(Box::new(observer));
        self
    }

    #[must_use]
    pub fn config(&self) -> &MigratorConfig {
        &self.config
    }

    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.lock_state == LockState::Locked
    }

    fn emit(&mut self, event: &MigratorEvent<'_>) {
        log_event(event);
        for observer in &mut self.observers {
            observer.on_event(event);
        }
    }

    /// Acquire the migrator lock and the database engine's lock
    ///
    /// # Errors
    ///
    /// Returns `AlreadyLocked` if this migrator already holds the lock.
    pub fn lock(&mut self) -> Result<()> {
        self.emit(&MigratorEvent::LockStart);

        if self.lock_state == LockState::Locked {
            return Err(MigrationError::AlreadyLocked);
        }

        self.database.lock()?;
        self.lock_state = LockState::Locked;

        self.emit(&MigratorEvent::LockEnd);
        Ok(())
    }

    /// Release the database engine's lock and the migrator lock
    ///
    /// # Errors
    ///
    /// Returns `NotLocked` if the lock is not held.
    pub fn unlock(&mut self) -> Result<()> {
        self.emit(&MigratorEvent::UnlockStart);

        if self.lock_state == LockState::Unlocked {
            return Err(MigrationError::NotLocked);
        }

        self.database.unlock()?;
        self.lock_state = LockState::Unlocked;

        self.emit(&MigratorEvent::UnlockEnd);
        Ok(())
    }

    /// Run `body` while holding the lock; the lock is released on every path
    fn guarded<T>(
        &mut self,
        operation: &'static str,
        events: Option<(MigratorEvent<'static>, MigratorEvent<'static>)>,
        body: impl FnOnce(&mut Migrator) -> Result<T>,
    ) -> Result<T> {
        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!("migrator", operation).entered();

        log::debug!("Starting {operation}");

        let result = self.run_locked(events, body);

        if let Err(error) = &result {
            self.emit(&MigratorEvent::Error(error));
        }

        result
    }

    fn run_locked<T>(
        &mut self,
        events: Option<(MigratorEvent<'static>, MigratorEvent<'static>)>,
        body: impl FnOnce(&mut Migrator) -> Result<T>,
    ) -> Result<T> {
        let mut guard = MigratorLock::acquire(self)?;

        if let Some((start, _)) = &events {
            guard.emit(start);
        }

        let outcome = body(&mut *guard);

        if let (Ok(_), Some((_, end))) = (&outcome, &events) {
            guard.emit(end);
        }

        let released = guard.release();
        let value = outcome?;
        released?;

        Ok(value)
    }

    /// Open both engines
    pub fn open(&mut self) -> Result<()> {
        self.emit(&MigratorEvent::OpenStart);

        self.database.open()?;
        self.source.open()?;

        self.emit(&MigratorEvent::OpenEnd);
        Ok(())
    }

    /// Close both engines, releasing the lock first if it is still held
    pub fn close(&mut self) -> Result<()> {
        if self.is_locked() {
            self.unlock()?;
        }

        self.emit(&MigratorEvent::CloseStart);

        let database = self.database.close();
        let source = self.source.close();
        database?;
        source?;

        self.emit(&MigratorEvent::CloseEnd);
        Ok(())
    }

    /// Drop everything in the database
    pub fn drop_all(&mut self) -> Result<()> {
        self.guarded(
            "drop",
            Some((MigratorEvent::DropStart, MigratorEvent::DropEnd)),
            |m| m.database.drop_all(),
        )
    }

    /// The most recently applied forward record
    pub fn current(&mut self) -> Result<MigrationRecordInfo> {
        self.guarded("current", None, |m| {
            let history = m.load_history(m.config.record_start_id)?;
            let current = resolve_current(&history)?.clone();

            m.emit(&MigratorEvent::Current(&current));
            Ok(current)
        })
    }

    /// Reconciled history, starting at `start_id` or the configured record start id
    pub fn history(&mut self, start_id: Option<i64>) -> Result<Vec<MigrationRecordInfo>> {
        self.guarded("history", None, |m| {
            let history = m.load_history(start_id.unwrap_or(m.config.record_start_id))?;

            m.emit(&MigratorEvent::History(&history));
            Ok(history)
        })
    }

    /// Migrations that would run to reach the latest source version
    pub fn pending(&mut self) -> Result<Vec<MigrationSource>> {
        self.guarded("pending", None, |m| {
            let history = m.load_history(m.config.record_start_id)?;
            let pending = m.pending_from(&history)?;

            m.emit(&MigratorEvent::Pending(&pending));
            Ok(pending)
        })
    }

    /// Current record, history and pending migrations in one locked read
    pub fn info(&mut self) -> Result<MigrationStatus> {
        self.guarded("info", None, |m| {
            let history = m.load_history(m.config.record_start_id)?;
            let current = resolve_current(&history)?.clone();
            let pending = m.pending_from(&history)?;

            m.emit(&MigratorEvent::Current(&current));
            m.emit(&MigratorEvent::History(&history));
            m.emit(&MigratorEvent::Pending(&pending));

            Ok(MigrationStatus {
                current,
                history,
                pending,
            })
        })
    }

    /// Check every applied record against its source
    ///
    /// Violations (`Dirty`, `HashMismatch`) are emitted as `validate:error`
    /// events. Under `FailurePolicy::Continue` they are collected in the report;
    /// under `FailurePolicy::Abort` the first one is returned as the error.
    /// A missing source always aborts with `NotFound`.
    pub fn validate(&mut self) -> Result<ValidationReport> {
        self.guarded(
            "validate",
            Some((MigratorEvent::ValidateStart, MigratorEvent::ValidateEnd)),
            |m| {
                let history = m.load_history(m.config.record_start_id)?;
                let base_version = m.config.base_version.clone();
                let policy = m.config.validate_failures;

                let mut report = ValidationReport::default();

                for info in records_to_validate(&base_version, &history) {
                    m.emit(&MigratorEvent::ValidateRunStart(info));

                    let record = &info.record;
                    let migration = get_migration(m.source.as_ref(), &record.version, record.migration_type)?
                        .ok_or_else(|| MigrationError::not_found(&record.version, record.migration_type))?;

                    report.checked += 1;

                    match validate_migration(record, &migration) {
                        Ok(()) => m.emit(&MigratorEvent::ValidateRunEnd(info)),
                        Err(error) => {
                            m.emit(&MigratorEvent::ValidateError(info, &error));
                            if policy == FailurePolicy::Abort {
                                return Err(error);
                            }
                            report.violations.push(error);
                        }
                    }
                }

                Ok(report)
            },
        )
    }

    /// Migrate the database to `target_version`
    ///
    /// Each planned step is run through the database engine. A failing step is
    /// emitted as `migrate:error`; under `FailurePolicy::Abort` (the default)
    /// it ends the run with that error, under `FailurePolicy::Continue` it is
    /// recorded in the report and the next step runs. Only opt into continuing
    /// when later steps do not depend on earlier ones.
    pub fn migrate(&mut self, target_version: &str) -> Result<MigrateReport> {
        self.guarded(
            "migrate",
            Some((MigratorEvent::MigrateStart, MigratorEvent::MigrateEnd)),
            |m| {
                let history = m.load_history(m.config.record_start_id)?;
                let current_version = resolve_current(&history)?.record.version.clone();
                let plan = m.plan(&history, &current_version, target_version)?;

                m.run_plan(plan)
            },
        )
    }

    /// Migrate the database to the latest source version
    pub fn migrate_latest(&mut self) -> Result<MigrateReport> {
        self.guarded(
            "migrate",
            Some((MigratorEvent::MigrateStart, MigratorEvent::MigrateEnd)),
            |m| {
                let history = m.load_history(m.config.record_start_id)?;
                let current_version = resolve_current(&history)?.record.version.clone();

                let Some(target_version) = m.latest_target(&current_version)? else {
                    return Ok(MigrateReport::default());
                };

                let plan = m.plan(&history, &current_version, &target_version)?;
                m.run_plan(plan)
            },
        )
    }

    /// Delete dirty records and rewrite hashes of records whose source changed
    ///
    /// Returns the hash corrections that were applied.
    pub fn repair(&mut self) -> Result<Vec<RecordCorrection>> {
        self.guarded(
            "repair",
            Some((MigratorEvent::RepairStart, MigratorEvent::RepairEnd)),
            |m| {
                let history = m.load_history(m.config.record_start_id)?;
                let corrections = records_to_repair(m.source.as_ref(), &m.config.base_version, &history)?;

                let dirty = history.iter().filter(|info| info.record.dirty).count();

                m.database.repair(&corrections)?;

                log::info!(
                    "Repaired migration records: {} dirty record(s) removed, {} hash(es) corrected",
                    dirty,
                    corrections.len()
                );
                Ok(corrections)
            },
        )
    }

    fn load_history(&self, start_id: i64) -> Result<Vec<MigrationRecordInfo>> {
        let records = self.database.records(start_id)?;
        Ok(reconcile_history(&self.config.base_version, records))
    }

    fn plan(
        &self,
        history: &[MigrationRecordInfo],
        current_version: &str,
        target_version: &str,
    ) -> Result<Vec<MigrationSource>> {
        let applied = applied_versions(history);

        plan_migrations(
            self.source.as_ref(),
            &PlanRequest {
                current_version,
                base_version: &self.config.base_version,
                target_version,
                applied_versions: &applied,
                out_of_order: self.config.out_of_order,
                missing_source: self.config.missing_source,
            },
        )
    }

    /// Latest catalog version to migrate to, `None` when there is nothing ahead
    fn latest_target(&self, current_version: &str) -> Result<Option<String>> {
        let Some(last) = self.source.last()? else {
            return Ok(None);
        };

        if compare_versions(SortDirection::Asc, current_version, &last) == Ordering::Less {
            Ok(Some(last))
        } else if self.config.out_of_order {
            Ok(Some(current_version.to_string()))
        } else {
            Ok(None)
        }
    }

    fn pending_from(&self, history: &[MigrationRecordInfo]) -> Result<Vec<MigrationSource>> {
        let current_version = resolve_current(history)?.version();

        match self.latest_target(current_version)? {
            Some(target_version) => self.plan(history, current_version, &target_version),
            None => Ok(Vec::new()),
        }
    }

    fn run_plan(&mut self, plan: Vec<MigrationSource>) -> Result<MigrateReport> {
        let policy = self.config.migrate_failures;
        let mut report = MigrateReport::default();

        for migration in plan {
            self.emit(&MigratorEvent::MigrateRunStart(&migration));

            match self.database.run(&migration) {
                Ok(()) => {
                    self.emit(&MigratorEvent::MigrateRunEnd(&migration));
                    report.applied.push(migration);
                }
                Err(error) => {
                    self.emit(&MigratorEvent::MigrateError(&migration, &error));
                    match policy {
                        FailurePolicy::Abort => return Err(error),
                        FailurePolicy::Continue => report.failed.push(FailedMigration { migration, error }),
                    }
                }
            }
        }

        Ok(report)
    }
}

fn resolve_current(history: &[MigrationRecordInfo]) -> Result<&MigrationRecordInfo> {
    current_record(history).ok_or_else(|| {
        MigrationError::InvalidState(
            "no applied forward record found; the base version record is missing from history".to_string(),
        )
    })
}
