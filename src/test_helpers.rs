//! In-memory database and source engines
//!
//! Both engines are cheap cloneable handles over shared state, so a test can
//! keep a handle after moving a clone into a [`Migrator`](crate::migration::Migrator)
//! and inspect or tamper with the state between operations.

use crate::migration::{
    DatabaseEngine, DatabaseHelpers, MigrationError, MigrationInfo, MigrationInfoParser, MigrationRecord,
    MigrationSource, MigrationType, RecordCorrection, Result, SourceEngine, SourceHelpers,
};
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::ops::Bound;
use std::sync::Arc;
use std::time::Instant;

const APPLIED_BY: &str = "waymark";

#[derive(Debug, Default)]
struct DatabaseState {
    base_version: String,
    records: Vec<MigrationRecord>,
    last_id: i64,
    open: bool,
    locked: bool,
    executed: Vec<String>,
    failing: HashSet<(String, MigrationType)>,
}

impl DatabaseState {
    fn insert(&mut self, migration: &MigrationSource, execution_time_ms: i64, dirty: bool) -> i64 {
        self.last_id += 1;
        self.records.push(MigrationRecord::new(
            self.last_id,
            migration.version.clone(),
            migration.migration_type,
            migration.title.clone(),
            migration.hash(),
            Utc::now(),
            APPLIED_BY,
            execution_time_ms,
            dirty,
        ));
        self.last_id
    }

    fn ensure_open(&self) -> Result<()> {
        if self.open {
            Ok(())
        } else {
            Err(MigrationError::message("database is not open"))
        }
    }
}

/// Database engine keeping its migration records in memory
///
/// "Running" a migration records its body in [`MemoryDatabase::executed`].
/// The base-version record is inserted the first time the database is opened.
#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
    state: Arc<Mutex<DatabaseState>>,
}

impl MemoryDatabase {
    pub fn new(base_version: impl Into<String>) -> Self {
        let state = DatabaseState {
            base_version: base_version.into(),
            ..DatabaseState::default()
        };

        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Factory matching [`DatabaseEngineFactory`](crate::migration::DatabaseEngineFactory)
    pub fn factory(_uri: &str, helpers: &DatabaseHelpers) -> Result<Box<dyn DatabaseEngine>> {
        Ok(Box::new(Self::new(helpers.base_version.clone())))
    }

    /// Make every later run of `version`/`migration_type` fail after inserting a dirty record
    pub fn fail_on(&self, version: &str, migration_type: MigrationType) {
        self.state.lock().failing.insert((version.to_string(), migration_type));
    }

    /// Let `version`/`migration_type` run successfully again
    pub fn clear_failure(&self, version: &str, migration_type: MigrationType) {
        self.state.lock().failing.remove(&(version.to_string(), migration_type));
    }

    /// Insert a record directly, bypassing execution; returns its id
    pub fn insert_record(&self, migration: &MigrationSource, dirty: bool) -> i64 {
        self.state.lock().insert(migration, 0, dirty)
    }

    /// Overwrite the stored hash of a record
    pub fn set_hash(&self, id: i64, hash: &str) {
        let mut state = self.state.lock();
        if let Some(record) = state.records.iter_mut().find(|r| r.id == id) {
            record.hash = hash.to_string();
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<MigrationRecord> {
        self.state.lock().records.clone()
    }

    /// Bodies of successfully executed migrations, in execution order
    #[must_use]
    pub fn executed(&self) -> Vec<String> {
        self.state.lock().executed.clone()
    }

    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.state.lock().locked
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state.lock().open
    }
}

impl DatabaseEngine for MemoryDatabase {
    fn open(&mut self) -> Result<()> {
        let mut state = self.state.lock();
        state.open = true;

        if state.records.is_empty() {
            let base = MigrationSource::new(
                &MigrationInfo::new(state.base_version.clone(), MigrationType::Do, "base_version", ""),
                "",
            );
            state.insert(&base, 0, false);
        }

        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.state.lock().open = false;
        Ok(())
    }

    fn lock(&mut self) -> Result<()> {
        let mut state = self.state.lock();
        if state.locked {
            return Err(MigrationError::message("migration lock is held by another session"));
        }
        state.locked = true;
        Ok(())
    }

    fn unlock(&mut self) -> Result<()> {
        self.state.lock().locked = false;
        Ok(())
    }

    fn drop_all(&mut self) -> Result<()> {
        let mut state = self.state.lock();
        state.ensure_open()?;
        state.records.clear();
        state.executed.clear();
        state.last_id = 0;
        Ok(())
    }

    fn records(&self, start_id: i64) -> Result<Vec<MigrationRecord>> {
        let state = self.state.lock();
        state.ensure_open()?;

        Ok(state.records.iter().filter(|r| r.id >= start_id).cloned().collect())
    }

    fn run(&mut self, migration: &MigrationSource) -> Result<()> {
        let mut state = self.state.lock();
        state.ensure_open()?;

        let start = Instant::now();
        let failing = state
            .failing
            .contains(&(migration.version.clone(), migration.migration_type));

        if !failing {
            state.executed.push(migration.body.clone());
        }

        let execution_time_ms = i64::try_from(start.elapsed().as_millis()).unwrap_or(i64::MAX);

        // the attempt is recorded even when it fails
        state.insert(migration, execution_time_ms, failing);

        if failing {
            return Err(MigrationError::message(format!(
                "failed to run migration {}.{}",
                migration.version, migration.migration_type
            )));
        }

        Ok(())
    }

    fn repair(&mut self, corrections: &[RecordCorrection]) -> Result<()> {
        let mut state = self.state.lock();
        state.ensure_open()?;

        state.records.retain(|r| !r.dirty);

        for correction in corrections {
            if let Some(record) = state.records.iter_mut().find(|r| r.id == correction.id) {
                record.hash = correction.hash.clone();
            }
        }

        Ok(())
    }
}

#[derive(Debug, Default)]
struct SourceState {
    catalog: BTreeMap<String, BTreeMap<MigrationType, (MigrationInfo, String)>>,
    open: bool,
}

/// Source engine over an in-memory, lexicographically sorted catalog
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    state: Arc<Mutex<SourceState>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Factory matching [`SourceEngineFactory`](crate::migration::SourceEngineFactory)
    pub fn factory(_uri: &str, _helpers: &SourceHelpers) -> Result<Box<dyn SourceEngine>> {
        Ok(Box::new(Self::new()))
    }

    /// Build a catalog from `(filename, body)` pairs
    ///
    /// # Errors
    ///
    /// Returns `InvalidFilename` for names that do not follow the parser's notation.
    pub fn from_files(parser: &MigrationInfoParser, files: &[(&str, &str)]) -> Result<Self> {
        let source = Self::new();
        {
            let mut state = source.state.lock();
            for (filename, body) in files {
                let info = parser.parse(filename)?;
                state
                    .catalog
                    .entry(info.version.clone())
                    .or_default()
                    .insert(info.migration_type, (info, (*body).to_string()));
            }
        }
        Ok(source)
    }

    /// Add or replace a definition
    pub fn add(&self, version: &str, migration_type: MigrationType, title: &str, body: &str) {
        let filename = format!("{version}.{migration_type}.{title}.sql");
        let info = MigrationInfo::new(version, migration_type, title, filename);

        self.state
            .lock()
            .catalog
            .entry(version.to_string())
            .or_default()
            .insert(migration_type, (info, body.to_string()));
    }

    /// Remove a definition; the version leaves the catalog once both types are gone
    pub fn remove(&self, version: &str, migration_type: MigrationType) {
        let mut state = self.state.lock();
        if let Some(entries) = state.catalog.get_mut(version) {
            entries.remove(&migration_type);
            if entries.is_empty() {
                state.catalog.remove(version);
            }
        }
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state.lock().open
    }
}

impl SourceEngine for MemorySource {
    fn open(&mut self) -> Result<()> {
        self.state.lock().open = true;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.state.lock().open = false;
        Ok(())
    }

    fn first(&self) -> Result<Option<String>> {
        Ok(self.state.lock().catalog.keys().next().cloned())
    }

    fn last(&self) -> Result<Option<String>> {
        Ok(self.state.lock().catalog.keys().next_back().cloned())
    }

    fn next(&self, version: &str) -> Result<Option<String>> {
        Ok(self
            .state
            .lock()
            .catalog
            .range::<str, _>((Bound::Excluded(version), Bound::Unbounded))
            .next()
            .map(|(v, _)| v.clone()))
    }

    fn prev(&self, version: &str) -> Result<Option<String>> {
        Ok(self
            .state
            .lock()
            .catalog
            .range::<str, _>((Bound::Unbounded, Bound::Excluded(version)))
            .next_back()
            .map(|(v, _)| v.clone()))
    }

    fn get(&self, version: &str, migration_type: MigrationType) -> Result<Option<MigrationInfo>> {
        Ok(self
            .state
            .lock()
            .catalog
            .get(version)
            .and_then(|entries| entries.get(&migration_type))
            .map(|(info, _)| info.clone()))
    }

    fn read(&self, info: &MigrationInfo) -> Result<String> {
        self.state
            .lock()
            .catalog
            .get(&info.version)
            .and_then(|entries| entries.get(&info.migration_type))
            .map(|(_, body)| body.clone())
            .ok_or_else(|| MigrationError::message(format!("cannot read migration {}", info.filename)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::MigrationInfoNotation;

    #[test]
    fn test_source_navigation() {
        let source = MemorySource::new();
        for version in ["03", "01", "02"] {
            source.add(version, MigrationType::Do, "x", "");
        }

        assert_eq!(source.first().ok().flatten().as_deref(), Some("01"));
        assert_eq!(source.last().ok().flatten().as_deref(), Some("03"));
        assert_eq!(source.next("01").ok().flatten().as_deref(), Some("02"));
        assert_eq!(source.next("0").ok().flatten().as_deref(), Some("01"));
        assert_eq!(source.next("03").ok().flatten(), None);
        assert_eq!(source.prev("02").ok().flatten().as_deref(), Some("01"));
        assert_eq!(source.prev("01").ok().flatten(), None);
    }

    #[test]
    fn test_source_from_files() {
        let parser = MigrationInfoParser::new(MigrationInfoNotation::default()).expect("valid notation");
        let source = MemorySource::from_files(
            &parser,
            &[
                ("001.do.create users.sql", "CREATE TABLE users (id INT);"),
                ("001.undo.create users.sql", "DROP TABLE users;"),
            ],
        )
        .expect("valid files");

        let info = source.get("001", MigrationType::Undo).expect("get").expect("exists");
        assert_eq!(info.title, "create users");
        assert_eq!(source.read(&info).expect("read"), "DROP TABLE users;");

        assert!(MemorySource::from_files(&parser, &[("users.sql", "")]).is_err());
    }

    #[test]
    fn test_database_records_dirty_run() {
        let mut database = MemoryDatabase::new("0");
        database.open().expect("open");
        database.fail_on("01", MigrationType::Do);

        let migration = MigrationSource::new(&MigrationInfo::new("01", MigrationType::Do, "x", ""), "SELECT 1;");
        assert!(database.run(&migration).is_err());

        let records = database.records(0).expect("records");
        assert_eq!(records.len(), 2);
        assert!(records[1].dirty);
        assert!(database.executed().is_empty());
    }

    #[test]
    fn test_database_repair_removes_dirty_then_rehashes() {
        let mut database = MemoryDatabase::new("0");
        database.open().expect("open");

        let migration = MigrationSource::new(&MigrationInfo::new("01", MigrationType::Do, "x", ""), "SELECT 1;");
        let clean = database.insert_record(&migration, false);
        database.insert_record(&migration, true);

        database
            .repair(&[RecordCorrection {
                id: clean,
                hash: "fixed".to_string(),
            }])
            .expect("repair");

        let records = database.records(0).expect("records");
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| !r.dirty));
        assert_eq!(records[1].hash, "fixed");
    }
}
