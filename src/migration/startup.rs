//! In-process migration execution helpers

use crate::migration::{MigrateReport, Migrator, Result};

/// Run migrations on application startup
///
/// This function is designed to be called during application initialization
/// to bring the database up to the latest source version. It:
/// - opens both engines
/// - validates already-applied migrations (any violation aborts startup)
/// - applies pending migrations under the migrator lock
/// - closes both engines, also when a step above failed
///
/// # Behavior
///
/// - **First process wins:** the database engine's lock serializes
///   concurrent instances; later ones block until it is released
/// - **Fail-fast:** if migrations fail, the application should not start
///
/// # Example
///
/// ```rust,no_run
/// use waymark::config::MigratorConfig;
/// use waymark::migration::{startup_migrations, Migrator};
/// # use waymark::migration::{DatabaseEngine, SourceEngine};
/// # fn engines() -> (Box<dyn DatabaseEngine>, Box<dyn SourceEngine>) { unimplemented!() }
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let (database, source) = engines();
///     let mut migrator = Migrator::new(MigratorConfig::load()?, database, source);
///
///     startup_migrations(&mut migrator)?;
///
///     // Continue with application startup...
///     Ok(())
/// }
/// ```
pub fn startup_migrations(migrator: &mut Migrator) -> Result<MigrateReport> {
    migrator.open()?;

    let result = validate_and_migrate(migrator);
    let closed = migrator.close();

    let report = result?;
    closed?;

    if report.applied_count() > 0 {
        log::info!("Applied {} migration(s) on startup", report.applied_count());
    } else {
        log::debug!("No pending migrations to apply");
    }

    Ok(report)
}

fn validate_and_migrate(migrator: &mut Migrator) -> Result<MigrateReport> {
    let checked = migrator.validate()?.into_result()?;
    log::debug!("Validated {checked} applied migration(s)");

    migrator.migrate_latest()
}
