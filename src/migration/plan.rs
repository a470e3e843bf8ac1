//! Migration planning: the ordered steps between the current and a target version

use crate::migration::engine::get_migration;
use crate::migration::version::{compare_versions, SortDirection};
use crate::migration::{MigrationError, MigrationSource, MigrationType, Result, SourceEngine};
use serde::Deserialize;
use std::cmp::Ordering;
use std::collections::HashSet;

/// What to do when a source definition is missing in the middle of a plan
///
/// The endpoints are always checked strictly; this only covers the versions
/// between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingSourcePolicy {
    /// Stop the plan at the last resolvable step
    #[default]
    Truncate,
    /// Fail with `NotFound`
    Strict,
}

/// Inputs for [`plan_migrations`]
#[derive(Debug, Clone)]
pub struct PlanRequest<'a> {
    pub current_version: &'a str,
    pub base_version: &'a str,
    pub target_version: &'a str,
    /// Versions whose forward record is currently applied
    pub applied_versions: &'a HashSet<String>,
    pub out_of_order: bool,
    pub missing_source: MissingSourcePolicy,
}

/// Compute the ordered migrations that move the database from the current
/// version to the target version
///
/// Forward plans include the target; backward plans stop before it. With
/// `out_of_order` a forward scan starts from the base version and skips
/// versions already applied, while a backward scan skips versions that were
/// never applied.
///
/// # Errors
///
/// - `InvalidState` if either version is below the base version
/// - `NotFound` if an endpoint (other than the base version) has no source in
///   the planned direction, or a mid-range source is missing under
///   [`MissingSourcePolicy::Strict`]
pub fn plan_migrations(source: &dyn SourceEngine, request: &PlanRequest<'_>) -> Result<Vec<MigrationSource>> {
    let PlanRequest {
        current_version,
        base_version,
        target_version,
        ..
    } = *request;

    if compare_versions(SortDirection::Asc, current_version, base_version) == Ordering::Less {
        return Err(MigrationError::InvalidState(format!(
            "current version {current_version} is below base version {base_version}"
        )));
    }

    if compare_versions(SortDirection::Asc, target_version, base_version) == Ordering::Less {
        return Err(MigrationError::InvalidState(format!(
            "target version {target_version} is below base version {base_version}"
        )));
    }

    let migration_type = match compare_versions(SortDirection::Asc, current_version, target_version) {
        Ordering::Less => MigrationType::Do,
        Ordering::Greater => MigrationType::Undo,
        Ordering::Equal if request.out_of_order => MigrationType::Do,
        Ordering::Equal => return Ok(Vec::new()),
    };

    for endpoint in [current_version, target_version] {
        if endpoint != base_version && source.get(endpoint, migration_type)?.is_none() {
            return Err(MigrationError::not_found(endpoint, migration_type));
        }
    }

    match migration_type {
        MigrationType::Do => plan_forward(source, request),
        MigrationType::Undo => plan_backward(source, request),
    }
}

fn plan_forward(source: &dyn SourceEngine, request: &PlanRequest<'_>) -> Result<Vec<MigrationSource>> {
    let mut migrations = Vec::new();

    let start_version = if request.out_of_order {
        request.base_version
    } else {
        request.current_version
    };

    let mut next_version = source.next(start_version)?;

    // the base version has no catalog entry of its own
    if next_version.is_none() && start_version == request.base_version {
        next_version = source.first()?;
    }

    while let Some(version) = next_version {
        // past the target, including a target at the base version
        if compare_versions(SortDirection::Asc, &version, request.target_version) == Ordering::Greater {
            break;
        }

        let Some(migration) = get_migration(source, &version, MigrationType::Do)? else {
            missing_mid_range(request.missing_source, &version, MigrationType::Do)?;
            break;
        };

        let version = migration.version.clone();

        if request.out_of_order && request.applied_versions.contains(&version) {
            log::debug!("Skipping already applied migration {version}");
        } else {
            migrations.push(migration);
        }

        if version == request.target_version {
            break;
        }

        next_version = source.next(&version)?;
    }

    Ok(migrations)
}

fn plan_backward(source: &dyn SourceEngine, request: &PlanRequest<'_>) -> Result<Vec<MigrationSource>> {
    let mut migrations = Vec::new();

    let mut current_version = if request.current_version == request.base_version {
        None
    } else {
        Some(request.current_version.to_string())
    };

    while let Some(version) = current_version {
        let Some(migration) = get_migration(source, &version, MigrationType::Undo)? else {
            missing_mid_range(request.missing_source, &version, MigrationType::Undo)?;
            break;
        };

        if migration.version == request.target_version {
            break;
        }

        current_version = source.prev(&migration.version)?;

        if request.out_of_order && !request.applied_versions.contains(&migration.version) {
            log::debug!("Skipping never applied migration {}", migration.version);
        } else {
            migrations.push(migration);
        }
    }

    Ok(migrations)
}

fn missing_mid_range(policy: MissingSourcePolicy, version: &str, migration_type: MigrationType) -> Result<()> {
    match policy {
        MissingSourcePolicy::Truncate => {
            log::warn!("Missing migration source {version} ({migration_type}); plan stops here");
            Ok(())
        }
        MissingSourcePolicy::Strict => Err(MigrationError::not_found(version, migration_type)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::ErrorKind;
    use crate::test_helpers::MemorySource;

    /// Catalog with do + undo for every version
    fn catalog(versions: &[&str]) -> MemorySource {
        let source = MemorySource::new();
        for version in versions {
            source.add(version, MigrationType::Do, "step", &format!("do {version}"));
            source.add(version, MigrationType::Undo, "step", &format!("undo {version}"));
        }
        source
    }

    fn request<'a>(current: &'a str, target: &'a str, applied: &'a HashSet<String>) -> PlanRequest<'a> {
        PlanRequest {
            current_version: current,
            base_version: "0",
            target_version: target,
            applied_versions: applied,
            out_of_order: false,
            missing_source: MissingSourcePolicy::Truncate,
        }
    }

    fn steps(plan: &[MigrationSource]) -> Vec<String> {
        plan.iter().map(|m| format!("{}.{}", m.version, m.migration_type)).collect()
    }

    fn applied(versions: &[&str]) -> HashSet<String> {
        versions.iter().map(|v| (*v).to_string()).collect()
    }

    #[test]
    fn test_forward_plan_between_versions() {
        let source = catalog(&["01", "02", "03", "04"]);
        let applied = applied(&["0", "01", "02"]);

        let plan = plan_migrations(&source, &request("02", "04", &applied)).expect("plan");
        assert_eq!(steps(&plan), vec!["03.do", "04.do"]);
    }

    #[test]
    fn test_forward_plan_from_base_version() {
        let source = catalog(&["01", "02", "03"]);
        let applied = applied(&["0"]);

        let plan = plan_migrations(&source, &request("0", "02", &applied)).expect("plan");
        assert_eq!(steps(&plan), vec!["01.do", "02.do"]);
    }

    #[test]
    fn test_backward_plan_excludes_target() {
        let source = catalog(&["01", "02", "03", "04"]);
        let applied = applied(&["0", "01", "02", "03", "04"]);

        let plan = plan_migrations(&source, &request("04", "02", &applied)).expect("plan");
        assert_eq!(steps(&plan), vec!["04.undo", "03.undo"]);
    }

    #[test]
    fn test_backward_plan_to_base_version() {
        let source = catalog(&["01", "02"]);
        let applied = applied(&["0", "01", "02"]);

        let plan = plan_migrations(&source, &request("02", "0", &applied)).expect("plan");
        assert_eq!(steps(&plan), vec!["02.undo", "01.undo"]);
    }

    #[test]
    fn test_plan_is_symmetric() {
        let source = catalog(&["01", "02", "03", "04", "05"]);
        let applied = applied(&["0"]);

        let forward = plan_migrations(&source, &request("01", "05", &applied)).expect("plan");
        let backward = plan_migrations(&source, &request("05", "01", &applied)).expect("plan");

        let forward_versions: Vec<&str> = forward.iter().map(|m| m.version.as_str()).collect();
        let mut backward_versions: Vec<&str> = backward.iter().map(|m| m.version.as_str()).collect();
        backward_versions.reverse();

        assert_eq!(forward_versions, vec!["02", "03", "04", "05"]);
        assert_eq!(forward_versions, backward_versions);
    }

    #[test]
    fn test_same_version_without_out_of_order_is_empty() {
        let source = catalog(&["01", "02"]);
        let applied = applied(&["0", "01", "02"]);

        let plan = plan_migrations(&source, &request("02", "02", &applied)).expect("plan");
        assert!(plan.is_empty());
    }

    #[test]
    fn test_version_below_base_is_invalid_state() {
        let source = catalog(&["01"]);
        let applied = applied(&[]);
        let mut req = request("01", "02", &applied);
        req.base_version = "05";

        let err = plan_migrations(&source, &req).expect_err("current below base");
        assert_eq!(err.kind(), ErrorKind::InvalidState);

        let mut req = request("05", "01", &applied);
        req.base_version = "02";
        let err = plan_migrations(&source, &req).expect_err("target below base");
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[test]
    fn test_missing_endpoint_is_not_found() {
        let source = catalog(&["01", "02"]);
        let applied = applied(&["0"]);

        match plan_migrations(&source, &request("0", "07", &applied)) {
            Err(MigrationError::NotFound { version, migration_type }) => {
                assert_eq!(version, "07");
                assert_eq!(migration_type, MigrationType::Do);
            }
            other => panic!("Expected NotFound, got {other:?}"),
        }

        // current "02" has no undo definition
        source.remove("02", MigrationType::Undo);
        let err = plan_migrations(&source, &request("02", "01", &applied)).expect_err("missing undo");
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_missing_mid_range_truncates_by_default() {
        let source = catalog(&["01", "02", "03", "04", "05", "06", "07"]);
        source.remove("06", MigrationType::Do);
        let applied = applied(&["0", "01", "02"]);

        let plan = plan_migrations(&source, &request("02", "07", &applied)).expect("plan");
        assert_eq!(steps(&plan), vec!["03.do", "04.do", "05.do"]);
    }

    #[test]
    fn test_missing_mid_range_strict_policy_fails() {
        let source = catalog(&["01", "02", "03", "04", "05", "06", "07"]);
        source.remove("06", MigrationType::Do);
        let applied = applied(&["0", "01", "02"]);
        let mut req = request("02", "07", &applied);
        req.missing_source = MissingSourcePolicy::Strict;

        match plan_migrations(&source, &req) {
            Err(MigrationError::NotFound { version, .. }) => assert_eq!(version, "06"),
            other => panic!("Expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_mid_range_backward_truncates() {
        let source = catalog(&["01", "02", "03", "04"]);
        source.remove("03", MigrationType::Undo);
        let applied = applied(&["0", "01", "02", "03", "04"]);

        let plan = plan_migrations(&source, &request("04", "01", &applied)).expect("plan");
        assert_eq!(steps(&plan), vec!["04.undo"]);
    }

    #[test]
    fn test_out_of_order_catches_up_backfilled_versions() {
        // "02" was merged after "03" had been applied
        let source = catalog(&["01", "02", "03", "04"]);
        let applied = applied(&["0", "01", "03"]);
        let mut req = request("03", "04", &applied);
        req.out_of_order = true;

        let plan = plan_migrations(&source, &req).expect("plan");
        assert_eq!(steps(&plan), vec!["02.do", "04.do"]);
    }

    #[test]
    fn test_out_of_order_same_version_scans_from_base() {
        let source = catalog(&["01", "02", "03"]);
        let applied = applied(&["0", "01", "03"]);
        let mut req = request("03", "03", &applied);
        req.out_of_order = true;

        let plan = plan_migrations(&source, &req).expect("plan");
        assert_eq!(steps(&plan), vec!["02.do"]);
    }

    #[test]
    fn test_out_of_order_backward_skips_never_applied() {
        let source = catalog(&["01", "02", "03", "04"]);
        let applied = applied(&["0", "01", "02", "04"]);
        let mut req = request("04", "01", &applied);
        req.out_of_order = true;

        let plan = plan_migrations(&source, &req).expect("plan");
        assert_eq!(steps(&plan), vec!["04.undo", "02.undo"]);
    }

    #[test]
    fn test_out_of_order_at_base_version_is_empty() {
        let source = catalog(&["01", "02", "03"]);
        let applied = applied(&["0"]);
        let mut req = request("0", "0", &applied);
        req.out_of_order = true;

        let plan = plan_migrations(&source, &req).expect("plan");
        assert!(plan.is_empty());
    }

    #[test]
    fn test_out_of_order_scan_stops_at_target() {
        // "03" was applied then the database rolled back to "01"
        let source = catalog(&["01", "02", "03", "04"]);
        let applied = applied(&["0", "01"]);
        let mut req = request("01", "02", &applied);
        req.out_of_order = true;

        let plan = plan_migrations(&source, &req).expect("plan");
        assert_eq!(steps(&plan), vec!["02.do"]);
    }

    #[test]
    fn test_forward_plan_on_empty_catalog_to_base() {
        let source = MemorySource::new();
        let applied = applied(&["0"]);

        let plan = plan_migrations(&source, &request("0", "0", &applied)).expect("plan");
        assert!(plan.is_empty());
    }
}
