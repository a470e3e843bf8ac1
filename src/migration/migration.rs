//! Migration definitions as read from a source engine

use crate::migration::checksum::get_hash;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Direction of a migration step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationType {
    /// Forward step
    Do,
    /// Backward step
    Undo,
}

impl MigrationType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MigrationType::Do => "do",
            MigrationType::Undo => "undo",
        }
    }
}

impl fmt::Display for MigrationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MigrationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "do" => Ok(MigrationType::Do),
            "undo" => Ok(MigrationType::Undo),
            other => Err(format!("unknown migration type '{other}'")),
        }
    }
}

/// Catalog entry for a migration, available without reading its body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationInfo {
    pub version: String,
    #[serde(rename = "type")]
    pub migration_type: MigrationType,
    pub title: String,
    /// Filename or other identifier understood by the source engine
    pub filename: String,
}

impl MigrationInfo {
    #[must_use]
    pub fn new(
        version: impl Into<String>,
        migration_type: MigrationType,
        title: impl Into<String>,
        filename: impl Into<String>,
    ) -> Self {
        Self {
            version: version.into(),
            migration_type,
            title: title.into(),
            filename: filename.into(),
        }
    }
}

/// A migration definition with its body
///
/// The hash is computed once from the body when the value is built, so a
/// `MigrationSource` always carries the fingerprint of exactly the content it
/// holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationSource {
    pub version: String,
    #[serde(rename = "type")]
    pub migration_type: MigrationType,
    pub title: String,
    pub body: String,
    hash: String,
}

impl MigrationSource {
    #[must_use]
    pub fn new(info: &MigrationInfo, body: impl Into<String>) -> Self {
        let body = body.into();
        let hash = get_hash(&body);

        Self {
            version: info.version.clone(),
            migration_type: info.migration_type,
            title: info.title.clone(),
            body,
            hash,
        }
    }

    #[must_use]
    pub fn hash(&self) -> &str {
        &self.hash
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_type_round_trips_through_str() {
        assert_eq!("do".parse::<MigrationType>(), Ok(MigrationType::Do));
        assert_eq!("undo".parse::<MigrationType>(), Ok(MigrationType::Undo));
        assert!("redo".parse::<MigrationType>().is_err());
        assert_eq!(MigrationType::Undo.to_string(), "undo");
    }

    #[test]
    #[allow(clippy::unwrap_used)] // Test code - unwrap is acceptable
    fn test_migration_type_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&MigrationType::Do).unwrap(), "\"do\"");
        let parsed: MigrationType = serde_json::from_str("\"undo\"").unwrap();
        assert_eq!(parsed, MigrationType::Undo);
    }

    #[test]
    fn test_source_hash_computed_from_body() {
        let info = MigrationInfo::new("01", MigrationType::Do, "create users", "01.do.create users.sql");
        let source = MigrationSource::new(&info, "CREATE TABLE users (id INT);\r\n");

        assert_eq!(source.version, "01");
        assert_eq!(source.migration_type, MigrationType::Do);
        assert_eq!(source.title, "create users");
        assert_eq!(source.hash(), get_hash("CREATE TABLE users (id INT);"));
    }
}
