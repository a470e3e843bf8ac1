//! Migration filename parsing

use crate::migration::{MigrationError, MigrationInfo, MigrationType, Result};
use regex::Regex;
use serde::Deserialize;

/// Keywords and separator used in migration filenames
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MigrationInfoNotation {
    pub do_keyword: String,
    pub undo_keyword: String,
    pub separator: String,
}

impl Default for MigrationInfoNotation {
    fn default() -> Self {
        Self {
            do_keyword: "do".to_string(),
            undo_keyword: "undo".to_string(),
            separator: ".".to_string(),
        }
    }
}

/// Parses filenames shaped `{version}.{type}{separator}{title}.{extension}`
///
/// # Example
/// - `001.do.create users.sql` → version: `001`, type: do, title: `create users`
#[derive(Debug, Clone)]
pub struct MigrationInfoParser {
    pattern: Regex,
    notation: MigrationInfoNotation,
}

impl MigrationInfoParser {
    /// Build a parser for the given notation
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::InvalidState` if the notation yields an invalid pattern.
    pub fn new(notation: MigrationInfoNotation) -> Result<Self> {
        let pattern = format!(
            r"^([0-9]+)\.({}|{}){}([\S ]+)\.(\w+)$",
            regex::escape(&notation.do_keyword),
            regex::escape(&notation.undo_keyword),
            regex::escape(&notation.separator),
        );

        let pattern = Regex::new(&pattern)
            .map_err(|e| MigrationError::InvalidState(format!("Invalid filename notation: {e}")))?;

        Ok(Self { pattern, notation })
    }

    /// Parse a migration filename
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::InvalidFilename` if the name does not follow the notation.
    pub fn parse(&self, filename: &str) -> Result<MigrationInfo> {
        let invalid = || MigrationError::InvalidFilename {
            filename: filename.to_string(),
        };

        let caps = self.pattern.captures(filename).ok_or_else(invalid)?;

        let (Some(version), Some(keyword), Some(title)) = (caps.get(1), caps.get(2), caps.get(3)) else {
            return Err(invalid());
        };

        let migration_type = if keyword.as_str() == self.notation.do_keyword {
            MigrationType::Do
        } else {
            MigrationType::Undo
        };

        Ok(MigrationInfo::new(version.as_str(), migration_type, title.as_str(), filename))
    }
}
