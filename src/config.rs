//! Migrator configuration
//!
//! [`MigratorConfig`] is loaded from `config/config.toml` (section
//! `[migrator]`) and environment variables prefixed with `WAYMARK`, e.g.
//! `WAYMARK__MIGRATOR__BASE_VERSION=000`.

use crate::migration::{FailurePolicy, MigrationInfoNotation, MissingSourcePolicy};
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

const CONFIG_FILE: &str = "config/config.toml";
const ENV_PREFIX: &str = "WAYMARK";

#[derive(Debug, Clone, Deserialize)]
pub struct MigratorConfig {
    /// URI handed to the database engine factory
    #[serde(default)]
    pub database_uri: String,
    /// URI handed to the source engine factory
    #[serde(default)]
    pub source_uri: String,
    /// Sentinel version below the first migration
    #[serde(default = "default_base_version")]
    pub base_version: String,
    /// History only includes records with an id at or above this value
    #[serde(default)]
    pub record_start_id: i64,
    /// Allow applying migrations with versions below the current version
    #[serde(default)]
    pub out_of_order: bool,
    #[serde(default)]
    pub missing_source: MissingSourcePolicy,
    #[serde(default = "default_validate_failures")]
    pub validate_failures: FailurePolicy,
    #[serde(default = "default_migrate_failures")]
    pub migrate_failures: FailurePolicy,
    #[serde(default)]
    pub notation: MigrationInfoNotation,
}

fn default_base_version() -> String {
    "0".to_string()
}

fn default_validate_failures() -> FailurePolicy {
    FailurePolicy::Continue
}

fn default_migrate_failures() -> FailurePolicy {
    FailurePolicy::Abort
}

impl Default for MigratorConfig {
    fn default() -> Self {
        Self {
            database_uri: String::new(),
            source_uri: String::new(),
            base_version: default_base_version(),
            record_start_id: 0,
            out_of_order: false,
            missing_source: MissingSourcePolicy::default(),
            validate_failures: default_validate_failures(),
            migrate_failures: default_migrate_failures(),
            notation: MigrationInfoNotation::default(),
        }
    }
}

impl MigratorConfig {
    /// Load the configuration from `config/config.toml`, falling back to env vars.
    pub fn load() -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

        let settings = match builder.build() {
            Ok(cfg) => cfg,
            Err(err) => {
                if Path::new(CONFIG_FILE).exists() {
                    log::warn!("Failed to load config file, falling back to env: {err}");
                }
                Config::builder()
                    .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
                    .build()
                    .map_err(|env_err| {
                        ConfigError::Message(format!(
                            "Failed to load configuration from file and env: {err}, then env-only error: {env_err}"
                        ))
                    })?
            }
        };

        Self::from_settings(&settings)
    }

    /// Load the configuration from an explicit file; env vars still override it
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        Self::from_settings(&settings)
    }

    fn from_settings(settings: &Config) -> Result<Self, ConfigError> {
        match settings.get::<MigratorConfig>("migrator") {
            Ok(config) => Ok(config),
            // no [migrator] section at all: every field has a default
            Err(ConfigError::NotFound(_)) => Ok(Self::default()),
            Err(e) => Err(ConfigError::Message(format!(
                "Migrator configuration could not be loaded from file or environment: {e}"
            ))),
        }
    }
}
