use crate::utils::{DEFAULT_LEDGER_TABLE, DEFAULT_MIGRATION_DIR};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Missing configuration options: {0}")]
    MissingOptions(String),

    #[error("Invalid ledger table name {0:?}: expected a plain SQL identifier")]
    InvalidTableName(String),
}

static TABLE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("table name pattern is valid"));

/// Supported database engines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    #[default]
    Sqlite,
}

/// How the migration loop schedules procedural scripts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Every script runs to completion on the calling thread.
    #[default]
    Blocking,
    /// The loop runs on a single-threaded async scheduler.
    Cooperative,
}

fn default_migration_dir() -> PathBuf {
    PathBuf::from(DEFAULT_MIGRATION_DIR)
}

fn default_table() -> String {
    DEFAULT_LEDGER_TABLE.to_string()
}

fn default_true() -> bool {
    true
}

/// Waystone configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaystoneConfig {
    /// Directory holding `V<version>__<description>.<ext>` files.
    #[serde(default = "default_migration_dir")]
    pub migration_dir: PathBuf,
    #[serde(default)]
    pub database_type: DatabaseType,
    /// For SQLite, the path of the database file.
    #[serde(default)]
    pub database_name: Option<String>,
    /// Ledger table name.
    #[serde(default = "default_table")]
    pub database_table: String,
    #[serde(default)]
    pub run_mode: RunMode,
    /// Refuse to run when an applied migration's source changed or vanished.
    #[serde(default = "default_true")]
    pub validate_checksums: bool,
}

impl Default for WaystoneConfig {
    fn default() -> Self {
        Self {
            migration_dir: default_migration_dir(),
            database_type: DatabaseType::default(),
            database_name: None,
            database_table: default_table(),
            run_mode: RunMode::default(),
            validate_checksums: true,
        }
    }
}

/// Values supplied on the command line or through the environment.
///
/// Any `Some` field wins over the config file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub migration_dir: Option<PathBuf>,
    pub database_type: Option<DatabaseType>,
    pub database_name: Option<String>,
    pub database_table: Option<String>,
    pub run_mode: Option<RunMode>,
    pub validate_checksums: Option<bool>,
}

impl WaystoneConfig {
    /// Apply overrides on top of this configuration.
    pub fn merge(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(dir) = overrides.migration_dir {
            self.migration_dir = dir;
        }
        if let Some(db_type) = overrides.database_type {
            self.database_type = db_type;
        }
        if let Some(name) = overrides.database_name {
            self.database_name = Some(name);
        }
        if let Some(table) = overrides.database_table {
            self.database_table = table;
        }
        if let Some(mode) = overrides.run_mode {
            self.run_mode = mode;
        }
        if let Some(validate) = overrides.validate_checksums {
            self.validate_checksums = validate;
        }
        self
    }

    /// Check that everything the engine needs is present and well-formed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut missing = Vec::new();
        if self.database_name.as_deref().map_or(true, str::is_empty) {
            missing.push("database_name");
        }
        if self.migration_dir.as_os_str().is_empty() {
            missing.push("migration_dir");
        }
        if !missing.is_empty() {
            return Err(ConfigError::MissingOptions(missing.join(", ")));
        }

        if !TABLE_NAME.is_match(&self.database_table) {
            return Err(ConfigError::InvalidTableName(self.database_table.clone()));
        }
        Ok(())
    }
}

/// Read the configuration file, if it exists
pub fn read_config(path: &Path) -> Result<Option<WaystoneConfig>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(path)?;
    let config: WaystoneConfig = serde_json::from_str(&content)?;
    Ok(Some(config))
}

/// Build the effective configuration: defaults, then the file, then overrides
pub fn load_config(path: &Path, overrides: ConfigOverrides) -> Result<WaystoneConfig, ConfigError> {
    let config = read_config(path)?.unwrap_or_default().merge(overrides);
    config.validate()?;
    Ok(config)
}
