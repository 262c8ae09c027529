pub mod config;
pub mod dbms;
pub mod migration;
pub mod utils;
pub mod version;

// Re-export commonly used types
pub use config::{load_config, ConfigError, ConfigOverrides, DatabaseType, RunMode, WaystoneConfig};
pub use dbms::{open_database, AppliedMigration, Connection, Database, DbError, SqliteDatabase};
pub use migration::{
    discover_local, pending, AsyncMigrate, BlockingMigrate, EntryPoint, Migration, MigrationError,
    MigrationKind, MigrationResult, MigrationState, MigrationStatus, Migrator, RunOutcome,
    ScriptError, ScriptHost, ScriptRegistry, ValidationResult,
};
pub use version::{compare_versions, format_version, parse_version, VersionError, VersionKey};
