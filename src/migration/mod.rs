//! Migration engine.
//!
//! This module discovers versioned migration files, works out which ones the
//! target database has not seen yet and applies those exactly once, in
//! version order.
//!
//! # Overview
//!
//! - File names follow `V<version>__<description>.<ext>` ([`name`])
//! - [`discover_local`] builds the sorted list of local migrations
//! - [`pending`] diffs it against the ledger by normalized version
//! - The [`Migrator`] applies pending migrations and appends a ledger row
//!   after each success
//! - `.sql` files are submitted verbatim; `.py` files are procedural scripts
//!   resolved through a [`ScriptHost`]
//! - There is no rollback: the first failure stops the run and everything
//!   recorded before it stays applied
//!
//! # Usage
//!
//! ```ignore
//! let database = open_database(&config)?;
//! let migrator = Migrator::new(&config, database, Arc::new(ScriptRegistry::new()));
//! let result = migrator.run()?;
//! ```

mod catalog;
mod checksum;
mod diff;
mod executor;
pub mod name;
mod runner;
mod script;
mod types;

pub use catalog::{discover_local, list_local_files, sort_migrations};
pub use checksum::{checksum_for, verify_applied};
pub use diff::pending;
pub use executor::Migrator;
pub use name::{expected_pattern, is_file_name_valid, migration_from_name, parse_file_name, ParsedName};
pub use runner::{
    apply_procedural, apply_procedural_async, apply_statements, plan_dispatch, Dispatch,
};
pub use script::{
    load_script, search_path, AsyncMigrate, BlockingMigrate, EntryPoint, LoadedScript,
    ModuleSearchPath, ScriptHost, ScriptRegistry, SearchPathGuard,
};
pub use types::{
    Migration, MigrationError, MigrationKind, MigrationResult, MigrationState, MigrationStatus,
    RunOutcome, RunPhase, ScriptError, ValidationResult,
};
