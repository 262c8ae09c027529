//! Database port consumed by the migration engine.
//!
//! The engine never talks to a database engine directly. It goes through
//! [`Database`] for the ledger and statement scripts, and hands a
//! [`Connection`] to procedural scripts.

mod sqlite;

pub use sqlite::{SqliteConnection, SqliteDatabase};

use crate::config::{DatabaseType, WaystoneConfig};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Connection already closed")]
    Closed,

    #[error("Database error: {0}")]
    Engine(String),
}

/// One row of the applied-migrations ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedMigration {
    /// Canonical dotted version.
    pub version: String,
    /// File extension in upper case (`SQL`, `PY`).
    pub extension: String,
    pub name: String,
    pub checksum: String,
    pub apply_timestamp: String,
}

/// A live connection handed to procedural scripts.
pub trait Connection: Send {
    /// Run one or more statements.
    fn execute_batch(&mut self, sql: &str) -> Result<(), DbError>;

    /// Commit the work done on this connection so far.
    fn commit(&mut self) -> Result<(), DbError>;

    /// Close the connection, releasing engine resources.
    fn close(self: Box<Self>) -> Result<(), DbError>;

    /// Access the engine-native connection for downcasting.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Connection lifecycle and ledger access for one target database.
pub trait Database: Send + Sync {
    /// Open a new connection with an open transaction.
    fn connect(&self) -> Result<Box<dyn Connection>, DbError>;

    /// Submit raw statements verbatim, committing on success.
    fn execute(&self, statements: &str) -> Result<(), DbError>;

    /// All ledger rows, in installation order.
    fn applied_migrations(&self) -> Result<Vec<AppliedMigration>, DbError>;

    /// Append a row to the ledger.
    fn record_applied(&self, migration: &AppliedMigration) -> Result<(), DbError>;

    /// Whether connections returned by [`Database::connect`] must be closed
    /// explicitly after use.
    fn should_close_connection(&self) -> bool;
}

/// Build the database adapter selected by the configuration.
pub fn open_database(config: &WaystoneConfig) -> Result<Arc<dyn Database>, DbError> {
    match config.database_type {
        DatabaseType::Sqlite => {
            let name = config
                .database_name
                .as_deref()
                .ok_or_else(|| DbError::Engine("database name is not configured".to_string()))?;
            Ok(Arc::new(SqliteDatabase::new(name, &config.database_table)))
        }
    }
}
