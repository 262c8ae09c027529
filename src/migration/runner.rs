//! Execution of a single migration body.

use super::script::{AsyncMigrate, BlockingMigrate, EntryPoint, LoadedScript};
use super::types::{Migration, MigrationError, MigrationKind};
use crate::config::RunMode;
use crate::dbms::{Connection, Database};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// How the loop runs one migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Run to completion on the current thread.
    Inline,
    /// Await the script's async entry point on the scheduler.
    AwaitInline,
    /// Hand the blocking entry point to a worker thread and await it.
    Offload,
}

/// Decide how to run `migration` under `mode`.
///
/// `entry` is the loaded entry point of a procedural migration and must be
/// `Some` for those. Statement scripts always run inline. Procedural scripts
/// with an async entry point cannot run in blocking mode.
pub fn plan_dispatch(
    migration: &Migration,
    entry: Option<&EntryPoint>,
    mode: RunMode,
) -> Result<Dispatch, MigrationError> {
    if migration.kind() == MigrationKind::Statement {
        return Ok(Dispatch::Inline);
    }

    let entry = entry.ok_or_else(|| MigrationError::MissingEntryPoint(migration.name().to_string()))?;
    match (entry, mode) {
        (EntryPoint::Blocking(_), RunMode::Blocking) => Ok(Dispatch::Inline),
        (EntryPoint::Blocking(_), RunMode::Cooperative) => Ok(Dispatch::Offload),
        (EntryPoint::Suspending(_), RunMode::Blocking) => Err(
            MigrationError::AsyncEntryPointNotSupported(migration.name().to_string()),
        ),
        (EntryPoint::Suspending(_), RunMode::Cooperative) => Ok(Dispatch::AwaitInline),
    }
}

/// Submit a statement script verbatim.
pub fn apply_statements(
    database: &dyn Database,
    dir: &Path,
    migration: &Migration,
) -> Result<(), MigrationError> {
    let path = dir.join(migration.name());
    let statements = std::fs::read_to_string(&path)
        .map_err(|e| MigrationError::execution(migration.name(), e))?;

    database
        .execute(&statements)
        .map_err(|e| MigrationError::execution(migration.name(), e))
}

/// Run a procedural script's blocking entry point on the current thread.
pub fn apply_procedural(database: &dyn Database, script: &LoadedScript) -> Result<(), MigrationError> {
    let EntryPoint::Blocking(entry) = &script.entry else {
        return Err(MigrationError::AsyncEntryPointNotSupported(script.name.clone()));
    };

    let mut connection = database
        .connect()
        .map_err(|e| MigrationError::execution(&script.name, e))?;

    let result = entry
        .migrate(connection.as_mut())
        .and_then(|()| connection.commit().map_err(Into::into))
        .map_err(|e| MigrationError::execution(&script.name, e));

    finish(database, connection, &script.name, result)
}

/// Run a procedural script in cooperative mode.
///
/// Async entry points are awaited on the current scheduler; blocking ones
/// are offloaded to a worker thread so the scheduler stays responsive.
pub async fn apply_procedural_async(
    database: &dyn Database,
    script: &LoadedScript,
) -> Result<(), MigrationError> {
    match &script.entry {
        EntryPoint::Suspending(entry) => await_procedural(database, &script.name, entry.as_ref()).await,
        EntryPoint::Blocking(entry) => {
            offload_procedural(database, &script.name, Arc::clone(entry)).await
        }
    }
}

async fn await_procedural(
    database: &dyn Database,
    name: &str,
    entry: &dyn AsyncMigrate,
) -> Result<(), MigrationError> {
    let mut connection = database
        .connect()
        .map_err(|e| MigrationError::execution(name, e))?;

    let result = match entry.migrate(connection.as_mut()).await {
        Ok(()) => connection.commit().map_err(|e| MigrationError::execution(name, e)),
        Err(e) => Err(MigrationError::execution(name, e)),
    };

    finish(database, connection, name, result)
}

async fn offload_procedural(
    database: &dyn Database,
    name: &str,
    entry: Arc<dyn BlockingMigrate>,
) -> Result<(), MigrationError> {
    let connection = database
        .connect()
        .map_err(|e| MigrationError::execution(name, e))?;

    debug!(migration = %name, "Offloading blocking entry point to worker thread");
    let (connection, result) = tokio::task::spawn_blocking(move || {
        let mut connection = connection;
        let result = entry
            .migrate(connection.as_mut())
            .and_then(|()| connection.commit().map_err(Into::into));
        (connection, result)
    })
    .await
    .map_err(|e| MigrationError::execution(name, e))?;

    let result = result.map_err(|e| MigrationError::execution(name, e));
    finish(database, connection, name, result)
}

/// Close the connection if the database requires it, keeping the first error.
fn finish(
    database: &dyn Database,
    connection: Box<dyn Connection>,
    name: &str,
    result: Result<(), MigrationError>,
) -> Result<(), MigrationError> {
    if !database.should_close_connection() {
        return result;
    }

    match (result, connection.close()) {
        (Ok(()), Ok(())) => Ok(()),
        (Ok(()), Err(close_err)) => Err(MigrationError::execution(name, close_err)),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(close_err)) => {
            warn!(migration = %name, error = %close_err, "Failed to close connection after error");
            Err(e)
        }
    }
}
