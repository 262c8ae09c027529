//! Migration executor driving a full run.

use super::catalog::{discover_local, sort_migrations};
use super::checksum::{checksum_for, verify_applied};
use super::diff::pending;
use super::runner::{
    apply_procedural, apply_procedural_async, apply_statements, plan_dispatch, Dispatch,
};
use super::script::{load_script, search_path, LoadedScript, ScriptHost};
use super::types::{
    Migration, MigrationError, MigrationKind, MigrationResult, MigrationState, MigrationStatus,
    RunOutcome, RunPhase, ValidationResult,
};
use crate::config::{RunMode, WaystoneConfig};
use crate::dbms::Database;
use crate::utils::now_iso;
use crate::version::VersionKey;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info};

/// One pending migration with everything needed to run it.
struct PlannedMigration {
    migration: Migration,
    dispatch: Dispatch,
    script: Option<LoadedScript>,
}

/// Tracks the phase of a run and logs every transition.
struct RunState {
    phase: RunPhase,
}

impl RunState {
    fn new() -> Self {
        Self {
            phase: RunPhase::Idle,
        }
    }

    fn advance(&mut self, next: RunPhase) {
        debug!(from = %self.phase, to = %next, "Run phase transition");
        self.phase = next;
    }

    fn fail(&mut self, err: MigrationError) -> MigrationError {
        error!(phase = %self.phase, error = %err, "Migration run failed");
        self.phase = RunPhase::Failed;
        err
    }
}

/// Executor for running migrations.
///
/// The executor discovers migrations in the configured directory, diffs
/// them against the database ledger and applies the pending ones in version
/// order, recording each in the ledger as soon as it succeeds. The first
/// failure stops the run; migrations recorded before it stay applied.
pub struct Migrator {
    database: Arc<dyn Database>,
    host: Arc<dyn ScriptHost>,
    migration_dir: PathBuf,
    validate_checksums: bool,
}

impl Migrator {
    /// Create a new executor for the given database and script host.
    pub fn new(config: &WaystoneConfig, database: Arc<dyn Database>, host: Arc<dyn ScriptHost>) -> Self {
        Self {
            database,
            host,
            migration_dir: config.migration_dir.clone(),
            validate_checksums: config.validate_checksums,
        }
    }

    pub fn migration_dir(&self) -> &Path {
        &self.migration_dir
    }

    /// Apply pending migrations with every script blocking the calling thread.
    ///
    /// A procedural migration with an async entry point fails the run with
    /// [`MigrationError::AsyncEntryPointNotSupported`] before anything executes.
    pub fn run(&self) -> Result<MigrationResult, MigrationError> {
        let mut state = RunState::new();
        let plan = self.prepare(RunMode::Blocking, &mut state)?;
        if plan.is_empty() {
            return Ok(self.nothing_to_do(&mut state));
        }

        let mut result = self.start_result(plan.len());
        for (i, step) in plan.iter().enumerate() {
            state.advance(RunPhase::Executing(i));
            self.announce(step, &mut result);

            let applied = match &step.script {
                Some(script) => apply_procedural(self.database.as_ref(), script),
                None => apply_statements(self.database.as_ref(), &self.migration_dir, &step.migration),
            };
            applied.map_err(|e| state.fail(e))?;

            state.advance(RunPhase::Recording(i));
            self.record(&step.migration, &mut result)
                .map_err(|e| state.fail(e))?;
        }

        Ok(self.finish(&mut state, result))
    }

    /// Apply pending migrations on the current async scheduler.
    ///
    /// Statement scripts run inline, async entry points are awaited inline,
    /// and blocking entry points are moved to a worker thread.
    pub async fn run_async(&self) -> Result<MigrationResult, MigrationError> {
        let mut state = RunState::new();
        let plan = self.prepare(RunMode::Cooperative, &mut state)?;
        if plan.is_empty() {
            return Ok(self.nothing_to_do(&mut state));
        }

        let mut result = self.start_result(plan.len());
        for (i, step) in plan.iter().enumerate() {
            state.advance(RunPhase::Executing(i));
            self.announce(step, &mut result);

            let applied = match (&step.script, step.dispatch) {
                (Some(script), Dispatch::AwaitInline | Dispatch::Offload) => {
                    apply_procedural_async(self.database.as_ref(), script).await
                }
                (Some(script), Dispatch::Inline) => apply_procedural(self.database.as_ref(), script),
                (None, _) => {
                    apply_statements(self.database.as_ref(), &self.migration_dir, &step.migration)
                }
            };
            applied.map_err(|e| state.fail(e))?;

            state.advance(RunPhase::Recording(i));
            self.record(&step.migration, &mut result)
                .map_err(|e| state.fail(e))?;
        }

        Ok(self.finish(&mut state, result))
    }

    /// Check every applied migration's source file against the ledger.
    pub fn validate(&self) -> Result<ValidationResult, MigrationError> {
        let local = discover_local(&self.migration_dir)?;
        let applied = self.applied()?;

        if !applied.is_empty() && local.is_empty() {
            return Err(MigrationError::MigrationsNotFound(self.migration_dir.clone()));
        }

        let verified = verify_applied(&self.migration_dir, &applied)?;
        info!(count = verified.len(), "Applied migrations match their source files");
        Ok(ValidationResult { verified })
    }

    /// Status of every version known locally or in the ledger.
    pub fn info(&self) -> Result<Vec<MigrationStatus>, MigrationError> {
        let local = discover_local(&self.migration_dir)?;
        let applied = self.applied()?;

        let mut statuses: BTreeMap<VersionKey, MigrationStatus> = BTreeMap::new();
        for migration in &local {
            statuses.entry(migration.version().clone()).or_insert_with(|| MigrationStatus {
                version: migration.version().clone(),
                name: migration.name().to_string(),
                state: MigrationState::Pending,
            });
        }
        for migration in &applied {
            let apply_timestamp = migration.apply_timestamp().unwrap_or_default().to_string();
            statuses
                .entry(migration.version().clone())
                .and_modify(|status| {
                    status.state = MigrationState::Applied {
                        apply_timestamp: apply_timestamp.clone(),
                    }
                })
                .or_insert_with(|| MigrationStatus {
                    version: migration.version().clone(),
                    name: migration.name().to_string(),
                    state: MigrationState::Missing,
                });
        }

        Ok(statuses.into_values().collect())
    }

    /// Discover, diff, verify and load everything the run needs.
    ///
    /// Nothing executes until this succeeds, so any error here leaves the
    /// database untouched.
    fn prepare(
        &self,
        mode: RunMode,
        state: &mut RunState,
    ) -> Result<Vec<PlannedMigration>, MigrationError> {
        info!(dir = %self.migration_dir.display(), mode = ?mode, "Starting migration");

        state.advance(RunPhase::Discovering);
        let local = discover_local(&self.migration_dir).map_err(|e| state.fail(e))?;
        let applied = self.applied().map_err(|e| state.fail(e))?;

        state.advance(RunPhase::Diffing);
        let to_apply = pending(&local, &applied, &self.migration_dir).map_err(|e| state.fail(e))?;
        if self.validate_checksums {
            verify_applied(&self.migration_dir, &applied).map_err(|e| state.fail(e))?;
        }

        to_apply
            .into_iter()
            .map(|migration| {
                let script = match migration.kind() {
                    MigrationKind::Procedural => Some(load_script(
                        self.host.as_ref(),
                        search_path(),
                        &self.migration_dir,
                        migration.name(),
                    )?),
                    MigrationKind::Statement => None,
                };
                let dispatch = plan_dispatch(&migration, script.as_ref().map(|s| &s.entry), mode)?;
                Ok(PlannedMigration {
                    migration,
                    dispatch,
                    script,
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| state.fail(e))
    }

    fn applied(&self) -> Result<Vec<Migration>, MigrationError> {
        let mut applied = self
            .database
            .applied_migrations()?
            .iter()
            .map(Migration::from_applied)
            .collect::<Result<Vec<_>, _>>()?;
        sort_migrations(&mut applied);
        Ok(applied)
    }

    fn record(&self, migration: &Migration, result: &mut MigrationResult) -> Result<(), MigrationError> {
        let checksum = checksum_for(&self.migration_dir, migration.name())?;
        self.database
            .record_applied(&migration.to_applied(checksum, now_iso()))?;

        info!(migration = %migration.name(), version = %migration.version(), "Migration applied");
        result.migrations_applied.push(migration.name().to_string());
        result.output.push(format!("{} SUCCESS", migration.name()));
        Ok(())
    }

    fn announce(&self, step: &PlannedMigration, result: &mut MigrationResult) {
        info!(migration = %step.migration.name(), dispatch = ?step.dispatch, "Applying migration");
        result
            .output
            .push(format!("Migrating --> {}", step.migration.name()));
    }

    fn start_result(&self, count: usize) -> MigrationResult {
        MigrationResult {
            outcome: RunOutcome::Applied(0),
            migrations_applied: Vec::with_capacity(count),
            output: Vec::with_capacity(count * 2),
        }
    }

    fn nothing_to_do(&self, state: &mut RunState) -> MigrationResult {
        state.advance(RunPhase::Done);
        info!("No migrations needed, database is up to date");
        MigrationResult::nothing_to_do()
    }

    fn finish(&self, state: &mut RunState, mut result: MigrationResult) -> MigrationResult {
        state.advance(RunPhase::Done);
        result.outcome = RunOutcome::Applied(result.migrations_applied.len());
        info!(
            count = result.migrations_applied.len(),
            "Migration completed successfully"
        );
        result
    }
}
