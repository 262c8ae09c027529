//! Types for the migration system.

use crate::dbms::{AppliedMigration, DbError};
use crate::version::{VersionError, VersionKey};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Error returned by procedural migration entry points.
pub type ScriptError = Box<dyn std::error::Error + Send + Sync>;

/// Error types for migration operations.
#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("Invalid migration file name {name:?}, expected {expected}")]
    InvalidName { name: String, expected: String },

    #[error("Malformed version: {0}")]
    MalformedVersion(#[from] VersionError),

    #[error("Migration directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    #[error("Source file {0} of an applied migration no longer exists")]
    SourceFileMissing(String),

    #[error("Applied migration {name} was modified: ledger checksum {expected}, file checksum {actual}")]
    ChecksumMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("Migrations were already applied but none were found in {}", .0.display())]
    MigrationsNotFound(PathBuf),

    #[error("Procedural migration {0} must define a migrate(connection) entry point")]
    MissingEntryPoint(String),

    #[error("Migration {0} has an async migrate() entry point; run in cooperative mode (--async)")]
    AsyncEntryPointNotSupported(String),

    #[error("Migration {name} failed: {source}")]
    Execution {
        name: String,
        #[source]
        source: ScriptError,
    },

    #[error("Ledger error: {0}")]
    Ledger(#[from] DbError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl MigrationError {
    pub(crate) fn execution(name: &str, source: impl Into<ScriptError>) -> Self {
        MigrationError::Execution {
            name: name.to_string(),
            source: source.into(),
        }
    }
}

/// The two kinds of migration body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MigrationKind {
    /// A batch of statements submitted verbatim (`.sql`).
    Statement,
    /// Host-side code invoked with a live connection (`.py`).
    Procedural,
}

impl MigrationKind {
    /// Map a file extension, case-insensitively.
    pub fn from_extension(ext: &str) -> Option<Self> {
        if ext.eq_ignore_ascii_case("sql") {
            Some(MigrationKind::Statement)
        } else if ext.eq_ignore_ascii_case("py") {
            Some(MigrationKind::Procedural)
        } else {
            None
        }
    }

    /// Extension as recorded in the ledger.
    pub fn ledger_extension(&self) -> &'static str {
        match self {
            MigrationKind::Statement => "SQL",
            MigrationKind::Procedural => "PY",
        }
    }
}

/// A discovered or recorded migration. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    version: VersionKey,
    name: String,
    description: String,
    kind: MigrationKind,
    checksum: Option<String>,
    apply_timestamp: Option<String>,
}

impl Migration {
    /// A local migration that has not been applied yet.
    pub fn new(version: VersionKey, name: String, description: String, kind: MigrationKind) -> Self {
        Self {
            version,
            name,
            description,
            kind,
            checksum: None,
            apply_timestamp: None,
        }
    }

    /// Rebuild a descriptor from a ledger row.
    ///
    /// Ledger rows are trusted for their version and extension; rows whose
    /// name no longer fits the file name grammar keep an empty description.
    pub fn from_applied(row: &AppliedMigration) -> Result<Self, MigrationError> {
        let version = VersionKey::parse(&row.version)?;
        let kind = MigrationKind::from_extension(&row.extension).unwrap_or(MigrationKind::Statement);
        let description = super::name::parse_file_name(&row.name)
            .map(|parsed| parsed.description)
            .unwrap_or_default();

        Ok(Self {
            version,
            name: row.name.clone(),
            description,
            kind,
            checksum: Some(row.checksum.clone()),
            apply_timestamp: Some(row.apply_timestamp.clone()),
        })
    }

    pub fn version(&self) -> &VersionKey {
        &self.version
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn kind(&self) -> MigrationKind {
        self.kind
    }

    pub fn checksum(&self) -> Option<&str> {
        self.checksum.as_deref()
    }

    pub fn apply_timestamp(&self) -> Option<&str> {
        self.apply_timestamp.as_deref()
    }

    /// The ledger row recording this migration as applied.
    pub fn to_applied(&self, checksum: String, apply_timestamp: String) -> AppliedMigration {
        AppliedMigration {
            version: self.version.to_string(),
            extension: self.kind.ledger_extension().to_string(),
            name: self.name.clone(),
            checksum,
            apply_timestamp,
        }
    }
}

/// Phase of a migration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Discovering,
    Diffing,
    Executing(usize),
    Recording(usize),
    Done,
    Failed,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunPhase::Idle => write!(f, "idle"),
            RunPhase::Discovering => write!(f, "discovering"),
            RunPhase::Diffing => write!(f, "diffing"),
            RunPhase::Executing(i) => write!(f, "executing({})", i),
            RunPhase::Recording(i) => write!(f, "recording({})", i),
            RunPhase::Done => write!(f, "done"),
            RunPhase::Failed => write!(f, "failed"),
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// No pending migrations.
    NothingToDo,
    /// The given number of migrations were applied.
    Applied(usize),
}

/// Result of a migration run.
#[derive(Debug, Clone)]
pub struct MigrationResult {
    pub outcome: RunOutcome,
    /// File names of the migrations applied, in order.
    pub migrations_applied: Vec<String>,
    /// Human-readable progress lines.
    pub output: Vec<String>,
}

impl MigrationResult {
    pub(crate) fn nothing_to_do() -> Self {
        Self {
            outcome: RunOutcome::NothingToDo,
            migrations_applied: Vec::new(),
            output: vec!["Nothing to do".to_string()],
        }
    }
}

impl fmt::Display for MigrationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.output {
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

/// Result of checking applied migrations against their source files.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    /// File names whose checksum matched the ledger.
    pub verified: Vec<String>,
}

/// Status of one version across the local directory and the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationState {
    Applied { apply_timestamp: String },
    Pending,
    /// Recorded in the ledger but no longer present locally.
    Missing,
}

impl fmt::Display for MigrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationState::Applied { apply_timestamp } => write!(f, "applied {}", apply_timestamp),
            MigrationState::Pending => write!(f, "pending"),
            MigrationState::Missing => write!(f, "missing"),
        }
    }
}

/// One row of an `info` listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    pub version: VersionKey,
    pub name: String,
    pub state: MigrationState,
}
