//! Content checksums for migration files and ledger drift detection.

use super::types::{Migration, MigrationError};
use crate::utils::compute_file_checksum;
use std::io::ErrorKind;
use std::path::Path;
use tracing::warn;

/// Checksum of the migration file `name` inside `dir`.
///
/// A file that cannot be found is reported as [`MigrationError::SourceFileMissing`].
pub fn checksum_for(dir: &Path, name: &str) -> Result<String, MigrationError> {
    compute_file_checksum(&dir.join(name)).map_err(|e| match e.kind() {
        ErrorKind::NotFound => MigrationError::SourceFileMissing(name.to_string()),
        _ => MigrationError::IoError(e),
    })
}

/// Check every applied migration against its source file in `dir`.
///
/// Fails on the first migration whose file is gone or whose content no
/// longer matches the recorded checksum. Returns the names verified.
pub fn verify_applied(dir: &Path, applied: &[Migration]) -> Result<Vec<String>, MigrationError> {
    let mut verified = Vec::with_capacity(applied.len());

    for migration in applied {
        let actual = checksum_for(dir, migration.name())?;
        let expected = migration.checksum().unwrap_or_default();

        if !actual.eq_ignore_ascii_case(expected) {
            warn!(
                migration = %migration.name(),
                expected = %expected,
                actual = %actual,
                "Applied migration was modified"
            );
            return Err(MigrationError::ChecksumMismatch {
                name: migration.name().to_string(),
                expected: expected.to_string(),
                actual,
            });
        }
        verified.push(migration.name().to_string());
    }

    Ok(verified)
}
