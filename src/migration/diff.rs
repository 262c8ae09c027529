//! Pending-set computation.

use super::catalog::sort_migrations;
use super::types::{Migration, MigrationError};
use crate::version::VersionKey;
use std::collections::HashSet;
use std::path::Path;

/// Local migrations whose version is absent from the ledger, ascending.
///
/// Migrations are matched by normalized version only. A non-empty ledger
/// with no local migrations means `migration_dir` points at the wrong place
/// and fails with [`MigrationError::MigrationsNotFound`].
pub fn pending(
    local: &[Migration],
    applied: &[Migration],
    migration_dir: &Path,
) -> Result<Vec<Migration>, MigrationError> {
    if !applied.is_empty() && local.is_empty() {
        return Err(MigrationError::MigrationsNotFound(migration_dir.to_path_buf()));
    }

    let applied_versions: HashSet<&VersionKey> = applied.iter().map(|m| m.version()).collect();

    let mut result: Vec<Migration> = local
        .iter()
        .filter(|m| !applied_versions.contains(m.version()))
        .cloned()
        .collect();

    sort_migrations(&mut result);
    Ok(result)
}
