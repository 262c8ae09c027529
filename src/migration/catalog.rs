//! Discovery of migration files on disk.

use super::name::{expected_pattern, migration_from_name};
use super::types::{Migration, MigrationError};
use std::path::Path;
use walkdir::WalkDir;

/// List the candidate file names directly inside `dir`.
///
/// Hidden entries and anything that is not a regular file (after following
/// symlinks) are skipped.
pub fn list_local_files(dir: &Path) -> Result<Vec<String>, MigrationError> {
    if !dir.is_dir() {
        return Err(MigrationError::DirectoryNotFound(dir.to_path_buf()));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|_| MigrationError::DirectoryNotFound(dir.to_path_buf()))?;

        let lossy = entry.file_name().to_string_lossy();
        if lossy.starts_with('.') || !entry.path().is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else {
            return Err(MigrationError::InvalidName {
                name: lossy.into_owned(),
                expected: expected_pattern(),
            });
        };
        files.push(name.to_string());
    }

    Ok(files)
}

/// Discover every migration in `dir`, sorted by version.
///
/// A single file that does not follow the naming grammar aborts discovery.
pub fn discover_local(dir: &Path) -> Result<Vec<Migration>, MigrationError> {
    let mut migrations = list_local_files(dir)?
        .iter()
        .map(|name| migration_from_name(name))
        .collect::<Result<Vec<_>, _>>()?;

    sort_migrations(&mut migrations);
    Ok(migrations)
}

/// Sort ascending by version, then description and name as tie-breaks.
pub fn sort_migrations(migrations: &mut [Migration]) {
    migrations.sort_by(|a, b| {
        a.version()
            .cmp(b.version())
            .then_with(|| a.description().cmp(b.description()))
            .then_with(|| a.name().cmp(b.name()))
    });
}
