//! Procedural migration scripts.
//!
//! A procedural migration (`V..__name.py`) is a file in the migration
//! directory whose body is host-side code. A [`ScriptHost`] turns the file
//! into a [`LoadedScript`] exposing a single `migrate(connection)` entry
//! point, either blocking or async. Which one it is gets fixed at load time.
//!
//! Loading happens with the migration directory pushed onto the process-wide
//! [`ModuleSearchPath`] so scripts can resolve sibling modules. The push is
//! undone when the [`SearchPathGuard`] drops, whatever the load outcome.

use super::types::{MigrationError, ScriptError};
use crate::dbms::Connection;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use tracing::debug;

/// A blocking `migrate(connection)` entry point.
pub trait BlockingMigrate: Send + Sync {
    fn migrate(&self, connection: &mut dyn Connection) -> Result<(), ScriptError>;
}

impl<F> BlockingMigrate for F
where
    F: Fn(&mut dyn Connection) -> Result<(), ScriptError> + Send + Sync,
{
    fn migrate(&self, connection: &mut dyn Connection) -> Result<(), ScriptError> {
        self(connection)
    }
}

/// An async `migrate(connection)` entry point.
#[async_trait]
pub trait AsyncMigrate: Send + Sync {
    async fn migrate(&self, connection: &mut dyn Connection) -> Result<(), ScriptError>;
}

/// The entry point of a loaded procedural script.
#[derive(Clone)]
pub enum EntryPoint {
    Blocking(Arc<dyn BlockingMigrate>),
    Suspending(Arc<dyn AsyncMigrate>),
}

impl EntryPoint {
    pub fn is_suspending(&self) -> bool {
        matches!(self, EntryPoint::Suspending(_))
    }
}

impl fmt::Debug for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryPoint::Blocking(_) => f.write_str("EntryPoint::Blocking"),
            EntryPoint::Suspending(_) => f.write_str("EntryPoint::Suspending"),
        }
    }
}

/// A procedural migration ready to run.
#[derive(Debug, Clone)]
pub struct LoadedScript {
    pub name: String,
    pub entry: EntryPoint,
}

/// Resolves procedural migration files into runnable scripts.
pub trait ScriptHost: Send + Sync {
    /// Load the script at `path`. `search_path` lists the directories the
    /// script may resolve sibling modules from, most recent first.
    fn load(&self, path: &Path, search_path: &[PathBuf]) -> Result<LoadedScript, MigrationError>;
}

/// Script host backed by entry points compiled into the embedding program.
///
/// Entry points are registered under the migration's file name. The file
/// itself must still exist in the migration directory: it is what gets
/// discovered, ordered and checksummed.
#[derive(Default)]
pub struct ScriptRegistry {
    entries: HashMap<String, EntryPoint>,
}

impl ScriptRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Register an entry point for the file `name`, replacing any previous one.
    pub fn register(&mut self, name: impl Into<String>, entry: EntryPoint) {
        self.entries.insert(name.into(), entry);
    }

    /// Register a blocking closure for the file `name`.
    pub fn register_blocking<F>(&mut self, name: impl Into<String>, migrate: F)
    where
        F: Fn(&mut dyn Connection) -> Result<(), ScriptError> + Send + Sync + 'static,
    {
        self.register(name, EntryPoint::Blocking(Arc::new(migrate)));
    }

    /// Register an async entry point for the file `name`.
    pub fn register_async(&mut self, name: impl Into<String>, migrate: impl AsyncMigrate + 'static) {
        self.register(name, EntryPoint::Suspending(Arc::new(migrate)));
    }

    /// File names that have an entry point.
    pub fn registered(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.keys().cloned().collect();
        names.sort();
        names
    }
}

impl ScriptHost for ScriptRegistry {
    fn load(&self, path: &Path, _search_path: &[PathBuf]) -> Result<LoadedScript, MigrationError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        if !path.is_file() {
            return Err(MigrationError::execution(
                &name,
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("could not load procedural migration {}", path.display()),
                ),
            ));
        }

        let entry = self
            .entries
            .get(&name)
            .cloned()
            .ok_or_else(|| MigrationError::MissingEntryPoint(name.clone()))?;

        Ok(LoadedScript { name, entry })
    }
}

/// Directories procedural scripts resolve sibling modules from.
///
/// Treated as a stack: every push is paired with a pop through
/// [`SearchPathGuard`]. Each entry is tagged so a guard only ever removes
/// the entry it pushed.
#[derive(Debug, Default)]
pub struct ModuleSearchPath {
    entries: Mutex<Vec<(u64, PathBuf)>>,
    next_id: AtomicU64,
}

impl ModuleSearchPath {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(u64, PathBuf)>> {
        // The vector stays consistent even if a holder panicked.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Current search path, most recent first.
    pub fn entries(&self) -> Vec<PathBuf> {
        self.lock().iter().rev().map(|(_, p)| p.clone()).collect()
    }

    pub fn contains(&self, dir: &Path) -> bool {
        self.lock().iter().any(|(_, p)| p == dir)
    }

    /// Push `dir` until the returned guard drops.
    pub fn push(&self, dir: &Path) -> SearchPathGuard<'_> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock().push((id, dir.to_path_buf()));
        debug!(dir = %dir.display(), "Pushed module search path");
        SearchPathGuard { path: self, id }
    }

    fn pop(&self, id: u64) {
        let mut entries = self.lock();
        if let Some(pos) = entries.iter().rposition(|(entry_id, _)| *entry_id == id) {
            let (_, dir) = entries.remove(pos);
            debug!(dir = %dir.display(), "Popped module search path");
        }
    }
}

/// Removes its search path entry on drop.
#[must_use = "the search path entry is removed when the guard drops"]
pub struct SearchPathGuard<'a> {
    path: &'a ModuleSearchPath,
    id: u64,
}

impl Drop for SearchPathGuard<'_> {
    fn drop(&mut self) {
        self.path.pop(self.id);
    }
}

static SEARCH_PATH: OnceLock<ModuleSearchPath> = OnceLock::new();

/// The process-wide module search path.
pub fn search_path() -> &'static ModuleSearchPath {
    SEARCH_PATH.get_or_init(ModuleSearchPath::new)
}

/// Load a procedural script with `dir` on the search path for the duration
/// of the load.
pub fn load_script(
    host: &dyn ScriptHost,
    search: &ModuleSearchPath,
    dir: &Path,
    name: &str,
) -> Result<LoadedScript, MigrationError> {
    let _guard = search.push(dir);
    host.load(&dir.join(name), &search.entries())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopAsync;

    #[async_trait]
    impl AsyncMigrate for NoopAsync {
        async fn migrate(&self, _connection: &mut dyn Connection) -> Result<(), ScriptError> {
            Ok(())
        }
    }

    /// Host that records the search path it was given and then fails.
    struct FailingHost {
        seen: Mutex<Vec<PathBuf>>,
    }

    impl ScriptHost for FailingHost {
        fn load(&self, path: &Path, search_path: &[PathBuf]) -> Result<LoadedScript, MigrationError> {
            *self.seen.lock().unwrap() = search_path.to_vec();
            Err(MigrationError::MissingEntryPoint(
                path.file_name().unwrap().to_string_lossy().to_string(),
            ))
        }
    }

    #[test]
    fn test_guard_restores_prior_path() {
        let search = ModuleSearchPath::new();
        let _base = search.push(Path::new("/base"));
        let before = search.entries();

        {
            let _guard = search.push(Path::new("/migrations"));
            assert_eq!(
                search.entries(),
                vec![PathBuf::from("/migrations"), PathBuf::from("/base")]
            );
        }

        assert_eq!(search.entries(), before);
    }

    #[test]
    fn test_out_of_order_drops_remove_own_entries() {
        let search = ModuleSearchPath::new();
        let a = search.push(Path::new("/a"));
        let b = search.push(Path::new("/b"));

        drop(a);
        assert_eq!(search.entries(), vec![PathBuf::from("/b")]);
        drop(b);
        assert!(search.entries().is_empty());
    }

    #[test]
    fn test_load_script_pops_on_failure() {
        let temp_dir = tempfile::tempdir().unwrap();
        let search = ModuleSearchPath::new();
        let host = FailingHost {
            seen: Mutex::new(Vec::new()),
        };

        let result = load_script(&host, &search, temp_dir.path(), "V1__x.py");
        assert!(matches!(result, Err(MigrationError::MissingEntryPoint(_))));
        assert_eq!(*host.seen.lock().unwrap(), vec![temp_dir.path().to_path_buf()]);
        assert!(search.entries().is_empty());
    }

    #[test]
    fn test_registry_missing_entry_point_names_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        std::fs::write(temp_dir.path().join("V1__seed.py"), "").unwrap();

        let registry = ScriptRegistry::new();
        let err = registry
            .load(&temp_dir.path().join("V1__seed.py"), &[])
            .unwrap_err();
        assert!(matches!(err, MigrationError::MissingEntryPoint(ref n) if n == "V1__seed.py"));
    }

    #[test]
    fn test_registry_missing_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut registry = ScriptRegistry::new();
        registry.register_blocking("V1__seed.py", |_conn| Ok(()));

        let err = registry
            .load(&temp_dir.path().join("V1__seed.py"), &[])
            .unwrap_err();
        assert!(matches!(err, MigrationError::Execution { ref name, .. } if name == "V1__seed.py"));
    }

    #[test]
    fn test_registry_detects_entry_kind() {
        let temp_dir = tempfile::tempdir().unwrap();
        std::fs::write(temp_dir.path().join("V1__sync.py"), "").unwrap();
        std::fs::write(temp_dir.path().join("V2__async.py"), "").unwrap();

        let mut registry = ScriptRegistry::new();
        registry.register_blocking("V1__sync.py", |_conn| Ok(()));
        registry.register_async("V2__async.py", NoopAsync);
        assert_eq!(registry.registered(), vec!["V1__sync.py", "V2__async.py"]);

        let sync = registry.load(&temp_dir.path().join("V1__sync.py"), &[]).unwrap();
        let asynchronous = registry.load(&temp_dir.path().join("V2__async.py"), &[]).unwrap();
        assert!(!sync.entry.is_suspending());
        assert!(asynchronous.entry.is_suspending());
        assert_eq!(asynchronous.name, "V2__async.py");
    }
}
