#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use waystone::config::WaystoneConfig;
use waystone::dbms::SqliteDatabase;
use waystone::migration::{Migrator, ScriptRegistry};

/// A migration directory and SQLite database inside one temp dir
pub struct TestProject {
    pub temp_dir: TempDir,
    pub migration_dir: PathBuf,
    pub database_path: PathBuf,
}

/// Create a temporary project with an empty migration directory
pub fn create_test_project() -> TestProject {
    let temp_dir = tempfile::tempdir().expect("Should create temp dir");
    let migration_dir = temp_dir.path().join("migrations");
    std::fs::create_dir(&migration_dir).expect("Should create migration dir");
    let database_path = temp_dir.path().join("test.sqlite");

    TestProject {
        temp_dir,
        migration_dir,
        database_path,
    }
}

impl TestProject {
    pub fn write_migration(&self, name: &str, content: &str) {
        std::fs::write(self.migration_dir.join(name), content).expect("Should write migration");
    }

    pub fn remove_migration(&self, name: &str) {
        std::fs::remove_file(self.migration_dir.join(name)).expect("Should remove migration");
    }

    pub fn config(&self) -> WaystoneConfig {
        WaystoneConfig {
            migration_dir: self.migration_dir.clone(),
            database_name: Some(self.database_path.to_string_lossy().to_string()),
            ..Default::default()
        }
    }

    pub fn database(&self) -> Arc<SqliteDatabase> {
        Arc::new(SqliteDatabase::new(&self.database_path, "waystone"))
    }

    pub fn migrator(&self, registry: ScriptRegistry) -> Migrator {
        Migrator::new(&self.config(), self.database(), Arc::new(registry))
    }

    pub fn connection(&self) -> rusqlite::Connection {
        rusqlite::Connection::open(&self.database_path).expect("Should open database")
    }

    pub fn table_exists(&self, table: &str) -> bool {
        self.connection()
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [table],
                |row| row.get::<_, i64>(0),
            )
            .expect("Should query sqlite_master")
            > 0
    }

    pub fn ledger_count(&self) -> i64 {
        if !self.table_exists("waystone") {
            return 0;
        }
        self.connection()
            .query_row("SELECT COUNT(*) FROM waystone", [], |row| row.get(0))
            .expect("Should count ledger rows")
    }

    pub fn column_values(&self, sql: &str) -> Vec<String> {
        let conn = self.connection();
        let mut stmt = conn.prepare(sql).expect("Should prepare query");
        let values = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .expect("Should run query")
            .collect::<Result<Vec<_>, _>>()
            .expect("Should read rows");
        values
    }
}
