use super::{AppliedMigration, Connection, Database, DbError};
use rusqlite::params;
use std::any::Any;
use std::path::{Path, PathBuf};

/// SQLite adapter backed by a database file.
///
/// Every operation opens its own connection; the file is the shared state.
pub struct SqliteDatabase {
    path: PathBuf,
    table: String,
}

impl SqliteDatabase {
    /// `table` is quoted as an identifier, so any name is safe to use.
    pub fn new(path: impl AsRef<Path>, table: &str) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            table: quote_identifier(table),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> Result<rusqlite::Connection, DbError> {
        Ok(rusqlite::Connection::open(&self.path)?)
    }

    fn ensure_ledger(&self, conn: &rusqlite::Connection) -> Result<(), DbError> {
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {} (
                installed_rank INTEGER PRIMARY KEY AUTOINCREMENT,
                version TEXT NOT NULL,
                extension TEXT NOT NULL,
                name TEXT NOT NULL,
                checksum TEXT NOT NULL,
                apply_timestamp TEXT NOT NULL
            )",
            self.table
        ))?;
        Ok(())
    }
}

impl Database for SqliteDatabase {
    fn connect(&self) -> Result<Box<dyn Connection>, DbError> {
        let conn = self.open()?;
        conn.execute_batch("BEGIN")?;
        Ok(Box::new(SqliteConnection { conn: Some(conn) }))
    }

    /// Runs the whole script in one transaction; a failing statement rolls
    /// back the ones before it.
    fn execute(&self, statements: &str) -> Result<(), DbError> {
        let mut conn = self.open()?;
        let tx = conn.transaction()?;
        tx.execute_batch(statements)?;
        tx.commit()?;
        Ok(())
    }

    fn applied_migrations(&self) -> Result<Vec<AppliedMigration>, DbError> {
        let conn = self.open()?;
        self.ensure_ledger(&conn)?;

        let mut stmt = conn.prepare(&format!(
            "SELECT version, extension, name, checksum, apply_timestamp
             FROM {} ORDER BY installed_rank",
            self.table
        ))?;
        let rows = stmt
            .query_map([], |row| {
                Ok(AppliedMigration {
                    version: row.get(0)?,
                    extension: row.get(1)?,
                    name: row.get(2)?,
                    checksum: row.get(3)?,
                    apply_timestamp: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn record_applied(&self, migration: &AppliedMigration) -> Result<(), DbError> {
        let conn = self.open()?;
        self.ensure_ledger(&conn)?;

        conn.execute(
            &format!(
                "INSERT INTO {} (version, extension, name, checksum, apply_timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                self.table
            ),
            params![
                migration.version,
                migration.extension,
                migration.name,
                migration.checksum,
                migration.apply_timestamp,
            ],
        )?;
        Ok(())
    }

    fn should_close_connection(&self) -> bool {
        true
    }
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// A SQLite connection with an open transaction.
pub struct SqliteConnection {
    conn: Option<rusqlite::Connection>,
}

impl SqliteConnection {
    /// The underlying rusqlite connection, for scripts that need queries or
    /// bound parameters.
    pub fn inner(&mut self) -> Result<&mut rusqlite::Connection, DbError> {
        self.conn.as_mut().ok_or(DbError::Closed)
    }
}

impl Connection for SqliteConnection {
    fn execute_batch(&mut self, sql: &str) -> Result<(), DbError> {
        self.inner()?.execute_batch(sql)?;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), DbError> {
        let conn = self.inner()?;
        if !conn.is_autocommit() {
            conn.execute_batch("COMMIT")?;
        }
        Ok(())
    }

    fn close(mut self: Box<Self>) -> Result<(), DbError> {
        match self.conn.take() {
            // Anything not committed is rolled back by SQLite on close.
            Some(conn) => conn.close().map_err(|(_, e)| DbError::Sqlite(e)),
            None => Ok(()),
        }
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
