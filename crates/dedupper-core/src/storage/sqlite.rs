use crate::config::PHashConfig;
use crate::error::Result;
use crate::model::ClassifyType;
use rusqlite::Connection;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One connection to the store file of a single classification type.
pub struct Database {
    conn: Connection,
    file_type: ClassifyType,
    pub(crate) search: PHashConfig,
    pub(crate) dry_run: bool,
}

pub fn database_path(db_base_path: &Path, file_type: ClassifyType) -> PathBuf {
    db_base_path.join(format!("{}.sqlite3", file_type.as_str()))
}

impl Database {
    pub fn open(
        db_base_path: &Path,
        file_type: ClassifyType,
        search: PHashConfig,
        dry_run: bool,
    ) -> Result<Self> {
        fs::create_dir_all(db_base_path)?;
        let conn = Connection::open(database_path(db_base_path, file_type))?;
        let db = Database {
            conn,
            file_type,
            search,
            dry_run,
        };
        db.configure_pragmas()?;
        db.create_schema()?;
        Ok(db)
    }

    pub fn open_in_memory(file_type: ClassifyType, search: PHashConfig) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database {
            conn,
            file_type,
            search,
            dry_run: false,
        };
        db.configure_pragmas()?;
        db.create_schema()?;
        Ok(db)
    }

    fn configure_pragmas(&self) -> Result<()> {
        self.conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )?;
        Ok(())
    }

    /// Idempotent; runs on every connection.
    fn create_schema(&self) -> Result<()> {
        let table = self.table();
        self.conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                 hash TEXT PRIMARY KEY,
                 p_hash TEXT,
                 d_hash TEXT,
                 width INTEGER NOT NULL DEFAULT 0,
                 height INTEGER NOT NULL DEFAULT 0,
                 ratio REAL NOT NULL DEFAULT 0,
                 timestamp INTEGER NOT NULL DEFAULT 0,
                 name TEXT NOT NULL,
                 to_path TEXT NOT NULL,
                 from_path TEXT NOT NULL,
                 size INTEGER NOT NULL DEFAULT 0,
                 state INTEGER NOT NULL
             );
             CREATE INDEX IF NOT EXISTS {table}_p_hash ON {table} (p_hash);
             CREATE INDEX IF NOT EXISTS {table}_ratio ON {table} (ratio);
             CREATE INDEX IF NOT EXISTS {table}_name ON {table} (name);"
        ))?;
        debug!("SQLite schema ready for table {}", table);
        Ok(())
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn file_type(&self) -> ClassifyType {
        self.file_type
    }

    pub(crate) fn table(&self) -> &'static str {
        self.file_type.as_str()
    }

    pub fn truncate(&self) -> Result<()> {
        self.conn
            .execute_batch(&format!("DELETE FROM {};", self.table()))?;
        debug!("Table {} truncated", self.table());
        Ok(())
    }
}
