//! Database module for SQLite operations
//!
//! This module handles all database interactions including:
//! - Schema creation and default settings
//! - User, session, detection, irrigation and price queries
//! - Dashboard and admin aggregates

pub mod schema;
pub mod queries;

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rusqlite::Connection;
use thiserror::Error;

/// Database errors
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Lock poisoned")]
    LockPoisoned,
}

/// Database connection wrapper
pub struct Database {
    conn: Mutex<Connection>,
    path: PathBuf,
}

impl Database {
    /// Create a new database connection
    pub fn new(path: PathBuf) -> Result<Self, DbError> {
        let conn = Connection::open(&path)?;
        Self::from_connection(conn, path)
    }

    /// Create a private in-memory database
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn, PathBuf::from(":memory:"))
    }

    fn from_connection(conn: Connection, path: PathBuf) -> Result<Self, DbError> {
        // Enable foreign keys
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    /// Initialize the database schema and default settings
    pub fn initialize(&self) -> Result<(), DbError> {
        let conn = self.conn.lock().map_err(|_| DbError::LockPoisoned)?;
        schema::create_tables(&conn)?;
        let inserted = schema::insert_default_settings(&conn)?;
        if inserted > 0 {
            tracing::info!("Inserted {} default system settings", inserted);
        }

        // Expired logins are useless after a restart
        let purged = queries::delete_expired_sessions(&conn, &crate::clock::now_rfc3339())?;
        if purged > 0 {
            tracing::debug!("Purged {} expired login sessions", purged);
        }

        Ok(())
    }

    /// Get the database file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Execute a query with the database connection
    pub fn with_connection<F, T>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&Connection) -> Result<T, DbError>,
    {
        let conn = self.conn.lock().map_err(|_| DbError::LockPoisoned)?;
        f(&conn)
    }

    /// Execute several statements atomically
    pub fn with_transaction<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Connection) -> Result<T, E>,
        E: From<DbError>,
    {
        let mut conn = self.conn.lock().map_err(|_| DbError::LockPoisoned)?;
        let tx = conn.transaction().map_err(DbError::from)?;
        let value = f(&tx)?;
        tx.commit().map_err(DbError::from)?;
        Ok(value)
    }
}

/// Get the default database path
pub fn default_db_path() -> PathBuf {
    let data_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."));

    data_dir.join("adike-mitra").join("database.db")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_initialize() {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        // Second run must not duplicate settings
        db.initialize().unwrap();

        let count: i64 = db
            .with_connection(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM system_settings", [], |row| row.get(0))?)
            })
            .unwrap();
        assert_eq!(count, 12);
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();

        let result: Result<(), DbError> = db.with_transaction(|conn| {
            conn.execute("DELETE FROM system_settings", [])?;
            Err(DbError::LockPoisoned)
        });
        assert!(result.is_err());

        let count: i64 = db
            .with_connection(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM system_settings", [], |row| row.get(0))?)
            })
            .unwrap();
        assert_eq!(count, 12);
    }

    #[test]
    fn test_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        let db = Database::new(path.clone()).unwrap();
        db.initialize().unwrap();
        assert_eq!(db.path(), path.as_path());
        assert!(path.exists());
    }

    #[test]
    fn test_default_db_path() {
        let path = default_db_path();
        assert!(path.ends_with("adike-mitra/database.db"));
    }
}
