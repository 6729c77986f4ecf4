// src/db/mod.rs

//! Database layer for rpmmap
//!
//! All state lives in a single SQLite file: release topology, imported
//! compose contents, override rules and the audit log. Connections are
//! opened per request; nothing read from the database is cached between
//! requests.

mod migrations;
pub mod models;
pub mod schema;
pub mod upsert;

use crate::error::{Error, Result};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

pub use upsert::{IdCache, KeyedRow, upsert};

/// Default busy timeout used by [`open`]
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

/// Create (if needed) and migrate the database at `db_path`
pub fn init(db_path: &str) -> Result<()> {
    info!("Initializing database at {}", db_path);

    if let Some(parent) = Path::new(db_path).parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent)?;
    }

    let conn = Connection::open(db_path)?;
    configure(&conn, DEFAULT_BUSY_TIMEOUT)?;
    schema::migrate(&conn)?;
    Ok(())
}

/// Open an existing database with the default busy timeout
pub fn open(db_path: &str) -> Result<Connection> {
    open_with_timeout(db_path, DEFAULT_BUSY_TIMEOUT)
}

/// Open an existing database, waiting up to `busy_timeout` for locks
pub fn open_with_timeout(db_path: &str, busy_timeout: Duration) -> Result<Connection> {
    if !Path::new(db_path).exists() {
        return Err(Error::InitError(format!(
            "Database not found at {db_path}; run `rpmmap init` first"
        )));
    }

    let conn = Connection::open(db_path)?;
    configure(&conn, busy_timeout)?;
    Ok(conn)
}

fn configure(conn: &Connection, busy_timeout: Duration) -> Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(busy_timeout)?;
    Ok(())
}

/// Run `f` inside one atomic write transaction
///
/// The transaction is opened `IMMEDIATE`, so the write lock is taken up
/// front and concurrent writers queue on the busy timeout. Commits when
/// `f` returns `Ok`, rolls back on `Err`.
pub fn transaction<T, F>(conn: &mut Connection, f: F) -> Result<T>
where
    F: FnOnce(&Transaction) -> Result<T>,
{
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    match f(&tx) {
        Ok(value) => {
            tx.commit()?;
            debug!("Transaction committed");
            Ok(value)
        }
        Err(e) => {
            // Dropping `tx` rolls back as well; do it explicitly so a
            // failed rollback is not silently swallowed.
            tx.rollback()?;
            debug!("Transaction rolled back: {}", e);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_and_open() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("nested/rpmmap.db");
        let db_path = db_path.to_str().unwrap();

        init(db_path).unwrap();
        let conn = open(db_path).unwrap();

        let fk: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(fk, 1);
    }

    #[test]
    fn test_open_missing_database() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("missing.db");
        let result = open(db_path.to_str().unwrap());
        assert!(matches!(result, Err(Error::InitError(_))));
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("rpmmap.db");
        let db_path = db_path.to_str().unwrap();
        init(db_path).unwrap();
        let mut conn = open(db_path).unwrap();

        let result: Result<()> = transaction(&mut conn, |tx| {
            tx.execute("INSERT INTO arches (name) VALUES ('x86_64')", [])?;
            Err(Error::ParseError("boom".to_string()))
        });
        assert!(result.is_err());

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM arches", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
