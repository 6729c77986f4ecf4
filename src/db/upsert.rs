// src/db/upsert.rs

//! Race-tolerant insert-or-find for uniquely keyed rows
//!
//! Several importers may try to create the same row (the same RPM, the
//! same package-at-location link) at once. [`upsert`] attempts the insert
//! inside a savepoint; when the insert loses a race and trips the unique
//! constraint, only the savepoint is rolled back and the winner's row is
//! looked up instead. The enclosing transaction stays usable either way.
//!
//! [`IdCache`] memoizes ids for the duration of one import batch. It is an
//! ordinary value owned by the caller, never shared between requests.

use crate::error::{Error, Result, is_unique_violation};
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::HashMap;
use tracing::debug;

/// A row that can be inserted, or found again, by its unique key
pub trait KeyedRow {
    /// Table the row lives in
    fn table(&self) -> &'static str;

    /// Human-readable unique key, used in diagnostics
    fn key_description(&self) -> String;

    /// Insert the row and return its id
    fn insert_row(&self, conn: &Connection) -> rusqlite::Result<i64>;

    /// Find the id of the row with this unique key
    fn find_id(&self, conn: &Connection) -> rusqlite::Result<Option<i64>>;
}

/// Outcome of [`upsert_tracked`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Upserted {
    pub id: i64,
    /// True when this call inserted the row
    pub created: bool,
}

/// Insert `row`, or return the id of the row that already holds its key
pub fn upsert<R: KeyedRow + ?Sized>(conn: &Connection, row: &R) -> Result<i64> {
    upsert_tracked(conn, row).map(|u| u.id)
}

/// Like [`upsert`], also reporting whether the row was created
///
/// Any error other than a uniqueness violation is propagated. A conflict
/// whose follow-up lookup finds nothing is a consistency bug and surfaces
/// as [`Error::ConcurrentConflictError`].
pub fn upsert_tracked<R: KeyedRow + ?Sized>(conn: &Connection, row: &R) -> Result<Upserted> {
    let savepoint = Savepoint::begin(conn, "keyed_upsert")?;

    match row.insert_row(conn) {
        Ok(id) => {
            savepoint.release()?;
            Ok(Upserted { id, created: true })
        }
        Err(e) if is_unique_violation(&e) => {
            savepoint.rollback_to()?;
            debug!(
                "Insert into {} lost a race for {}, looking up existing row",
                row.table(),
                row.key_description()
            );
            match row.find_id(conn)? {
                Some(id) => {
                    savepoint.release()?;
                    Ok(Upserted { id, created: false })
                }
                None => Err(Error::ConcurrentConflictError(format!(
                    "{} row {} conflicted on insert but cannot be found",
                    row.table(),
                    row.key_description()
                ))),
            }
        }
        Err(e) => Err(e.into()),
    }
}

/// Named savepoint issued as plain SQL so it nests inside any transaction
///
/// Dropping an unreleased savepoint rolls it back and removes it.
struct Savepoint<'a> {
    conn: &'a Connection,
    name: &'static str,
    finished: bool,
}

impl<'a> Savepoint<'a> {
    fn begin(conn: &'a Connection, name: &'static str) -> Result<Self> {
        conn.execute_batch(&format!("SAVEPOINT {name}"))?;
        Ok(Self {
            conn,
            name,
            finished: false,
        })
    }

    /// Undo everything since `begin`, keeping the savepoint open
    fn rollback_to(&self) -> Result<()> {
        self.conn
            .execute_batch(&format!("ROLLBACK TO SAVEPOINT {}", self.name))?;
        Ok(())
    }

    /// Commit the savepoint into the enclosing scope
    fn release(mut self) -> Result<()> {
        self.finished = true;
        self.conn
            .execute_batch(&format!("RELEASE SAVEPOINT {}", self.name))?;
        Ok(())
    }
}

impl Drop for Savepoint<'_> {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.conn.execute_batch(&format!(
                "ROLLBACK TO SAVEPOINT {0}; RELEASE SAVEPOINT {0}",
                self.name
            ));
        }
    }
}

/// Single-column tables holding interned lookup values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LookupTable {
    Arch,
    Path,
    SigKey,
    ContentCategory,
}

impl LookupTable {
    pub fn as_str(&self) -> &'static str {
        match self {
            LookupTable::Arch => "arches",
            LookupTable::Path => "paths",
            LookupTable::SigKey => "sigkeys",
            LookupTable::ContentCategory => "content_categories",
        }
    }

    fn column(&self) -> &'static str {
        match self {
            LookupTable::Arch => "name",
            LookupTable::Path => "path",
            LookupTable::SigKey => "key_id",
            LookupTable::ContentCategory => "name",
        }
    }
}

/// One value of a [`LookupTable`]
#[derive(Debug, Clone, Copy)]
pub struct LookupValue<'a> {
    pub table: LookupTable,
    pub value: &'a str,
}

impl KeyedRow for LookupValue<'_> {
    fn table(&self) -> &'static str {
        self.table.as_str()
    }

    fn key_description(&self) -> String {
        format!("{}={}", self.table.column(), self.value)
    }

    fn insert_row(&self, conn: &Connection) -> rusqlite::Result<i64> {
        conn.execute(
            &format!(
                "INSERT INTO {} ({}) VALUES (?1)",
                self.table.as_str(),
                self.table.column()
            ),
            params![self.value],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn find_id(&self, conn: &Connection) -> rusqlite::Result<Option<i64>> {
        conn.query_row(
            &format!(
                "SELECT id FROM {} WHERE {} = ?1",
                self.table.as_str(),
                self.table.column()
            ),
            params![self.value],
            |row| row.get(0),
        )
        .optional()
    }
}

/// Batch-scoped memo of ids resolved through [`upsert`]
///
/// Keys are the unique key of the row (lookup value, NEVRA, or link pair);
/// a hit skips the database entirely.
#[derive(Debug, Default)]
pub struct IdCache {
    lookups: HashMap<(LookupTable, String), i64>,
    keyed: HashMap<(&'static str, String), i64>,
    hits: usize,
    misses: usize,
}

impl IdCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id of `value` in `table`, inserting it if missing
    pub fn lookup_id(&mut self, conn: &Connection, table: LookupTable, value: &str) -> Result<i64> {
        if let Some(id) = self.lookups.get(&(table, value.to_string())) {
            self.hits += 1;
            return Ok(*id);
        }

        self.misses += 1;
        let id = upsert(conn, &LookupValue { table, value })?;
        self.lookups.insert((table, value.to_string()), id);
        Ok(id)
    }

    /// Id of any [`KeyedRow`], memoized by its table and key description
    pub fn keyed_id<R: KeyedRow + ?Sized>(&mut self, conn: &Connection, row: &R) -> Result<i64> {
        let key = (row.table(), row.key_description());
        if let Some(id) = self.keyed.get(&key) {
            self.hits += 1;
            return Ok(*id);
        }

        self.misses += 1;
        let id = upsert(conn, row)?;
        self.keyed.insert(key, id);
        Ok(id)
    }

    /// Number of lookups answered from memory
    pub fn hits(&self) -> usize {
        self.hits
    }

    /// Number of lookups that went to the database
    pub fn misses(&self) -> usize {
        self.misses
    }
}
