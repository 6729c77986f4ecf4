// src/db/models/changeset.rs

//! Changeset model - the audit log of mutations
//!
//! A changeset groups every change made by one operation. Each change
//! records the entity it touched together with its JSON state before and
//! after, `null` standing for "did not exist".

use crate::error::{Error, Result};
use rusqlite::{Connection, OptionalExtension, Row, params};

/// One audited operation
#[derive(Debug, Clone)]
pub struct Changeset {
    pub id: Option<i64>,
    pub author: String,
    pub comment: Option<String>,
    pub committed_on: Option<String>,
}

impl Changeset {
    /// Create a new Changeset
    pub fn new(author: String, comment: Option<String>) -> Self {
        Self {
            id: None,
            author,
            comment,
            committed_on: None,
        }
    }

    /// Insert this changeset into the database
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO changesets (author, comment) VALUES (?1, ?2)",
            params![&self.author, &self.comment],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// Find a changeset by ID
    pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, author, comment, committed_on FROM changesets WHERE id = ?1",
        )?;

        let changeset = stmt.query_row([id], Self::from_row).optional()?;

        Ok(changeset)
    }

    /// List all changesets, newest first
    pub fn list_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, author, comment, committed_on FROM changesets
             ORDER BY committed_on DESC, id DESC",
        )?;

        let changesets = stmt
            .query_map([], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(changesets)
    }

    /// Append a change to this changeset
    pub fn add_change(
        &self,
        conn: &Connection,
        target_class: &str,
        target_id: i64,
        old_value: &str,
        new_value: &str,
    ) -> Result<i64> {
        let id = self.id.ok_or_else(|| {
            Error::InitError("Cannot add a change to an unsaved changeset".to_string())
        })?;

        conn.execute(
            "INSERT INTO changes (changeset_id, target_class, target_id, old_value, new_value)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, target_class, target_id, old_value, new_value],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Convert a database row to a Changeset
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            author: row.get(1)?,
            comment: row.get(2)?,
            committed_on: row.get(3)?,
        })
    }
}

/// One entity mutation inside a [`Changeset`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRecord {
    pub id: i64,
    pub changeset_id: i64,
    pub target_class: String,
    pub target_id: i64,
    /// JSON text, `null` when the entity was created
    pub old_value: String,
    /// JSON text, `null` when the entity was deleted
    pub new_value: String,
}

impl ChangeRecord {
    /// Changes of one changeset in the order they were recorded
    pub fn for_changeset(conn: &Connection, changeset_id: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, changeset_id, target_class, target_id, old_value, new_value
             FROM changes WHERE changeset_id = ?1 ORDER BY id",
        )?;

        let changes = stmt
            .query_map([changeset_id], |row| {
                Ok(Self {
                    id: row.get(0)?,
                    changeset_id: row.get(1)?,
                    target_class: row.get(2)?,
                    target_id: row.get(3)?,
                    old_value: row.get(4)?,
                    new_value: row.get(5)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(changes)
    }
}
