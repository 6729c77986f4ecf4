// src/audit.rs

//! Audit trail for mutations
//!
//! Every mutation of an audited entity is reported to an [`AuditSink`]
//! with the entity's JSON state before and after; `None` stands for "did
//! not exist". Sinks receive the connection the mutation runs on, so a
//! persisted record shares its transaction.

use crate::db::models::Changeset;
use crate::error::Result;
use rusqlite::Connection;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

/// Entity type of override rule records
pub const ENTITY_OVERRIDE: &str = "OverrideRPM";
/// Entity type of compose records
pub const ENTITY_COMPOSE: &str = "Compose";
/// Entity type of compose variant records
pub const ENTITY_VARIANT: &str = "Variant";
/// Entity type of free-form notices, recorded with entity id 0
pub const ENTITY_NOTICE: &str = "notice";

/// Receiver of before/after records
pub trait AuditSink {
    fn record(
        &mut self,
        conn: &Connection,
        entity_type: &str,
        entity_id: i64,
        before: Option<&Value>,
        after: Option<&Value>,
    ) -> Result<()>;
}

/// One recorded mutation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditRecord {
    pub entity_type: String,
    pub entity_id: i64,
    pub before: Option<Value>,
    pub after: Option<Value>,
}

/// Sink that keeps records in memory
#[derive(Debug, Default)]
pub struct MemoryAudit {
    pub records: Vec<AuditRecord>,
}

impl MemoryAudit {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AuditSink for MemoryAudit {
    fn record(
        &mut self,
        _conn: &Connection,
        entity_type: &str,
        entity_id: i64,
        before: Option<&Value>,
        after: Option<&Value>,
    ) -> Result<()> {
        self.records.push(AuditRecord {
            entity_type: entity_type.to_string(),
            entity_id,
            before: before.cloned(),
            after: after.cloned(),
        });
        Ok(())
    }
}

/// Sink that writes the `changesets` / `changes` tables
///
/// The changeset row is created on the first record, so an operation that
/// changes nothing leaves no trace. Use one recorder per operation: after
/// the enclosing transaction rolls back, its changeset no longer exists.
#[derive(Debug)]
pub struct ChangesetRecorder {
    author: String,
    comment: Option<String>,
    changeset: Option<Changeset>,
    recorded: usize,
}

impl ChangesetRecorder {
    pub fn new(author: impl Into<String>, comment: Option<String>) -> Self {
        Self {
            author: author.into(),
            comment,
            changeset: None,
            recorded: 0,
        }
    }

    /// ID of the changeset written so far, if any
    pub fn changeset_id(&self) -> Option<i64> {
        self.changeset.as_ref().and_then(|c| c.id)
    }

    /// Number of records written
    pub fn recorded(&self) -> usize {
        self.recorded
    }
}

impl AuditSink for ChangesetRecorder {
    fn record(
        &mut self,
        conn: &Connection,
        entity_type: &str,
        entity_id: i64,
        before: Option<&Value>,
        after: Option<&Value>,
    ) -> Result<()> {
        let changeset = match self.changeset.as_mut() {
            Some(changeset) => changeset,
            None => {
                let mut changeset = Changeset::new(self.author.clone(), self.comment.clone());
                let id = changeset.insert(conn)?;
                debug!("Opened changeset {} for {}", id, self.author);
                self.changeset.insert(changeset)
            }
        };

        changeset.add_change(
            conn,
            entity_type,
            entity_id,
            &to_json_text(before)?,
            &to_json_text(after)?,
        )?;
        self.recorded += 1;
        Ok(())
    }
}

fn to_json_text(value: Option<&Value>) -> Result<String> {
    Ok(serde_json::to_string(value.unwrap_or(&Value::Null))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::ChangeRecord;
    use crate::db::schema;
    use serde_json::json;
    use tempfile::NamedTempFile;

    fn create_test_db() -> (NamedTempFile, Connection) {
        let temp_file = NamedTempFile::new().unwrap();
        let conn = Connection::open(temp_file.path()).unwrap();
        conn.execute("PRAGMA foreign_keys = ON", []).unwrap();
        schema::migrate(&conn).unwrap();
        (temp_file, conn)
    }

    #[test]
    fn test_changeset_recorder_is_lazy() {
        let (_temp, conn) = create_test_db();
        let mut recorder = ChangesetRecorder::new("alice", None);
        assert!(recorder.changeset_id().is_none());

        let after = json!({"include": true});
        recorder
            .record(&conn, ENTITY_OVERRIDE, 3, None, Some(&after))
            .unwrap();
        recorder
            .record(&conn, ENTITY_OVERRIDE, 3, Some(&after), None)
            .unwrap();

        let id = recorder.changeset_id().unwrap();
        let changes = ChangeRecord::for_changeset(&conn, id).unwrap();
        assert_eq!(recorder.recorded(), 2);
        assert_eq!(changes[0].old_value, "null");
        assert_eq!(changes[0].new_value, r#"{"include":true}"#);
        assert_eq!(changes[1].new_value, "null");

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM changesets", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_memory_audit() {
        let (_temp, conn) = create_test_db();
        let mut audit = MemoryAudit::new();
        audit
            .record(&conn, ENTITY_NOTICE, 0, None, Some(&json!({"num_linked_rpms": 2})))
            .unwrap();
        assert_eq!(audit.records.len(), 1);
        assert_eq!(audit.records[0].entity_type, "notice");
        assert!(audit.records[0].before.is_none());
    }
}
