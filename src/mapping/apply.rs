// src/mapping/apply.rs

//! Persisting override changes
//!
//! A batch of changes is applied in order inside one write transaction;
//! any failure rolls the whole batch back. Each applied change is
//! reported to the audit sink in the same transaction.

use super::{Change, ChangeAction};
use crate::audit::{AuditSink, ENTITY_OVERRIDE};
use crate::db::models::{OverrideRule, Release};
use crate::db::{self, upsert};
use crate::error::{Error, Result};
use rusqlite::Connection;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

/// Result of applying one change
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppliedChange {
    /// Database ID of the override rule the change addressed
    pub id: i64,
    /// Exported rule before the change, `None` if it was just created
    pub before: Option<Value>,
    /// Exported rule after the change, `None` if it was deleted
    pub after: Option<Value>,
}

/// Apply `changes` to the override rules of `release` atomically
pub fn apply_changes(
    conn: &mut Connection,
    release: &Release,
    changes: &[Change],
    audit: &mut dyn AuditSink,
) -> Result<Vec<AppliedChange>> {
    let applied = db::transaction(conn, |tx| apply_in_transaction(tx, release, changes, audit))?;
    info!(
        "Applied {} override change(s) to release {}",
        applied.len(),
        release.release_id
    );
    Ok(applied)
}

/// Apply `changes` on a connection that already holds a transaction
pub fn apply_in_transaction(
    conn: &Connection,
    release: &Release,
    changes: &[Change],
    audit: &mut dyn AuditSink,
) -> Result<Vec<AppliedChange>> {
    let mut applied = Vec::with_capacity(changes.len());
    for change in changes {
        let result = apply_one(conn, release, change)?;
        audit.record(
            conn,
            ENTITY_OVERRIDE,
            result.id,
            result.before.as_ref(),
            result.after.as_ref(),
        )?;
        applied.push(result);
    }
    Ok(applied)
}

fn apply_one(conn: &Connection, release: &Release, change: &Change) -> Result<AppliedChange> {
    let (mut rule, created) = get_or_create(conn, release, change)?;
    let id = rule.pk()?;
    let before = (!created).then(|| rule.export());

    let after = match change.action {
        ChangeAction::Create => {
            rule.include = change.include.ok_or_else(|| {
                Error::malformed(Some("include"), "This field is required for create")
            })?;
            rule.comment = change.comment.clone();
            rule.do_not_delete = change.do_not_delete;
            rule.save(conn)?;
            Some(rule.export())
        }
        ChangeAction::Delete if !change.do_not_delete => {
            rule.delete(conn)?;
            None
        }
        ChangeAction::Delete => {
            rule.include = !change.include.unwrap_or(rule.include);
            rule.comment = change.comment.clone();
            rule.do_not_delete = true;
            rule.save(conn)?;
            Some(rule.export())
        }
    };

    debug!("Applied {} to override {}", change, id);
    Ok(AppliedChange { id, before, after })
}

/// Find the rule a change addresses, creating a default one if missing
///
/// Creation goes through the keyed upsert, so a concurrent writer that
/// creates the same rule first is picked up instead of failing. A rule
/// with the same key filed under another source package cannot be
/// resolved and aborts the batch.
fn get_or_create(
    conn: &Connection,
    release: &Release,
    change: &Change,
) -> Result<(OverrideRule, bool)> {
    let mut rule = OverrideRule::new(
        release,
        &change.variant,
        &change.arch,
        &change.srpm_name,
        &change.rpm_name,
        &change.rpm_arch,
    )?;

    if let Some(existing) = OverrideRule::find_by_key(conn, &rule)? {
        return Ok((existing, false));
    }

    let upserted = upsert::upsert_tracked(conn, &rule)?;
    if upserted.created {
        rule.id = Some(upserted.id);
        return Ok((rule, true));
    }

    let existing = OverrideRule::find_by_id(conn, upserted.id)?.ok_or_else(|| {
        Error::ConcurrentConflictError(format!("override {rule} vanished after conflict"))
    })?;
    Ok((existing, false))
}

/// Delete the override rules of a release
///
/// Rules protected by `do_not_delete` are kept unless `force` is set.
/// Returns the deleted rules.
pub fn clear_overrides(
    conn: &mut Connection,
    release: &Release,
    force: bool,
    audit: &mut dyn AuditSink,
) -> Result<Vec<OverrideRule>> {
    let cleared = db::transaction(conn, |tx| {
        let rules: Vec<OverrideRule> = OverrideRule::list_for_release(tx, release, None)?
            .into_iter()
            .filter(|rule| force || !rule.do_not_delete)
            .collect();

        for rule in &rules {
            audit.record(tx, ENTITY_OVERRIDE, rule.pk()?, Some(&rule.export()), None)?;
            rule.delete(tx)?;
        }
        Ok(rules)
    })?;

    info!(
        "Cleared {} override(s) of release {}",
        cleared.len(),
        release.release_id
    );
    Ok(cleared)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAudit;
    use crate::db::schema;
    use crate::mapping::EntryKey;
    use tempfile::NamedTempFile;

    fn create_test_db() -> (NamedTempFile, Connection) {
        let temp_file = NamedTempFile::new().unwrap();
        let conn = Connection::open(temp_file.path()).unwrap();
        conn.execute("PRAGMA foreign_keys = ON", []).unwrap();
        schema::migrate(&conn).unwrap();
        (temp_file, conn)
    }

    fn setup() -> (NamedTempFile, Connection, Release) {
        let (temp, conn) = create_test_db();
        let mut release = Release::from_release_id("rhel-9.4");
        release.insert(&conn).unwrap();
        (temp, conn, release)
    }

    fn change(action: ChangeAction, rpm_name: &str, include: bool) -> Change {
        let key = EntryKey::new("Server", "x86_64", rpm_name, "noarch");
        Change::staged(action, "rhel-9.4", "bash", &key, include)
    }

    fn stored(conn: &Connection, release: &Release) -> Vec<OverrideRule> {
        OverrideRule::list_for_release(conn, release, None).unwrap()
    }

    #[test]
    fn test_create_then_delete() {
        let (_temp, mut conn, release) = setup();
        let mut audit = MemoryAudit::new();

        let applied = apply_changes(
            &mut conn,
            &release,
            &[change(ChangeAction::Create, "bash-doc", true)],
            &mut audit,
        )
        .unwrap();
        assert!(applied[0].before.is_none());
        assert_eq!(applied[0].after.as_ref().unwrap()["include"], true);
        assert_eq!(stored(&conn, &release).len(), 1);

        let applied = apply_changes(
            &mut conn,
            &release,
            &[change(ChangeAction::Delete, "bash-doc", true)],
            &mut audit,
        )
        .unwrap();
        assert!(applied[0].before.is_some());
        assert!(applied[0].after.is_none());
        assert!(stored(&conn, &release).is_empty());
        assert_eq!(audit.records.len(), 2);
        assert_eq!(audit.records[1].entity_type, "OverrideRPM");
    }

    #[test]
    fn test_create_updates_existing_rule() {
        let (_temp, mut conn, release) = setup();
        let mut audit = MemoryAudit::new();

        let mut exclude = change(ChangeAction::Create, "bash-doc", false);
        apply_changes(&mut conn, &release, &[exclude.clone()], &mut audit).unwrap();
        exclude.include = Some(true);
        exclude.comment = "ship it".to_string();
        apply_changes(&mut conn, &release, &[exclude], &mut audit).unwrap();

        let rules = stored(&conn, &release);
        assert_eq!(rules.len(), 1);
        assert!(rules[0].include);
        assert_eq!(rules[0].comment, "ship it");
    }

    #[test]
    fn test_protected_delete_flips_include() {
        let (_temp, mut conn, release) = setup();
        let mut audit = MemoryAudit::new();

        apply_changes(
            &mut conn,
            &release,
            &[change(ChangeAction::Create, "bash-doc", true)],
            &mut audit,
        )
        .unwrap();

        let mut delete = change(ChangeAction::Delete, "bash-doc", true);
        delete.do_not_delete = true;
        delete.comment = "kept for tooling".to_string();
        let applied = apply_changes(&mut conn, &release, &[delete], &mut audit).unwrap();

        let after = applied[0].after.as_ref().unwrap();
        assert_eq!(after["include"], false);
        assert_eq!(after["do_not_delete"], true);
        let rules = stored(&conn, &release);
        assert!(!rules[0].include);
        assert_eq!(rules[0].comment, "kept for tooling");
    }

    #[test]
    fn test_protected_delete_without_include_flips_stored_rule() {
        let (_temp, mut conn, release) = setup();
        let mut audit = MemoryAudit::new();

        apply_changes(
            &mut conn,
            &release,
            &[change(ChangeAction::Create, "bash-doc", false)],
            &mut audit,
        )
        .unwrap();

        let mut delete = change(ChangeAction::Delete, "bash-doc", false);
        delete.include = None;
        delete.do_not_delete = true;
        apply_changes(&mut conn, &release, &[delete], &mut audit).unwrap();

        assert!(stored(&conn, &release)[0].include);
    }

    #[test]
    fn test_batch_is_atomic() {
        let (_temp, mut conn, release) = setup();
        let mut audit = MemoryAudit::new();

        // Same key filed under another source package: cannot be resolved
        let mut foreign = change(ChangeAction::Create, "bash-doc", true);
        foreign.srpm_name = "other".to_string();
        apply_changes(&mut conn, &release, &[foreign], &mut audit).unwrap();

        let batch = [
            change(ChangeAction::Create, "bash-devel", true),
            change(ChangeAction::Create, "bash-doc", true),
        ];
        let result = apply_changes(&mut conn, &release, &batch, &mut audit);
        assert!(matches!(result, Err(Error::ConcurrentConflictError(_))));

        let rules = stored(&conn, &release);
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].srpm_name, "other");
    }

    #[test]
    fn test_create_requires_include() {
        let (_temp, mut conn, release) = setup();
        let mut create = change(ChangeAction::Create, "bash-doc", true);
        create.include = None;
        let result = apply_changes(&mut conn, &release, &[create], &mut MemoryAudit::new());
        assert!(matches!(result, Err(Error::MalformedInputError(_))));
        assert!(stored(&conn, &release).is_empty());
    }

    #[test]
    fn test_clear_overrides() {
        let (_temp, mut conn, release) = setup();
        let mut audit = MemoryAudit::new();

        let mut protected = change(ChangeAction::Create, "bash-doc", false);
        protected.do_not_delete = true;
        apply_changes(
            &mut conn,
            &release,
            &[protected, change(ChangeAction::Create, "bash-devel", true)],
            &mut audit,
        )
        .unwrap();

        let cleared = clear_overrides(&mut conn, &release, false, &mut audit).unwrap();
        assert_eq!(cleared.len(), 1);
        assert_eq!(cleared[0].rpm_name, "bash-devel");
        assert_eq!(stored(&conn, &release).len(), 1);

        let cleared = clear_overrides(&mut conn, &release, true, &mut audit).unwrap();
        assert_eq!(cleared.len(), 1);
        assert!(stored(&conn, &release).is_empty());
        assert!(audit.records.last().unwrap().after.is_none());
    }
}
