// src/db/models/override_rpm.rs

//! Override rules - release-scoped exceptions to the imported RPM mapping

use crate::db::models::Release;
use crate::db::upsert::KeyedRow;
use crate::error::{Error, Result};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde_json::{Value, json};
use std::fmt;

const SELECT_COLUMNS: &str = "SELECT o.id, o.release_id, r.release_id, o.variant, o.arch,
        o.srpm_name, o.rpm_name, o.rpm_arch, o.include, o.comment, o.do_not_delete
     FROM override_rpms o JOIN releases r ON r.id = o.release_id";

/// A persisted include or exclude rule for one RPM at one variant/arch
///
/// Unique per (release, variant, arch, rpm_name, rpm_arch). `srpm_name`
/// groups rules with the source package whose mapping they modify.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverrideRule {
    pub id: Option<i64>,
    /// Database ID of the owning release
    pub release_pk: i64,
    /// Public identifier of the owning release
    pub release_id: String,
    pub variant: String,
    pub arch: String,
    pub srpm_name: String,
    pub rpm_name: String,
    pub rpm_arch: String,
    pub include: bool,
    pub comment: String,
    /// Protects the rule from lazy cleanup when it has no effect
    pub do_not_delete: bool,
}

impl OverrideRule {
    /// A new include rule with default comment and protection
    pub fn new(
        release: &Release,
        variant: &str,
        arch: &str,
        srpm_name: &str,
        rpm_name: &str,
        rpm_arch: &str,
    ) -> Result<Self> {
        Ok(Self {
            id: None,
            release_pk: release.pk()?,
            release_id: release.release_id.clone(),
            variant: variant.to_string(),
            arch: arch.to_string(),
            srpm_name: srpm_name.to_string(),
            rpm_name: rpm_name.to_string(),
            rpm_arch: rpm_arch.to_string(),
            include: true,
            comment: String::new(),
            do_not_delete: false,
        })
    }

    /// Insert this rule into the database
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        let id = self.insert_row(conn)?;
        self.id = Some(id);
        Ok(id)
    }

    /// Find a rule by database ID
    pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} WHERE o.id = ?1"))?;
        let rule = stmt.query_row([id], Self::from_row).optional()?;
        Ok(rule)
    }

    /// Find the rule a change addresses, matching the source package too
    pub fn find_by_key(conn: &Connection, key: &Self) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(&format!(
            "{SELECT_COLUMNS} WHERE o.release_id = ?1 AND o.variant = ?2 AND o.arch = ?3
                AND o.rpm_name = ?4 AND o.rpm_arch = ?5 AND o.srpm_name = ?6"
        ))?;
        let rule = stmt
            .query_row(
                params![
                    key.release_pk,
                    &key.variant,
                    &key.arch,
                    &key.rpm_name,
                    &key.rpm_arch,
                    &key.srpm_name,
                ],
                Self::from_row,
            )
            .optional()?;
        Ok(rule)
    }

    /// Rules of a release, optionally only those of one source package
    ///
    /// Ordered by variant, arch, rpm name and rpm arch.
    pub fn list_for_release(
        conn: &Connection,
        release: &Release,
        srpm_name: Option<&str>,
    ) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "{SELECT_COLUMNS} WHERE o.release_id = ?1 AND (?2 IS NULL OR o.srpm_name = ?2)
             ORDER BY o.variant, o.arch, o.rpm_name, o.rpm_arch"
        ))?;
        let rules = stmt
            .query_map(params![release.pk()?, srpm_name], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rules)
    }

    /// Write include/comment/protection back to the stored row
    pub fn save(&self, conn: &Connection) -> Result<()> {
        let id = self.pk()?;
        conn.execute(
            "UPDATE override_rpms SET include = ?1, comment = ?2, do_not_delete = ?3 WHERE id = ?4",
            params![self.include, &self.comment, self.do_not_delete, id],
        )?;
        Ok(())
    }

    /// Remove the stored row
    pub fn delete(&self, conn: &Connection) -> Result<()> {
        let id = self.pk()?;
        conn.execute("DELETE FROM override_rpms WHERE id = ?1", [id])?;
        Ok(())
    }

    pub fn pk(&self) -> Result<i64> {
        self.id
            .ok_or_else(|| Error::InitError(format!("override {self} has not been saved")))
    }

    /// JSON form used in audit records and listings
    pub fn export(&self) -> Value {
        json!({
            "release_id": self.release_id,
            "variant": self.variant,
            "arch": self.arch,
            "srpm_name": self.srpm_name,
            "rpm_name": self.rpm_name,
            "rpm_arch": self.rpm_arch,
            "include": self.include,
            "comment": self.comment,
            "do_not_delete": self.do_not_delete,
        })
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            release_pk: row.get(1)?,
            release_id: row.get(2)?,
            variant: row.get(3)?,
            arch: row.get(4)?,
            srpm_name: row.get(5)?,
            rpm_name: row.get(6)?,
            rpm_arch: row.get(7)?,
            include: row.get(8)?,
            comment: row.get(9)?,
            do_not_delete: row.get(10)?,
        })
    }
}

impl fmt::Display for OverrideRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}.{} {}.{} {}",
            self.release_id,
            self.variant,
            self.arch,
            self.rpm_name,
            self.rpm_arch,
            if self.include { "+" } else { "-" }
        )
    }
}

impl KeyedRow for OverrideRule {
    fn table(&self) -> &'static str {
        "override_rpms"
    }

    fn key_description(&self) -> String {
        format!("{} (srpm {})", self, self.srpm_name)
    }

    fn insert_row(&self, conn: &Connection) -> rusqlite::Result<i64> {
        conn.execute(
            "INSERT INTO override_rpms (release_id, variant, arch, srpm_name, rpm_name, rpm_arch,
                                        include, comment, do_not_delete)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                self.release_pk,
                &self.variant,
                &self.arch,
                &self.srpm_name,
                &self.rpm_name,
                &self.rpm_arch,
                self.include,
                &self.comment,
                self.do_not_delete,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Matches on the source package as well, so a rule filed under a
    /// different package still conflicts but is never returned here
    fn find_id(&self, conn: &Connection) -> rusqlite::Result<Option<i64>> {
        conn.query_row(
            "SELECT id FROM override_rpms
             WHERE release_id = ?1 AND variant = ?2 AND arch = ?3
               AND rpm_name = ?4 AND rpm_arch = ?5 AND srpm_name = ?6",
            params![
                self.release_pk,
                &self.variant,
                &self.arch,
                &self.rpm_name,
                &self.rpm_arch,
                &self.srpm_name,
            ],
            |row| row.get(0),
        )
        .optional()
    }
}
