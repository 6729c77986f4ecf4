// src/db/models/compose.rs

//! Compose model - imported compose snapshots and the RPMs they ship

use crate::db::models::Release;
use crate::db::upsert::{IdCache, KeyedRow, LookupTable};
use crate::error::{Error, Result};
use rusqlite::{Connection, OptionalExtension, Row, params};

/// A compose built for a release
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compose {
    pub id: Option<i64>,
    pub compose_id: String,
    /// Database ID of the release the compose was built for
    pub release_id: i64,
    /// ISO date, `YYYY-MM-DD`
    pub compose_date: String,
    pub compose_type: String,
    pub compose_respin: i64,
    pub compose_label: Option<String>,
    pub imported_at: Option<String>,
}

impl Compose {
    pub fn new(
        compose_id: String,
        release_id: i64,
        compose_date: String,
        compose_type: String,
        compose_respin: i64,
    ) -> Self {
        Self {
            id: None,
            compose_id,
            release_id,
            compose_date,
            compose_type,
            compose_respin,
            compose_label: None,
            imported_at: None,
        }
    }

    /// Find a compose by its public identifier
    pub fn find_by_compose_id(conn: &Connection, compose_id: &str) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, compose_id, release_id, compose_date, compose_type, compose_respin,
                    compose_label, imported_at
             FROM composes WHERE compose_id = ?1",
        )?;
        let compose = stmt.query_row([compose_id], Self::from_row).optional()?;
        Ok(compose)
    }

    /// Like [`Compose::find_by_compose_id`], but a missing compose is an error
    pub fn get(conn: &Connection, compose_id: &str) -> Result<Self> {
        Self::find_by_compose_id(conn, compose_id)?
            .ok_or_else(|| Error::NotFoundError(format!("compose {compose_id}")))
    }

    /// Composes built for a release, newest first
    pub fn list_for_release(conn: &Connection, release_id: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, compose_id, release_id, compose_date, compose_type, compose_respin,
                    compose_label, imported_at
             FROM composes WHERE release_id = ?1
             ORDER BY compose_date DESC, compose_respin DESC",
        )?;
        let composes = stmt
            .query_map([release_id], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(composes)
    }

    pub fn pk(&self) -> Result<i64> {
        self.id.ok_or_else(|| {
            Error::InitError(format!("compose {} has not been saved", self.compose_id))
        })
    }

    /// The release this compose was built for
    pub fn release(&self, conn: &Connection) -> Result<Release> {
        Release::find_by_id(conn, self.release_id)?.ok_or_else(|| {
            Error::NotFoundError(format!("release of compose {}", self.compose_id))
        })
    }

    /// Variants present in this compose, ordered by UID
    pub fn variants(&self, conn: &Connection) -> Result<Vec<ComposeVariant>> {
        let mut stmt = conn.prepare(
            "SELECT id, compose_id, variant_uid, variant_id, variant_name, variant_type
             FROM compose_variants WHERE compose_id = ?1 ORDER BY variant_uid",
        )?;
        let variants = stmt
            .query_map([self.pk()?], ComposeVariant::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(variants)
    }

    /// Where the binary and source RPMs of one source package sit in this compose
    pub fn package_locations(
        &self,
        conn: &Connection,
        srpm_name: &str,
    ) -> Result<Vec<PackageLocation>> {
        let mut stmt = conn.prepare(
            "SELECT cv.variant_uid, a.name, r.name, r.arch
             FROM compose_rpms cr
             JOIN rpms r ON r.id = cr.rpm_id
             JOIN compose_variant_arches cva ON cva.id = cr.variant_arch_id
             JOIN compose_variants cv ON cv.id = cva.variant_id
             JOIN arches a ON a.id = cva.arch_id
             WHERE cv.compose_id = ?1 AND r.srpm_name = ?2",
        )?;
        let locations = stmt
            .query_map(params![self.pk()?, srpm_name], |row| {
                Ok(PackageLocation {
                    variant: row.get(0)?,
                    arch: row.get(1)?,
                    rpm_name: row.get(2)?,
                    rpm_arch: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(locations)
    }

    /// Number of RPMs linked into this compose
    pub fn rpm_count(&self, conn: &Connection) -> Result<i64> {
        let count = conn.query_row(
            "SELECT COUNT(*) FROM compose_rpms cr
             JOIN compose_variant_arches cva ON cva.id = cr.variant_arch_id
             JOIN compose_variants cv ON cv.id = cva.variant_id
             WHERE cv.compose_id = ?1",
            [self.pk()?],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            compose_id: row.get(1)?,
            release_id: row.get(2)?,
            compose_date: row.get(3)?,
            compose_type: row.get(4)?,
            compose_respin: row.get(5)?,
            compose_label: row.get(6)?,
            imported_at: row.get(7)?,
        })
    }
}

impl KeyedRow for Compose {
    fn table(&self) -> &'static str {
        "composes"
    }

    fn key_description(&self) -> String {
        self.compose_id.clone()
    }

    fn insert_row(&self, conn: &Connection) -> rusqlite::Result<i64> {
        conn.execute(
            "INSERT INTO composes (compose_id, release_id, compose_date, compose_type,
                                   compose_respin, compose_label)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                &self.compose_id,
                self.release_id,
                &self.compose_date,
                &self.compose_type,
                self.compose_respin,
                &self.compose_label,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn find_id(&self, conn: &Connection) -> rusqlite::Result<Option<i64>> {
        conn.query_row(
            "SELECT id FROM composes WHERE compose_id = ?1",
            [&self.compose_id],
            |row| row.get(0),
        )
        .optional()
    }
}

/// One RPM at one variant/arch of a compose, as seen by the mapping loader
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageLocation {
    pub variant: String,
    pub arch: String,
    pub rpm_name: String,
    pub rpm_arch: String,
}

/// A variant as it appeared in one compose
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposeVariant {
    pub id: Option<i64>,
    pub compose_id: i64,
    pub variant_uid: String,
    pub variant_id: String,
    pub variant_name: String,
    pub variant_type: String,
}

impl ComposeVariant {
    pub fn new(compose_id: i64, variant_uid: String) -> Self {
        Self {
            id: None,
            compose_id,
            variant_id: variant_uid.clone(),
            variant_name: variant_uid.clone(),
            variant_uid,
            variant_type: "variant".to_string(),
        }
    }

    /// ID of the `arch` slot of this variant, creating it when missing
    pub fn arch_slot(&self, conn: &Connection, cache: &mut IdCache, arch: &str) -> Result<i64> {
        let variant_id = self.id.ok_or_else(|| {
            Error::InitError(format!("variant {} has not been saved", self.variant_uid))
        })?;
        let arch_id = cache.lookup_id(conn, LookupTable::Arch, arch)?;
        cache.keyed_id(conn, &ComposeVariantArch { variant_id, arch_id })
    }

    /// Arches this variant was composed for, sorted
    pub fn arches(&self, conn: &Connection) -> Result<Vec<String>> {
        let mut stmt = conn.prepare(
            "SELECT a.name FROM compose_variant_arches cva
             JOIN arches a ON a.id = cva.arch_id
             WHERE cva.variant_id = ?1 ORDER BY a.name",
        )?;
        let arches = stmt
            .query_map([self.id], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(arches)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            compose_id: row.get(1)?,
            variant_uid: row.get(2)?,
            variant_id: row.get(3)?,
            variant_name: row.get(4)?,
            variant_type: row.get(5)?,
        })
    }
}

impl KeyedRow for ComposeVariant {
    fn table(&self) -> &'static str {
        "compose_variants"
    }

    fn key_description(&self) -> String {
        format!("{}/{}", self.compose_id, self.variant_uid)
    }

    fn insert_row(&self, conn: &Connection) -> rusqlite::Result<i64> {
        conn.execute(
            "INSERT INTO compose_variants (compose_id, variant_uid, variant_id, variant_name, variant_type)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                self.compose_id,
                &self.variant_uid,
                &self.variant_id,
                &self.variant_name,
                &self.variant_type,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn find_id(&self, conn: &Connection) -> rusqlite::Result<Option<i64>> {
        conn.query_row(
            "SELECT id FROM compose_variants WHERE compose_id = ?1 AND variant_uid = ?2",
            params![self.compose_id, &self.variant_uid],
            |row| row.get(0),
        )
        .optional()
    }
}

/// An arch slot of a compose variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComposeVariantArch {
    pub variant_id: i64,
    pub arch_id: i64,
}

impl KeyedRow for ComposeVariantArch {
    fn table(&self) -> &'static str {
        "compose_variant_arches"
    }

    fn key_description(&self) -> String {
        format!("{}/{}", self.variant_id, self.arch_id)
    }

    fn insert_row(&self, conn: &Connection) -> rusqlite::Result<i64> {
        conn.execute(
            "INSERT INTO compose_variant_arches (variant_id, arch_id) VALUES (?1, ?2)",
            params![self.variant_id, self.arch_id],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn find_id(&self, conn: &Connection) -> rusqlite::Result<Option<i64>> {
        conn.query_row(
            "SELECT id FROM compose_variant_arches WHERE variant_id = ?1 AND arch_id = ?2",
            params![self.variant_id, self.arch_id],
            |row| row.get(0),
        )
        .optional()
    }
}

/// Link between an RPM and the compose variant/arch that ships it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComposeRpm {
    pub variant_arch_id: i64,
    pub rpm_id: i64,
    pub sigkey_id: Option<i64>,
    pub content_category_id: i64,
    pub path_id: i64,
}

impl KeyedRow for ComposeRpm {
    fn table(&self) -> &'static str {
        "compose_rpms"
    }

    fn key_description(&self) -> String {
        format!("variant_arch={} rpm={}", self.variant_arch_id, self.rpm_id)
    }

    fn insert_row(&self, conn: &Connection) -> rusqlite::Result<i64> {
        conn.execute(
            "INSERT INTO compose_rpms (variant_arch_id, rpm_id, sigkey_id, content_category_id, path_id)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                self.variant_arch_id,
                self.rpm_id,
                self.sigkey_id,
                self.content_category_id,
                self.path_id,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn find_id(&self, conn: &Connection) -> rusqlite::Result<Option<i64>> {
        conn.query_row(
            "SELECT id FROM compose_rpms WHERE variant_arch_id = ?1 AND rpm_id = ?2",
            params![self.variant_arch_id, self.rpm_id],
            |row| row.get(0),
        )
        .optional()
    }
}
