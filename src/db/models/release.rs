// src/db/models/release.rs

//! Release topology - releases and the variant/arch layout they declare

use crate::db::upsert::{self, IdCache, KeyedRow, LookupTable};
use crate::error::{Error, Result};
use crate::mapping::VariantArchKey;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::collections::BTreeSet;

/// A product release that composes are built for and overrides belong to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    pub id: Option<i64>,
    /// Public identifier, e.g. `rhel-9.4`
    pub release_id: String,
    pub short: String,
    pub version: String,
    pub name: String,
    pub active: bool,
}

impl Release {
    pub fn new(release_id: String, short: String, version: String, name: String) -> Self {
        Self {
            id: None,
            release_id,
            short,
            version,
            name,
            active: true,
        }
    }

    /// Build a release from its identifier alone, splitting `short-version`
    pub fn from_release_id(release_id: &str) -> Self {
        let (short, version) = release_id
            .rsplit_once('-')
            .unwrap_or((release_id, ""));
        Self::new(
            release_id.to_string(),
            short.to_string(),
            version.to_string(),
            release_id.to_string(),
        )
    }

    /// Insert this release into the database
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO releases (release_id, short, version, name, active)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                &self.release_id,
                &self.short,
                &self.version,
                &self.name,
                self.active,
            ],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// Find a release by database ID
    pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, release_id, short, version, name, active FROM releases WHERE id = ?1",
        )?;
        let release = stmt.query_row([id], Self::from_row).optional()?;
        Ok(release)
    }

    /// Find a release by its public identifier
    pub fn find_by_release_id(conn: &Connection, release_id: &str) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, release_id, short, version, name, active FROM releases WHERE release_id = ?1",
        )?;
        let release = stmt.query_row([release_id], Self::from_row).optional()?;
        Ok(release)
    }

    /// Like [`Release::find_by_release_id`], but a missing release is an error
    pub fn get(conn: &Connection, release_id: &str) -> Result<Self> {
        Self::find_by_release_id(conn, release_id)?
            .ok_or_else(|| Error::NotFoundError(format!("release {release_id}")))
    }

    /// List all releases
    pub fn list_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, release_id, short, version, name, active FROM releases ORDER BY release_id",
        )?;
        let releases = stmt
            .query_map([], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(releases)
    }

    /// Database ID, or an error for a release that was never stored
    pub fn pk(&self) -> Result<i64> {
        self.id.ok_or_else(|| {
            Error::InitError(format!("release {} has not been saved", self.release_id))
        })
    }

    /// All variants declared for this release, ordered by UID
    pub fn variants(&self, conn: &Connection) -> Result<Vec<ReleaseVariant>> {
        let mut stmt = conn.prepare(
            "SELECT id, release_id, variant_uid, variant_id, variant_name, variant_type
             FROM release_variants WHERE release_id = ?1 ORDER BY variant_uid",
        )?;
        let variants = stmt
            .query_map([self.pk()?], ReleaseVariant::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(variants)
    }

    /// The release's current variant/arch layout
    pub fn variant_arches(&self, conn: &Connection) -> Result<BTreeSet<VariantArchKey>> {
        let mut stmt = conn.prepare(
            "SELECT rv.variant_uid, a.name
             FROM release_variant_arches rva
             JOIN release_variants rv ON rv.id = rva.variant_id
             JOIN arches a ON a.id = rva.arch_id
             WHERE rv.release_id = ?1",
        )?;
        let pairs = stmt
            .query_map([self.pk()?], |row| {
                Ok(VariantArchKey::new(
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                ))
            })?
            .collect::<std::result::Result<BTreeSet<_>, _>>()?;
        Ok(pairs)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            release_id: row.get(1)?,
            short: row.get(2)?,
            version: row.get(3)?,
            name: row.get(4)?,
            active: row.get(5)?,
        })
    }
}

/// A variant declared in a release's current layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseVariant {
    pub id: Option<i64>,
    pub release_id: i64,
    pub variant_uid: String,
    pub variant_id: String,
    pub variant_name: String,
    pub variant_type: String,
}

impl ReleaseVariant {
    pub fn new(release_id: i64, variant_uid: String) -> Self {
        Self {
            id: None,
            release_id,
            variant_id: variant_uid.clone(),
            variant_name: variant_uid.clone(),
            variant_uid,
            variant_type: "variant".to_string(),
        }
    }

    /// Store the variant, reusing an existing row with the same UID
    pub fn save(&mut self, conn: &Connection) -> Result<i64> {
        let id = upsert::upsert(conn, self)?;
        self.id = Some(id);
        Ok(id)
    }

    /// Declare `arch` for this variant; declaring it twice is a no-op
    pub fn add_arch(&self, conn: &Connection, cache: &mut IdCache, arch: &str) -> Result<()> {
        let variant_id = self.id.ok_or_else(|| {
            Error::InitError(format!("variant {} has not been saved", self.variant_uid))
        })?;
        let arch_id = cache.lookup_id(conn, LookupTable::Arch, arch)?;
        conn.execute(
            "INSERT OR IGNORE INTO release_variant_arches (variant_id, arch_id) VALUES (?1, ?2)",
            params![variant_id, arch_id],
        )?;
        Ok(())
    }

    /// Arches declared for this variant, sorted
    pub fn arches(&self, conn: &Connection) -> Result<Vec<String>> {
        let mut stmt = conn.prepare(
            "SELECT a.name FROM release_variant_arches rva
             JOIN arches a ON a.id = rva.arch_id
             WHERE rva.variant_id = ?1 ORDER BY a.name",
        )?;
        let arches = stmt
            .query_map([self.id], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(arches)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            release_id: row.get(1)?,
            variant_uid: row.get(2)?,
            variant_id: row.get(3)?,
            variant_name: row.get(4)?,
            variant_type: row.get(5)?,
        })
    }
}

impl KeyedRow for ReleaseVariant {
    fn table(&self) -> &'static str {
        "release_variants"
    }

    fn key_description(&self) -> String {
        format!("{}/{}", self.release_id, self.variant_uid)
    }

    fn insert_row(&self, conn: &Connection) -> rusqlite::Result<i64> {
        conn.execute(
            "INSERT INTO release_variants (release_id, variant_uid, variant_id, variant_name, variant_type)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                self.release_id,
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
            "SELECT id FROM release_variants WHERE release_id = ?1 AND variant_uid = ?2",
            params![self.release_id, &self.variant_uid],
            |row| row.get(0),
        )
        .optional()
    }
}
