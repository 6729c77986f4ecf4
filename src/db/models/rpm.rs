// src/db/models/rpm.rs

//! RPM identity model - one row per NEVRA, immutable once created

use crate::db::upsert::KeyedRow;
use crate::error::{Error, Result};
use crate::nevra::Nevra;
use rusqlite::{Connection, OptionalExtension, Row, params};

/// An RPM package identity
///
/// Uniquely keyed by (name, epoch, version, release, arch). Rows are only
/// ever created through [`crate::db::upsert`], never updated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rpm {
    pub id: Option<i64>,
    pub name: String,
    pub epoch: i64,
    pub version: String,
    pub release: String,
    pub arch: String,
    /// Name of the source package this RPM was built from
    pub srpm_name: String,
    /// Source NEVRA; empty exactly when this is itself a source package
    pub srpm_nevra: Option<String>,
    pub filename: String,
}

impl Rpm {
    /// Build an identity from a binary or source NEVRA
    ///
    /// A source package must not name a source NEVRA, and every other
    /// package must.
    pub fn from_nevra(nevra: &Nevra, srpm: Option<&Nevra>, filename: String) -> Result<Self> {
        if nevra.is_source() == srpm.is_some() {
            return Err(Error::ParseError(format!(
                "{nevra}: srpm_nevra should be empty if and only if arch is src"
            )));
        }

        let srpm_name = srpm.map_or_else(|| nevra.name.clone(), |s| s.name.clone());
        Ok(Self {
            id: None,
            name: nevra.name.clone(),
            epoch: nevra.epoch,
            version: nevra.version.clone(),
            release: nevra.release.clone(),
            arch: nevra.arch.clone(),
            srpm_name,
            srpm_nevra: srpm.map(|s| s.to_string()),
            filename,
        })
    }

    pub fn nevra(&self) -> String {
        format!(
            "{}-{}:{}-{}.{}",
            self.name, self.epoch, self.version, self.release, self.arch
        )
    }

    /// Find an RPM by database ID
    pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, name, epoch, version, release, arch, srpm_name, srpm_nevra, filename
             FROM rpms WHERE id = ?1",
        )?;
        let rpm = stmt.query_row([id], Self::from_row).optional()?;
        Ok(rpm)
    }

    /// All RPMs built from the given source package
    pub fn find_by_srpm_name(conn: &Connection, srpm_name: &str) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, name, epoch, version, release, arch, srpm_name, srpm_nevra, filename
             FROM rpms WHERE srpm_name = ?1 ORDER BY name, epoch, version, release, arch",
        )?;
        let rpms = stmt
            .query_map([srpm_name], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rpms)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            name: row.get(1)?,
            epoch: row.get(2)?,
            version: row.get(3)?,
            release: row.get(4)?,
            arch: row.get(5)?,
            srpm_name: row.get(6)?,
            srpm_nevra: row.get(7)?,
            filename: row.get(8)?,
        })
    }
}

impl KeyedRow for Rpm {
    fn table(&self) -> &'static str {
        "rpms"
    }

    fn key_description(&self) -> String {
        self.nevra()
    }

    fn insert_row(&self, conn: &Connection) -> rusqlite::Result<i64> {
        conn.execute(
            "INSERT INTO rpms (name, epoch, version, release, arch, srpm_name, srpm_nevra, filename)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                &self.name,
                self.epoch,
                &self.version,
                &self.release,
                &self.arch,
                &self.srpm_name,
                &self.srpm_nevra,
                &self.filename,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn find_id(&self, conn: &Connection) -> rusqlite::Result<Option<i64>> {
        conn.query_row(
            "SELECT id FROM rpms
             WHERE name = ?1 AND epoch = ?2 AND version = ?3 AND release = ?4 AND arch = ?5",
            params![&self.name, self.epoch, &self.version, &self.release, &self.arch],
            |row| row.get(0),
        )
        .optional()
    }
}
