// src/import.rs

//! Importing compose RPM manifests
//!
//! A manifest lists, per variant and arch, the source packages of a
//! compose and the RPMs built from each, with where they sit and how they
//! are signed. Importing it records the compose layout, the RPM identities
//! and the package-at-location links in one transaction. Re-importing the
//! same manifest stores nothing and records no audit entry.

use crate::audit::{AuditSink, ENTITY_COMPOSE, ENTITY_NOTICE, ENTITY_VARIANT};
use crate::db::models::{Compose, ComposeRpm, ComposeVariant, Release, Rpm};
use crate::db::upsert::{self, IdCache, LookupTable};
use crate::db;
use crate::error::{Error, Result};
use crate::nevra::Nevra;
use chrono::NaiveDate;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::io::BufReader;
use std::path::Path;
use tracing::{debug, info};

/// `rpms[variant][arch][srpm_nevra][rpm_nevra]`
pub type RpmTree = BTreeMap<String, BTreeMap<String, BTreeMap<String, BTreeMap<String, RpmEntry>>>>;

/// A compose RPM manifest
#[derive(Debug, Clone, Deserialize)]
pub struct ComposeManifest {
    pub compose: ComposeInfo,
    #[serde(default)]
    pub variants: Vec<VariantInfo>,
    #[serde(default)]
    pub rpms: RpmTree,
}

/// Compose identity as recorded in the manifest
#[derive(Debug, Clone, Deserialize)]
pub struct ComposeInfo {
    pub id: String,
    /// `YYYYMMDD`
    pub date: String,
    #[serde(rename = "type")]
    pub compose_type: String,
    #[serde(default)]
    pub respin: i64,
    #[serde(default)]
    pub label: Option<String>,
}

/// A variant of the compose and the arches it was built for
#[derive(Debug, Clone, Deserialize)]
pub struct VariantInfo {
    pub uid: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type", default)]
    pub variant_type: Option<String>,
    #[serde(default)]
    pub arches: Vec<String>,
}

/// Location and signature of one RPM
#[derive(Debug, Clone, Deserialize)]
pub struct RpmEntry {
    /// Path relative to the compose root, file name included
    pub path: String,
    #[serde(default)]
    pub sigkey: Option<String>,
    pub category: String,
}

impl ComposeManifest {
    /// Read a manifest from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let manifest = serde_json::from_reader(BufReader::new(file))?;
        Ok(manifest)
    }

    /// Compose date as stored, `YYYY-MM-DD`
    pub fn compose_date(&self) -> Result<String> {
        let date = NaiveDate::parse_from_str(&self.compose.date, "%Y%m%d").map_err(|e| {
            Error::ParseError(format!("Invalid compose date {}: {e}", self.compose.date))
        })?;
        Ok(date.format("%Y-%m-%d").to_string())
    }
}

/// What an import did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub compose_id: String,
    pub compose_created: bool,
    pub variants_created: usize,
    /// RPM entries processed, links that already existed included
    pub linked_rpms: usize,
    /// Links stored by this import for the first time
    pub new_links: usize,
}

impl ImportSummary {
    /// Whether the import stored anything
    pub fn changed(&self) -> bool {
        self.compose_created || self.variants_created > 0 || self.new_links > 0
    }
}

/// Import `manifest` as a compose of `release_id`
pub fn import_rpms(
    conn: &mut Connection,
    release_id: &str,
    manifest: &ComposeManifest,
    audit: &mut dyn AuditSink,
) -> Result<ImportSummary> {
    let compose_date = manifest.compose_date()?;

    let summary = db::transaction(conn, |tx| {
        let release = Release::get(tx, release_id)?;
        let mut cache = IdCache::new();
        let mut summary = ImportSummary {
            compose_id: manifest.compose.id.clone(),
            ..Default::default()
        };

        let compose = store_compose(tx, &release, manifest, compose_date, audit, &mut summary)?;

        for info in &manifest.variants {
            let variant = store_variant(tx, &compose, info, audit, &mut summary)?;
            let Some(by_arch) = manifest.rpms.get(&info.uid) else {
                continue;
            };

            for arch in &info.arches {
                let slot = variant.arch_slot(tx, &mut cache, arch)?;
                let Some(by_source) = by_arch.get(arch) else {
                    continue;
                };
                for (srpm_nevra, rpms) in by_source {
                    let srpm: Nevra = srpm_nevra.parse()?;
                    for (rpm_nevra, entry) in rpms {
                        if link_rpm(tx, &mut cache, slot, &srpm, rpm_nevra, entry)? {
                            summary.new_links += 1;
                        }
                        summary.linked_rpms += 1;
                    }
                }
            }
        }

        for (uid, by_arch) in &manifest.rpms {
            for arch in by_arch.keys() {
                let declared = manifest
                    .variants
                    .iter()
                    .any(|v| &v.uid == uid && v.arches.contains(arch));
                if !declared {
                    debug!("Ignoring RPMs of undeclared {}.{}", uid, arch);
                }
            }
        }

        if summary.changed() {
            audit.record(
                tx,
                ENTITY_NOTICE,
                0,
                None,
                Some(&json!({
                    "compose": compose.compose_id,
                    "num_linked_rpms": summary.linked_rpms,
                })),
            )?;
        } else {
            debug!("Compose {} already fully imported", compose.compose_id);
        }

        debug!(
            "Lookup cache: {} hit(s), {} miss(es)",
            cache.hits(),
            cache.misses()
        );
        Ok(summary)
    })?;

    info!(
        "Imported compose {} into {}: {} RPM(s) linked, {} new",
        summary.compose_id, release_id, summary.linked_rpms, summary.new_links
    );
    Ok(summary)
}

fn store_compose(
    conn: &Connection,
    release: &Release,
    manifest: &ComposeManifest,
    compose_date: String,
    audit: &mut dyn AuditSink,
    summary: &mut ImportSummary,
) -> Result<Compose> {
    let info = &manifest.compose;
    let mut compose = Compose::new(
        info.id.clone(),
        release.pk()?,
        compose_date,
        info.compose_type.clone(),
        info.respin,
    );
    compose.compose_label = info.label.clone().filter(|l| !l.is_empty());

    let upserted = upsert::upsert_tracked(conn, &compose)?;
    if !upserted.created {
        let existing = Compose::get(conn, &info.id)?;
        if existing.release_id != compose.release_id {
            return Err(Error::UnknownReferenceError(format!(
                "compose {} was imported for another release",
                info.id
            )));
        }
        return Ok(existing);
    }

    compose.id = Some(upserted.id);
    summary.compose_created = true;
    audit.record(
        conn,
        ENTITY_COMPOSE,
        upserted.id,
        None,
        Some(&json!({
            "compose_id": compose.compose_id,
            "release_id": release.release_id,
            "compose_date": compose.compose_date,
            "compose_type": compose.compose_type,
            "compose_respin": compose.compose_respin,
            "compose_label": compose.compose_label,
        })),
    )?;
    Ok(compose)
}

fn store_variant(
    conn: &Connection,
    compose: &Compose,
    info: &VariantInfo,
    audit: &mut dyn AuditSink,
    summary: &mut ImportSummary,
) -> Result<ComposeVariant> {
    let mut variant = ComposeVariant::new(compose.pk()?, info.uid.clone());
    if let Some(id) = &info.id {
        variant.variant_id = id.clone();
    }
    if let Some(name) = &info.name {
        variant.variant_name = name.clone();
    }
    if let Some(variant_type) = &info.variant_type {
        variant.variant_type = variant_type.clone();
    }

    let upserted = upsert::upsert_tracked(conn, &variant)?;
    variant.id = Some(upserted.id);
    if upserted.created {
        summary.variants_created += 1;
        audit.record(
            conn,
            ENTITY_VARIANT,
            upserted.id,
            None,
            Some(&json!({
                "compose": compose.compose_id,
                "variant_uid": variant.variant_uid,
                "variant_id": variant.variant_id,
                "variant_name": variant.variant_name,
                "variant_type": variant.variant_type,
            })),
        )?;
    }
    Ok(variant)
}

/// Link one RPM into a variant/arch slot, returning whether the link is new
fn link_rpm(
    conn: &Connection,
    cache: &mut IdCache,
    variant_arch_id: i64,
    srpm: &Nevra,
    rpm_nevra: &str,
    entry: &RpmEntry,
) -> Result<bool> {
    let nevra: Nevra = rpm_nevra.parse()?;
    let (dir, filename) = entry.path.rsplit_once('/').unwrap_or(("", entry.path.as_str()));

    let source = (!nevra.is_source()).then_some(srpm);
    let rpm = Rpm::from_nevra(&nevra, source, filename.to_string())?;

    let sigkey_id = match entry.sigkey.as_deref() {
        Some(key) if !key.is_empty() => Some(cache.lookup_id(conn, LookupTable::SigKey, key)?),
        _ => None,
    };

    let link = ComposeRpm {
        variant_arch_id,
        rpm_id: cache.keyed_id(conn, &rpm)?,
        sigkey_id,
        content_category_id: cache.lookup_id(conn, LookupTable::ContentCategory, &entry.category)?,
        path_id: cache.lookup_id(conn, LookupTable::Path, dir)?,
    };
    Ok(upsert::upsert_tracked(conn, &link)?.created)
}
