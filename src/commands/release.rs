// src/commands/release.rs

//! Release topology commands

use super::open_db;
use anyhow::Result;
use rpmmap::config::Config;
use rpmmap::db::models::{Compose, Release, ReleaseVariant};
use rpmmap::db::{self, IdCache};
use tracing::info;

/// Create a release
pub fn cmd_release_create(
    config: &Config,
    release_id: &str,
    short: Option<&str>,
    version: Option<&str>,
    name: Option<&str>,
) -> Result<()> {
    let conn = open_db(config)?;

    if let Some(existing) = Release::find_by_release_id(&conn, release_id)? {
        println!(
            "Release '{}' already exists (id={})",
            release_id,
            existing.id.unwrap_or(0)
        );
        return Ok(());
    }

    let mut release = Release::from_release_id(release_id);
    if let Some(short) = short {
        release.short = short.to_string();
    }
    if let Some(version) = version {
        release.version = version.to_string();
    }
    if let Some(name) = name {
        release.name = name.to_string();
    }
    let id = release.insert(&conn)?;

    info!("Created release {} (id={})", release_id, id);
    println!("Created release '{}'", release_id);
    Ok(())
}

/// Declare a variant and its arches
pub fn cmd_release_add_variant(
    config: &Config,
    release_id: &str,
    variant_uid: &str,
    arches: &[String],
    name: Option<&str>,
    variant_type: &str,
) -> Result<()> {
    let mut conn = open_db(config)?;

    db::transaction(&mut conn, |tx| {
        let release = Release::get(tx, release_id)?;
        let mut variant = ReleaseVariant::new(release.pk()?, variant_uid.to_string());
        if let Some(name) = name {
            variant.variant_name = name.to_string();
        }
        variant.variant_type = variant_type.to_string();
        variant.save(tx)?;

        let mut cache = IdCache::new();
        for arch in arches {
            variant.add_arch(tx, &mut cache, arch)?;
        }
        Ok(())
    })?;

    println!(
        "{}: {} ships for {}",
        release_id,
        variant_uid,
        arches.join(", ")
    );
    Ok(())
}

/// List releases with their variant/arch layout and imported composes
pub fn cmd_release_list(config: &Config) -> Result<()> {
    let conn = open_db(config)?;
    let releases = Release::list_all(&conn)?;

    if releases.is_empty() {
        println!("No releases defined.");
        println!("\nUse 'rpmmap release create <release_id>' to add one.");
        return Ok(());
    }

    for release in &releases {
        let status = if release.active { "" } else { " (inactive)" };
        println!("{} - {}{}", release.release_id, release.name, status);
        for variant in release.variants(&conn)? {
            println!("  {}: {}", variant.variant_uid, variant.arches(&conn)?.join(" "));
        }
        for compose in Compose::list_for_release(&conn, release.pk()?)? {
            let layout: Vec<String> = compose
                .variants(&conn)?
                .iter()
                .map(|v| Ok(format!("{}[{}]", v.variant_uid, v.arches(&conn)?.join(","))))
                .collect::<rpmmap::Result<_>>()?;
            println!(
                "  compose {} ({}, {}): {} RPM(s) in {}",
                compose.compose_id,
                compose.compose_date,
                compose.compose_type,
                compose.rpm_count(&conn)?,
                layout.join(" ")
            );
        }
    }
    Ok(())
}
