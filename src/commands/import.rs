// src/commands/import.rs

//! Compose manifest import command

use super::open_db;
use anyhow::{Context, Result};
use rpmmap::audit::ChangesetRecorder;
use rpmmap::config::Config;
use rpmmap::import::{ComposeManifest, import_rpms};
use std::path::Path;

/// Import a compose RPM manifest for `release_id`
pub fn cmd_import(config: &Config, release_id: &str, manifest: &Path, author: &str) -> Result<()> {
    let parsed = ComposeManifest::load(manifest)
        .with_context(|| format!("Failed to load manifest {}", manifest.display()))?;

    let mut conn = open_db(config)?;
    let mut recorder =
        ChangesetRecorder::new(author, Some(format!("import {}", parsed.compose.id)));
    let summary = import_rpms(&mut conn, release_id, &parsed, &mut recorder)?;

    println!(
        "Compose {} {}: {} variant(s) new, {} RPM(s) linked, {} new",
        summary.compose_id,
        if summary.compose_created { "imported" } else { "already known" },
        summary.variants_created,
        summary.linked_rpms,
        summary.new_links
    );
    Ok(())
}
