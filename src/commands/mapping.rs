// src/commands/mapping.rs

//! Package mapping commands
//!
//! Mappings and change lists are printed as JSON on stdout; log output
//! goes to stderr.

use super::{open_db, print_json, read_json};
use anyhow::Result;
use rpmmap::audit::ChangesetRecorder;
use rpmmap::config::Config;
use rpmmap::mapping::{MappingRequest, MappingService};
use std::path::Path;
use tracing::info;

/// Print the mapping of `package` in `compose_id`
pub fn cmd_mapping_show(
    config: &Config,
    request: MappingRequest<'_>,
    disable_overrides: bool,
    detail: bool,
) -> Result<()> {
    let conn = open_db(config)?;
    let service = MappingService::from_config(&config.mapping);

    if detail {
        print_json(&service.detail(&conn, request, disable_overrides)?)
    } else {
        print_json(&service.get(&conn, request, disable_overrides)?)
    }
}

/// Compute the changes towards a target mapping, applying them with
/// `perform`
pub fn cmd_mapping_update(
    config: &Config,
    request: MappingRequest<'_>,
    target: &Path,
    perform: bool,
    author: &str,
    comment: Option<String>,
) -> Result<()> {
    let target = read_json(target)?;
    let mut conn = open_db(config)?;
    let service = MappingService::from_config(&config.mapping);
    let mut recorder = ChangesetRecorder::new(author, comment);

    let changes = service.put(&mut conn, request, &target, perform, &mut recorder)?;
    print_json(&changes)?;

    match recorder.changeset_id() {
        Some(id) if perform => info!(
            "Applied {} change(s) to {} in changeset {}",
            changes.len(),
            request.package,
            id
        ),
        _ if perform => info!("Mapping of {} already matches the target", request.package),
        _ => info!(
            "Dry run: {} change(s) not applied, pass --perform to apply",
            changes.len()
        ),
    }
    Ok(())
}

/// Apply a change list
pub fn cmd_mapping_patch(
    config: &Config,
    request: MappingRequest<'_>,
    changes: &Path,
    author: &str,
    comment: Option<String>,
) -> Result<()> {
    let payload = read_json(changes)?;
    let mut conn = open_db(config)?;
    let service = MappingService::from_config(&config.mapping);
    let mut recorder = ChangesetRecorder::new(author, comment);

    let applied = service.patch(&mut conn, request, &payload, &mut recorder)?;
    print_json(&applied)?;

    if let Some(id) = recorder.changeset_id() {
        info!("Recorded {} change(s) in changeset {}", recorder.recorded(), id);
    }
    Ok(())
}
