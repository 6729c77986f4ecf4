// src/mapping/service.rs

//! Read, replace and patch operations on a package's RPM mapping
//!
//! Each call is one request: it opens its own loader, reads override rules
//! fresh from storage and keeps nothing afterwards.

use super::apply::{AppliedChange, apply_changes};
use super::diff::compute_changes;
use super::loader::RawMappingLoader;
use super::reconcile::{Reconciliation, cleanup_stale, reconcile};
use super::validate::{check_references, parse_changes, parse_target};
use super::{Change, ChangeAction, EffectiveMapping, PureMapping, VariantArchKey};
use crate::audit::AuditSink;
use crate::config::MappingConfig;
use crate::db::models::{Compose, OverrideRule, Release};
use crate::error::Result;
use rusqlite::Connection;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Which mapping a request addresses
#[derive(Debug, Clone, Copy)]
pub struct MappingRequest<'a> {
    pub compose_id: &'a str,
    pub package: &'a str,
    /// Release whose topology and overrides apply; defaults to the
    /// release the compose was built for
    pub release_id: Option<&'a str>,
}

impl<'a> MappingRequest<'a> {
    pub fn new(compose_id: &'a str, package: &'a str) -> Self {
        Self {
            compose_id,
            package,
            release_id: None,
        }
    }

    pub fn with_release(mut self, release_id: Option<&'a str>) -> Self {
        self.release_id = release_id;
        self
    }
}

/// Effective mapping with provenance, plus the protected rules that have
/// no effect on it
#[derive(Debug, Clone, Serialize)]
pub struct MappingDetail {
    pub mapping: EffectiveMapping,
    #[serde(serialize_with = "serialize_rules")]
    pub useless_overrides: Vec<OverrideRule>,
}

fn serialize_rules<S: serde::Serializer>(
    rules: &[OverrideRule],
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_seq(rules.iter().map(OverrideRule::export))
}

/// Facade over loader, reconciler, differ and applier
#[derive(Debug, Clone, Copy)]
pub struct MappingService {
    cleanup_useless: bool,
}

impl Default for MappingService {
    fn default() -> Self {
        Self {
            cleanup_useless: true,
        }
    }
}

impl MappingService {
    /// With `cleanup_useless` off, reads never delete ineffective rules
    pub fn new(cleanup_useless: bool) -> Self {
        Self { cleanup_useless }
    }

    pub fn from_config(config: &MappingConfig) -> Self {
        Self::new(config.cleanup_useless)
    }

    pub fn cleanup_useless(&self) -> bool {
        self.cleanup_useless
    }

    /// Included packages of the mapping; raw compose contents when
    /// `disable_overrides` is set
    pub fn get(
        &self,
        conn: &Connection,
        request: MappingRequest<'_>,
        disable_overrides: bool,
    ) -> Result<PureMapping> {
        Ok(self.detail(conn, request, disable_overrides)?.mapping.to_pure())
    }

    /// The mapping with provenance and the useless override list
    pub fn detail(
        &self,
        conn: &Connection,
        request: MappingRequest<'_>,
        disable_overrides: bool,
    ) -> Result<MappingDetail> {
        let (compose, release) = resolve(conn, request)?;
        let mut loader = RawMappingLoader::new(conn);
        let raw = loader.load(&release, &compose, request.package)?;

        if disable_overrides {
            return Ok(MappingDetail {
                mapping: raw,
                useless_overrides: Vec::new(),
            });
        }

        let reconciled = self.reconcile_stored(conn, &release, request.package, &raw)?;
        Ok(MappingDetail {
            mapping: reconciled.mapping,
            useless_overrides: reconciled.useless,
        })
    }

    /// Changes turning the current mapping into `target`, persisted when
    /// `perform` is set
    pub fn put(
        &self,
        conn: &mut Connection,
        request: MappingRequest<'_>,
        target: &Value,
        perform: bool,
        audit: &mut dyn AuditSink,
    ) -> Result<Vec<Change>> {
        let target = parse_target(target)?;

        let (changes, release) = {
            let conn: &Connection = conn;
            let (compose, release) = resolve(conn, request)?;
            let mut loader = RawMappingLoader::new(conn);
            check_references(loader.topology(&release)?, target.variant_arches())?;

            let raw = loader.load(&release, &compose, request.package)?;
            let current = self.reconcile_stored(conn, &release, request.package, &raw)?;
            let changes = compute_changes(
                &current.mapping,
                &target,
                &release.release_id,
                request.package,
            );
            (changes, release)
        };

        debug!(
            "Computed {} change(s) for {} in {}",
            changes.len(),
            request.package,
            request.compose_id
        );
        if perform && !changes.is_empty() {
            apply_changes(conn, &release, &changes, audit)?;
        }
        Ok(changes)
    }

    /// Apply client-supplied changes
    ///
    /// The whole payload is validated before anything is written.
    pub fn patch(
        &self,
        conn: &mut Connection,
        request: MappingRequest<'_>,
        payload: &Value,
        audit: &mut dyn AuditSink,
    ) -> Result<Vec<AppliedChange>> {
        let (_, release) = resolve(conn, request)?;
        let changes = parse_changes(payload, &release.release_id)?;

        let topology = RawMappingLoader::new(conn).topology(&release)?.clone();
        check_change_references(conn, &release, &topology, &changes)?;

        apply_changes(conn, &release, &changes, audit)
    }

    /// Reconcile stored rules of `package` over `raw`, cleaning up stale
    /// rules when enabled
    fn reconcile_stored(
        &self,
        conn: &Connection,
        release: &Release,
        package: &str,
        raw: &EffectiveMapping,
    ) -> Result<Reconciliation> {
        let overrides = OverrideRule::list_for_release(conn, release, Some(package))?;
        let reconciled = reconcile(raw, &overrides);

        if self.cleanup_useless && !reconciled.stale.is_empty() {
            let removed = cleanup_stale(conn, &reconciled.stale);
            info!(
                "Removed {} of {} ineffective override(s) for {}",
                removed,
                reconciled.stale.len(),
                package
            );
        }
        Ok(reconciled)
    }
}

/// Compose and release a request addresses
fn resolve(conn: &Connection, request: MappingRequest<'_>) -> Result<(Compose, Release)> {
    let compose = Compose::get(conn, request.compose_id)?;
    let release = match request.release_id {
        Some(release_id) => Release::get(conn, release_id)?,
        None => compose.release(conn)?,
    };
    Ok((compose, release))
}

/// Every change must address a declared variant/arch, except deletes of
/// rules that already exist there
fn check_change_references(
    conn: &Connection,
    release: &Release,
    topology: &BTreeSet<VariantArchKey>,
    changes: &[Change],
) -> Result<()> {
    let mut pairs = Vec::new();
    for change in changes {
        let pair = change.key().variant_arch();
        if topology.contains(&pair) {
            continue;
        }
        if change.action == ChangeAction::Delete {
            let key = OverrideRule::new(
                release,
                &change.variant,
                &change.arch,
                &change.srpm_name,
                &change.rpm_name,
                &change.rpm_arch,
            )?;
            if OverrideRule::find_by_key(conn, &key)?.is_some() {
                continue;
            }
        }
        pairs.push(pair);
    }
    check_references(topology, pairs)
}
