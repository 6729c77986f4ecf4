// src/mapping/loader.rs

//! Building the raw mapping from stored compose contents

use super::{EntryKey, RawMapping, VariantArchKey};
use crate::db::models::{Compose, Release};
use crate::error::Result;
use rusqlite::Connection;
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// Loads raw mappings for one request
///
/// Release topologies are read once per loader and kept for its lifetime.
/// Create a new loader per request; nothing is shared between loaders.
pub struct RawMappingLoader<'a> {
    conn: &'a Connection,
    topologies: HashMap<i64, BTreeSet<VariantArchKey>>,
}

impl<'a> RawMappingLoader<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self {
            conn,
            topologies: HashMap::new(),
        }
    }

    /// Variant/arch pairs currently declared for `release`
    pub fn topology(&mut self, release: &Release) -> Result<&BTreeSet<VariantArchKey>> {
        let pk = release.pk()?;
        if !self.topologies.contains_key(&pk) {
            let pairs = release.variant_arches(self.conn)?;
            debug!(
                "Loaded {} variant/arch pair(s) of release {}",
                pairs.len(),
                release.release_id
            );
            self.topologies.insert(pk, pairs);
        }
        Ok(&self.topologies[&pk])
    }

    /// Raw mapping of the RPMs built from `package` in `compose`
    ///
    /// Only locations whose variant/arch is still declared for `release`
    /// are kept. Every entry is original.
    pub fn load(&mut self, release: &Release, compose: &Compose, package: &str) -> Result<RawMapping> {
        let conn = self.conn;
        let locations = compose.package_locations(conn, package)?;
        let topology = self.topology(release)?;

        let mut mapping = RawMapping::new();
        for location in locations {
            let pair = VariantArchKey::new(location.variant.as_str(), location.arch.as_str());
            if !topology.contains(&pair) {
                debug!(
                    "Skipping {}.{} at {}: not in release {}",
                    location.rpm_name, location.rpm_arch, pair, release.release_id
                );
                continue;
            }
            mapping.add_original(EntryKey::new(
                location.variant,
                location.arch,
                location.rpm_name,
                location.rpm_arch,
            ));
        }

        debug!(
            "Loaded {} raw entr(ies) for {} in {}",
            mapping.len(),
            package,
            compose.compose_id
        );
        Ok(mapping)
    }
}
