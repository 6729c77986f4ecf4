// src/mapping/mod.rs

//! RPM-to-variant/arch mapping reconciliation
//!
//! A compose import records which RPMs of a source package ship at which
//! variant/arch of the compose. Release-scoped override rules then add or
//! suppress individual RPMs. This module holds the mapping types shared by
//! the stages built on top of them:
//!
//! - [`loader`] builds the raw mapping from stored compose contents
//! - [`reconcile`] layers override rules over it
//! - [`diff`] computes the rule changes that turn one mapping into another
//! - [`apply`] persists those changes with an audit trail
//! - [`validate`] turns client payloads into typed changes and targets
//! - [`service`] exposes read, replace and patch as one facade
//!
//! Iteration over every mapping type follows [`EntryKey`] order: variant,
//! then arch, then rpm name, then rpm arch, each compared as plain strings.

pub mod apply;
pub mod diff;
pub mod loader;
pub mod reconcile;
pub mod service;
pub mod validate;

use serde::ser::{SerializeStruct, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

pub use apply::{AppliedChange, apply_changes, apply_in_transaction, clear_overrides};
pub use diff::compute_changes;
pub use loader::RawMappingLoader;
pub use reconcile::{Reconciliation, cleanup_stale, reconcile};
pub use service::{MappingDetail, MappingRequest, MappingService};

/// A coordinate in a compose or release layout
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VariantArchKey {
    pub variant: String,
    pub arch: String,
}

impl VariantArchKey {
    pub fn new(variant: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            variant: variant.into(),
            arch: arch.into(),
        }
    }
}

impl fmt::Display for VariantArchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.variant, self.arch)
    }
}

/// Identity of one mapping entry
///
/// Field order is the ordering contract; do not reorder.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryKey {
    pub variant: String,
    pub arch: String,
    pub rpm_name: String,
    pub rpm_arch: String,
}

impl EntryKey {
    pub fn new(
        variant: impl Into<String>,
        arch: impl Into<String>,
        rpm_name: impl Into<String>,
        rpm_arch: impl Into<String>,
    ) -> Self {
        Self {
            variant: variant.into(),
            arch: arch.into(),
            rpm_name: rpm_name.into(),
            rpm_arch: rpm_arch.into(),
        }
    }

    pub fn variant_arch(&self) -> VariantArchKey {
        VariantArchKey::new(self.variant.clone(), self.arch.clone())
    }
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{} {}.{}",
            self.variant, self.arch, self.rpm_name, self.rpm_arch
        )
    }
}

/// Why an entry is in the mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Provenance {
    /// Imported from the compose, untouched by any override
    #[serde(rename = "orig")]
    Original,
    /// Added by an include override
    #[serde(rename = "create")]
    Created,
    /// Imported from the compose, suppressed by an exclude override
    #[serde(rename = "delete")]
    Deleted,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::Original => "orig",
            Provenance::Created => "create",
            Provenance::Deleted => "delete",
        }
    }

    /// Only suppressed entries are left out of the pure projection
    pub fn is_included(&self) -> bool {
        !matches!(self, Provenance::Deleted)
    }
}

/// One entry of a mapping, as handed out by [`RpmMapping::entries`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingEntry {
    key: EntryKey,
    provenance: Provenance,
}

impl MappingEntry {
    pub fn new(key: EntryKey, provenance: Provenance) -> Self {
        Self { key, provenance }
    }

    pub fn key(&self) -> &EntryKey {
        &self.key
    }

    pub fn provenance(&self) -> Provenance {
        self.provenance
    }

    pub fn included(&self) -> bool {
        self.provenance.is_included()
    }
}

impl Serialize for MappingEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("MappingEntry", 6)?;
        state.serialize_field("variant", &self.key.variant)?;
        state.serialize_field("arch", &self.key.arch)?;
        state.serialize_field("rpm_name", &self.key.rpm_name)?;
        state.serialize_field("rpm_arch", &self.key.rpm_arch)?;
        state.serialize_field("included", &self.included())?;
        state.serialize_field("override", &self.provenance)?;
        state.end()
    }
}

/// Mapping entries keyed by [`EntryKey`], at most one per key
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RpmMapping {
    entries: BTreeMap<EntryKey, Provenance>,
}

/// Mapping built from compose contents alone; every entry is original
pub type RawMapping = RpmMapping;

/// Mapping after override rules have been layered on
pub type EffectiveMapping = RpmMapping;

impl RpmMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an imported package, keeping any entry already present
    pub fn add_original(&mut self, key: EntryKey) {
        self.entries.entry(key).or_insert(Provenance::Original);
    }

    pub fn get(&self, key: &EntryKey) -> Option<Provenance> {
        self.entries.get(key).copied()
    }

    pub fn set(&mut self, key: EntryKey, provenance: Provenance) {
        self.entries.insert(key, provenance);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in key order
    pub fn iter(&self) -> impl Iterator<Item = (&EntryKey, Provenance)> {
        self.entries.iter().map(|(k, p)| (k, *p))
    }

    pub fn entries(&self) -> Vec<MappingEntry> {
        self.iter()
            .map(|(k, p)| MappingEntry::new(k.clone(), p))
            .collect()
    }

    /// Included entries only, provenance dropped
    pub fn to_pure(&self) -> PureMapping {
        let mut pure = PureMapping::new();
        for (key, provenance) in self.iter() {
            if provenance.is_included() {
                pure.insert(key);
            }
        }
        pure
    }
}

impl Serialize for RpmMapping {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.entries())
    }
}

/// `{variant: {arch: {rpm_name: [rpm_arch]}}}` listing included packages
///
/// This is both the read view of a mapping and the target a client
/// submits to replace it. Empty buckets carry no entries and are ignored
/// by comparison.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PureMapping(BTreeMap<String, BTreeMap<String, BTreeMap<String, BTreeSet<String>>>>);

/// Mapping a client wants the effective mapping to become
pub type TargetMapping = PureMapping;

impl PureMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &EntryKey) {
        self.0
            .entry(key.variant.clone())
            .or_default()
            .entry(key.arch.clone())
            .or_default()
            .entry(key.rpm_name.clone())
            .or_default()
            .insert(key.rpm_arch.clone());
    }

    pub fn contains(&self, key: &EntryKey) -> bool {
        self.0
            .get(&key.variant)
            .and_then(|arches| arches.get(&key.arch))
            .and_then(|names| names.get(&key.rpm_name))
            .is_some_and(|rpm_arches| rpm_arches.contains(&key.rpm_arch))
    }

    /// Every listed package in key order
    pub fn keys(&self) -> impl Iterator<Item = EntryKey> + '_ {
        self.0.iter().flat_map(|(variant, arches)| {
            arches.iter().flat_map(move |(arch, names)| {
                names.iter().flat_map(move |(rpm_name, rpm_arches)| {
                    rpm_arches
                        .iter()
                        .map(move |rpm_arch| EntryKey::new(variant, arch, rpm_name, rpm_arch))
                })
            })
        })
    }

    /// Variant/arch buckets that list at least one package
    pub fn variant_arches(&self) -> BTreeSet<VariantArchKey> {
        self.keys().map(|key| key.variant_arch()).collect()
    }

    pub fn len(&self) -> usize {
        self.keys().count()
    }

    pub fn is_empty(&self) -> bool {
        self.keys().next().is_none()
    }
}

impl PartialEq for PureMapping {
    fn eq(&self, other: &Self) -> bool {
        self.keys().eq(other.keys())
    }
}

impl Eq for PureMapping {}

impl FromIterator<EntryKey> for PureMapping {
    fn from_iter<I: IntoIterator<Item = EntryKey>>(iter: I) -> Self {
        let mut pure = PureMapping::new();
        for key in iter {
            pure.insert(&key);
        }
        pure
    }
}

/// Kind of override change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    Create,
    Delete,
}

impl ChangeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeAction::Create => "create",
            ChangeAction::Delete => "delete",
        }
    }
}

impl FromStr for ChangeAction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "create" => Ok(ChangeAction::Create),
            "delete" => Ok(ChangeAction::Delete),
            _ => Err(format!("Invalid action: {s}, expected create or delete")),
        }
    }
}

/// A change to the override rules of a release
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Change {
    #[serde(rename = "release_id")]
    pub release: String,
    pub srpm_name: String,
    pub action: ChangeAction,
    pub variant: String,
    pub arch: String,
    pub rpm_name: String,
    pub rpm_arch: String,
    /// Required for create. On delete, `None` means "flip the stored rule"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include: Option<bool>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub comment: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub do_not_delete: bool,
}

impl Change {
    /// A change with default comment and no protection
    pub fn staged(
        action: ChangeAction,
        release: &str,
        srpm_name: &str,
        key: &EntryKey,
        include: bool,
    ) -> Self {
        Self {
            release: release.to_string(),
            srpm_name: srpm_name.to_string(),
            action,
            variant: key.variant.clone(),
            arch: key.arch.clone(),
            rpm_name: key.rpm_name.clone(),
            rpm_arch: key.rpm_arch.clone(),
            include: Some(include),
            comment: String::new(),
            do_not_delete: false,
        }
    }

    pub fn key(&self) -> EntryKey {
        EntryKey::new(
            self.variant.clone(),
            self.arch.clone(),
            self.rpm_name.clone(),
            self.rpm_arch.clone(),
        )
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = match self.include {
            Some(true) => " +",
            Some(false) => " -",
            None => "",
        };
        write!(f, "{} {}{}", self.action.as_str(), self.key(), sign)
    }
}
