// src/lib.rs

//! rpmmap - RPM-to-variant/arch mapping reconciliation
//!
//! Tracks which binary RPMs of a source package ship in which variant and
//! architecture of a compose, and lets release engineers adjust that
//! mapping per release with override rules.
//!
//! # Architecture
//!
//! - Database-first: composes, releases and overrides live in SQLite
//! - Imports: compose manifests are ingested race-tolerantly ([`import`])
//! - Mappings: raw contents, overrides layered on top, diffs back to rules
//!   ([`mapping`])
//! - Changesets: every override mutation is audited ([`audit`])

pub mod audit;
pub mod config;
pub mod db;
mod error;
pub mod import;
pub mod mapping;
pub mod nevra;

pub use error::{Error, ErrorKind, FieldError, FieldErrors, Result};
pub use import::{ComposeManifest, ImportSummary, import_rpms};
pub use mapping::{
    Change, ChangeAction, EffectiveMapping, EntryKey, MappingRequest, MappingService,
    PureMapping, VariantArchKey,
};
pub use nevra::Nevra;
