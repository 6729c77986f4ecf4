// src/db/models/mod.rs

//! Data models for rpmmap database entities
//!
//! This module defines Rust structs that correspond to database tables
//! and provides methods for creating, reading, updating, and deleting records.

mod changeset;
mod compose;
mod override_rpm;
mod release;
mod rpm;

pub use changeset::{ChangeRecord, Changeset};
pub use compose::{Compose, ComposeRpm, ComposeVariant, ComposeVariantArch, PackageLocation};
pub use override_rpm::OverrideRule;
pub use release::{Release, ReleaseVariant};
pub use rpm::Rpm;
