// src/cli/mapping.rs
//! Package mapping commands

use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum MappingCommands {
    /// Show the mapping of a source package in a compose
    Show {
        /// Compose identifier
        compose_id: String,

        /// Source package name
        package: String,

        /// Release whose overrides apply (default: the compose's release)
        #[arg(long)]
        release: Option<String>,

        /// Show raw compose contents, ignoring overrides
        #[arg(long)]
        disable_overrides: bool,

        /// Include provenance and ineffective protected overrides
        #[arg(long)]
        detail: bool,

        /// Keep ineffective overrides instead of deleting them
        #[arg(long)]
        no_cleanup: bool,
    },

    /// Compute (and optionally apply) the overrides turning the mapping
    /// into a target mapping
    Update {
        /// Compose identifier
        compose_id: String,

        /// Source package name
        package: String,

        /// Target mapping as JSON: {variant: {arch: {rpm_name: [rpm_arch]}}}
        target: PathBuf,

        /// Release whose overrides apply (default: the compose's release)
        #[arg(long)]
        release: Option<String>,

        /// Persist the changes instead of only printing them
        #[arg(long)]
        perform: bool,

        /// Author recorded in the audit log
        #[arg(long, default_value = "rpmmap")]
        author: String,

        /// Comment recorded in the audit log
        #[arg(long)]
        comment: Option<String>,
    },

    /// Apply a list of override changes (JSON)
    Patch {
        /// Compose identifier
        compose_id: String,

        /// Source package name
        package: String,

        /// Path to the change list
        changes: PathBuf,

        /// Release whose overrides apply (default: the compose's release)
        #[arg(long)]
        release: Option<String>,

        /// Author recorded in the audit log
        #[arg(long, default_value = "rpmmap")]
        author: String,

        /// Comment recorded in the audit log
        #[arg(long)]
        comment: Option<String>,
    },
}
