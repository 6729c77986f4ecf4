// src/cli/mod.rs
//! CLI definitions for rpmmap
//!
//! This module contains all command-line interface definitions using clap.
//! The actual command implementations are in the `commands` module.
//!
//! - `init` - Create or migrate the database
//! - `import` - Import a compose RPM manifest
//! - `release` - Release topology management
//! - `mapping` - Read, replace and patch a package's mapping
//! - `overrides` - Inspect and clear override rules
//! - `history` - Show the audit log

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod mapping;
mod overrides;
mod release;

pub use mapping::MappingCommands;
pub use overrides::OverridesCommands;
pub use release::ReleaseCommands;

#[derive(Parser)]
#[command(name = "rpmmap")]
#[command(version)]
#[command(about = "Reconcile RPM-to-variant/arch mappings of composes with release overrides", long_about = None)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(long, global = true, default_value = rpmmap::config::DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Path to the database file (overrides the configuration)
    #[arg(short, long, global = true)]
    pub db_path: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the database, or bring its schema up to date
    Init,

    /// Import a compose RPM manifest (JSON)
    Import {
        /// Release the compose was built for
        release_id: String,

        /// Path to the manifest
        manifest: PathBuf,

        /// Author recorded in the audit log
        #[arg(long, default_value = "rpmmap")]
        author: String,
    },

    /// Release topology management
    #[command(subcommand)]
    Release(ReleaseCommands),

    /// Package mapping commands
    #[command(subcommand)]
    Mapping(MappingCommands),

    /// Override rule commands
    #[command(subcommand)]
    Overrides(OverridesCommands),

    /// Show recorded changesets, newest first
    History {
        /// Show the changes of this changeset only
        #[arg(long)]
        changeset: Option<i64>,

        /// Maximum number of changesets to list
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },
}
