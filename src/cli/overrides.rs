// src/cli/overrides.rs
//! Override rule commands

use clap::Subcommand;

#[derive(Subcommand)]
pub enum OverridesCommands {
    /// List the override rules of a release
    List {
        /// Release identifier
        release_id: String,

        /// Only rules of this source package
        #[arg(long)]
        package: Option<String>,

        /// Print JSON instead of one line per rule
        #[arg(long)]
        json: bool,
    },

    /// Delete the override rules of a release
    Clear {
        /// Release identifier
        release_id: String,

        /// Also delete rules marked do_not_delete
        #[arg(short, long)]
        force: bool,

        /// Author recorded in the audit log
        #[arg(long, default_value = "rpmmap")]
        author: String,
    },
}
