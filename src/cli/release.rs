// src/cli/release.rs
//! Release topology commands

use clap::Subcommand;

#[derive(Subcommand)]
pub enum ReleaseCommands {
    /// Create a release
    Create {
        /// Release identifier, e.g. rhel-9.4
        release_id: String,

        /// Short name (default: release_id without its version)
        #[arg(long)]
        short: Option<String>,

        /// Version (default: the part after the last '-')
        #[arg(long)]
        version: Option<String>,

        /// Human-readable name
        #[arg(long)]
        name: Option<String>,
    },

    /// Declare a variant of a release and the arches it ships for
    AddVariant {
        /// Release identifier
        release_id: String,

        /// Variant UID, e.g. Server
        variant_uid: String,

        /// Arch the variant ships for (repeatable)
        #[arg(short, long = "arch", required = true)]
        arches: Vec<String>,

        /// Variant name (default: the UID)
        #[arg(long)]
        name: Option<String>,

        /// Variant type
        #[arg(long = "type", default_value = "variant")]
        variant_type: String,
    },

    /// List releases and their variant/arch layout
    List,
}
