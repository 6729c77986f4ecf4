// src/main.rs

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands, MappingCommands, OverridesCommands, ReleaseCommands};
use rpmmap::config::Config;
use rpmmap::mapping::MappingRequest;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load_or_default(&cli.config)?;
    if let Some(db_path) = &cli.db_path {
        config.database.path = PathBuf::from(db_path);
    }

    // RUST_LOG wins over the configured filter
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(&config.logging.filter))
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Init => {
            let db_path = config.db_path()?;
            rpmmap::db::init(db_path)?;
            info!("Database ready at {}", db_path);
            println!("Database initialized successfully at: {}", db_path);
            Ok(())
        }

        Commands::Import {
            release_id,
            manifest,
            author,
        } => commands::cmd_import(&config, &release_id, &manifest, &author),

        Commands::Release(release_cmd) => match release_cmd {
            ReleaseCommands::Create {
                release_id,
                short,
                version,
                name,
            } => commands::cmd_release_create(
                &config,
                &release_id,
                short.as_deref(),
                version.as_deref(),
                name.as_deref(),
            ),
            ReleaseCommands::AddVariant {
                release_id,
                variant_uid,
                arches,
                name,
                variant_type,
            } => commands::cmd_release_add_variant(
                &config,
                &release_id,
                &variant_uid,
                &arches,
                name.as_deref(),
                &variant_type,
            ),
            ReleaseCommands::List => commands::cmd_release_list(&config),
        },

        Commands::Mapping(mapping_cmd) => match mapping_cmd {
            MappingCommands::Show {
                compose_id,
                package,
                release,
                disable_overrides,
                detail,
                no_cleanup,
            } => {
                if no_cleanup {
                    config.mapping.cleanup_useless = false;
                }
                let request =
                    MappingRequest::new(&compose_id, &package).with_release(release.as_deref());
                commands::cmd_mapping_show(&config, request, disable_overrides, detail)
            }
            MappingCommands::Update {
                compose_id,
                package,
                target,
                release,
                perform,
                author,
                comment,
            } => {
                let request =
                    MappingRequest::new(&compose_id, &package).with_release(release.as_deref());
                commands::cmd_mapping_update(&config, request, &target, perform, &author, comment)
            }
            MappingCommands::Patch {
                compose_id,
                package,
                changes,
                release,
                author,
                comment,
            } => {
                let request =
                    MappingRequest::new(&compose_id, &package).with_release(release.as_deref());
                commands::cmd_mapping_patch(&config, request, &changes, &author, comment)
            }
        },

        Commands::Overrides(overrides_cmd) => match overrides_cmd {
            OverridesCommands::List {
                release_id,
                package,
                json,
            } => commands::cmd_overrides_list(&config, &release_id, package.as_deref(), json),
            OverridesCommands::Clear {
                release_id,
                force,
                author,
            } => commands::cmd_overrides_clear(&config, &release_id, force, &author),
        },

        Commands::History { changeset, limit } => {
            commands::cmd_history(&config, changeset, limit)
        }
    }
}
