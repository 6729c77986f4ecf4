// src/commands/mod.rs
//! Command handlers for the rpmmap CLI

mod history;
mod import;
mod mapping;
mod overrides;
mod release;

pub use history::cmd_history;
pub use import::cmd_import;
pub use mapping::{cmd_mapping_patch, cmd_mapping_show, cmd_mapping_update};
pub use overrides::{cmd_overrides_clear, cmd_overrides_list};
pub use release::{cmd_release_add_variant, cmd_release_create, cmd_release_list};

use anyhow::{Context, Result};
use rpmmap::config::Config;
use rusqlite::Connection;
use serde_json::Value;
use std::path::Path;

/// Open the configured database
pub fn open_db(config: &Config) -> Result<Connection> {
    let conn = rpmmap::db::open_with_timeout(config.db_path()?, config.busy_timeout())?;
    Ok(conn)
}

/// Read a JSON document from a file, `-` meaning stdin
fn read_json(path: &Path) -> Result<Value> {
    let value = if path == Path::new("-") {
        serde_json::from_reader(std::io::stdin().lock())
            .context("Failed to parse JSON from stdin")?
    } else {
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        serde_json::from_reader(std::io::BufReader::new(file))
            .with_context(|| format!("Failed to parse JSON from {}", path.display()))?
    };
    Ok(value)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
