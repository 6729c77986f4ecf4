// src/commands/history.rs

//! Audit log listing

use super::open_db;
use anyhow::Result;
use rpmmap::config::Config;
use rpmmap::db::models::{ChangeRecord, Changeset};

/// Show changesets, or the changes of one changeset
pub fn cmd_history(config: &Config, changeset: Option<i64>, limit: usize) -> Result<()> {
    let conn = open_db(config)?;

    if let Some(id) = changeset {
        let changeset = Changeset::find_by_id(&conn, id)?
            .ok_or_else(|| anyhow::anyhow!("Changeset {} not found", id))?;
        print_header(&changeset);
        for change in ChangeRecord::for_changeset(&conn, id)? {
            println!(
                "  {} #{}: {} -> {}",
                change.target_class, change.target_id, change.old_value, change.new_value
            );
        }
        return Ok(());
    }

    let changesets = Changeset::list_all(&conn)?;
    if changesets.is_empty() {
        println!("No changes recorded.");
        return Ok(());
    }
    for changeset in changesets.iter().take(limit) {
        print_header(changeset);
    }
    Ok(())
}

fn print_header(changeset: &Changeset) {
    println!(
        "[{}] {} by {}{}",
        changeset.id.unwrap_or(0),
        changeset.committed_on.as_deref().unwrap_or("-"),
        changeset.author,
        changeset
            .comment
            .as_deref()
            .map(|c| format!(": {c}"))
            .unwrap_or_default()
    );
}
