// src/commands/overrides.rs

//! Override rule commands

use super::{open_db, print_json};
use anyhow::Result;
use rpmmap::audit::ChangesetRecorder;
use rpmmap::config::Config;
use rpmmap::db::models::{OverrideRule, Release};
use rpmmap::mapping::clear_overrides;

/// List the override rules of a release
pub fn cmd_overrides_list(
    config: &Config,
    release_id: &str,
    package: Option<&str>,
    json: bool,
) -> Result<()> {
    let conn = open_db(config)?;
    let release = Release::get(&conn, release_id)?;
    let rules = OverrideRule::list_for_release(&conn, &release, package)?;

    if json {
        let exported: Vec<_> = rules.iter().map(OverrideRule::export).collect();
        return print_json(&exported);
    }

    if rules.is_empty() {
        println!("No overrides for {}.", release_id);
        return Ok(());
    }

    println!("Overrides of {} ({}):", release_id, rules.len());
    for rule in &rules {
        let mut line = format!("  {} ({})", rule, rule.srpm_name);
        if rule.do_not_delete {
            line.push_str(" [do_not_delete]");
        }
        if !rule.comment.is_empty() {
            line.push_str(&format!(" # {}", rule.comment));
        }
        println!("{}", line);
    }
    Ok(())
}

/// Delete the override rules of a release
pub fn cmd_overrides_clear(config: &Config, release_id: &str, force: bool, author: &str) -> Result<()> {
    let mut conn = open_db(config)?;
    let release = Release::get(&conn, release_id)?;
    let comment = format!("clear overrides of {}", release_id);
    let mut recorder = ChangesetRecorder::new(author, Some(comment));

    let cleared = clear_overrides(&mut conn, &release, force, &mut recorder)?;
    println!("Deleted {} override(s) of {}", cleared.len(), release_id);
    if !force {
        let kept = OverrideRule::list_for_release(&conn, &release, None)?.len();
        if kept > 0 {
            println!("Kept {} protected override(s); use --force to delete them", kept);
        }
    }
    Ok(())
}
