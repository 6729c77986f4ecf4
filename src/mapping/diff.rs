// src/mapping/diff.rs

//! Diff computation between an effective mapping and a target mapping.
//!
//! The result is the list of override changes that, once applied and
//! reconciled again, makes the effective mapping's pure projection equal
//! the target.

use super::{Change, ChangeAction, EffectiveMapping, EntryKey, Provenance, TargetMapping};

/// Compute the override changes turning `current` into `target`
///
/// Two passes, each in key order. The forward pass walks the target:
/// packages missing from `current` get an include override, packages
/// suppressed by an exclude override get that override removed. The
/// backward pass walks the included entries of `current` that the target
/// drops: an entry created by an include override loses that override,
/// an imported entry gains an exclude override.
///
/// Changes carry default comment and protection.
pub fn compute_changes(
    current: &EffectiveMapping,
    target: &TargetMapping,
    release_id: &str,
    srpm_name: &str,
) -> Vec<Change> {
    let mut changes = Vec::new();
    let mut stage = |action: ChangeAction, key: &EntryKey, include: bool| {
        changes.push(Change::staged(action, release_id, srpm_name, key, include));
    };

    for key in target.keys() {
        match current.get(&key) {
            None => stage(ChangeAction::Create, &key, true),
            Some(Provenance::Deleted) => stage(ChangeAction::Delete, &key, false),
            Some(_) => {}
        }
    }

    for (key, provenance) in current.iter() {
        if !provenance.is_included() || target.contains(key) {
            continue;
        }
        match provenance {
            Provenance::Created => stage(ChangeAction::Delete, key, true),
            _ => stage(ChangeAction::Create, key, false),
        }
    }

    changes
}
